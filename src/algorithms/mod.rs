//! Core positioning and planning algorithms

pub mod astar;
pub mod simplify;
pub mod transform;
pub mod trilateration;

pub use astar::{PathPlanner, PlannerConfig};
pub use simplify::simplify;
pub use transform::CoordinateTransform;
pub use trilateration::{AnchorMeasurement, PositionSolver, SolverConfig};
