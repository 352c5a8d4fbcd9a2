//! Indoor Navigation
//!
//! Range-based indoor positioning with grid route planning and turn-by-turn
//! guidance along the planned path.

pub mod core;
pub mod algorithms;
pub mod processing;
pub mod navigation;
pub mod validation;
pub mod utils;
pub mod api;

// Re-export commonly used types
pub use core::{GridCell, Point2D, PositionEstimate};
pub use algorithms::{
    simplify, CoordinateTransform, PathPlanner, PlannerConfig, PositionSolver, SolverConfig,
};
pub use processing::{BoolGrid, OccupancyGrid, PoseIntegrator};
pub use navigation::{InstructionKind, NavigationEvent, NavigationTracker, Path};
pub use validation::{ConfigError, NavError, NavResult};
pub use utils::{NavigationConfig, SiteConfig};
pub use api::{EventBus, NavigationSession, PlanningWorker, SharedPositionSolver};
