//! Map access and pose processing

pub mod grid;
pub mod pose;

pub use grid::{is_point_free, nearest_free_point, BoolGrid, OccupancyGrid};
pub use pose::{PoseConfig, PoseIntegrator, TrackedPose};
