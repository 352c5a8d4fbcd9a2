//! Path following and guidance events

pub mod event;
pub mod path;
pub mod tracker;

pub use event::{InstructionKind, NavigationEvent};
pub use path::Path;
pub use tracker::{normalize_angle, NavigationState, NavigationTracker, TrackerConfig, TrackerState};
