//! Default tuning parameters.
//!
//! These are policy values, not physical constants; every one of them can be
//! overridden through `NavigationConfig`.

/// Age after which an anchor measurement is discarded (milliseconds)
pub const DEFAULT_STALE_WINDOW_MS: u64 = 2000;

/// Longest range accepted from an anchor (meters)
pub const DEFAULT_MAX_ANCHOR_RANGE_M: f64 = 20.0;

/// Minimum number of anchors for a 2D fix
pub const MIN_ANCHORS_FOR_FIX: usize = 3;

/// Closest anchors fed to the least-squares solve
pub const MAX_ANCHORS_PER_SOLVE: usize = 4;

/// Range residual above which an anchor is treated as non-line-of-sight (meters)
pub const DEFAULT_NLOS_THRESHOLD_M: f64 = 2.0;

/// Exponential smoothing factor for successive fixes
pub const DEFAULT_SMOOTHING_ALPHA: f64 = 0.3;

/// |det(AᵀA)| at or below which the normal equations are considered singular
pub const DEGENERATE_DETERMINANT: f64 = 1e-3;

/// Confidence by valid anchor count: index 0..=3, last entry for 4 or more
pub const DEFAULT_CONFIDENCE_TABLE: [f32; 5] = [0.0, 0.25, 0.5, 0.75, 1.0];

/// Douglas–Peucker tolerance applied to planned paths (meters)
pub const DEFAULT_SIMPLIFY_EPSILON_M: f64 = 0.5;

/// Node expansion cap for a single A* search
pub const DEFAULT_MAX_EXPANSIONS: usize = 2_000_000;

pub const DEFAULT_ARRIVAL_THRESHOLD_M: f64 = 1.0;
pub const DEFAULT_WAYPOINT_ADVANCE_M: f64 = 0.5;
pub const DEFAULT_OFF_PATH_THRESHOLD_M: f64 = 2.0;

/// |turn angle| below this is "continue straight" (radians, ~17°)
pub const DEFAULT_STRAIGHT_TOLERANCE_RAD: f64 = 0.3;

/// |turn angle| at or above this is a full turn (radians, ~57°)
pub const DEFAULT_TURN_THRESHOLD_RAD: f64 = 1.0;

/// Walking speed used for time estimates (m/s)
pub const DEFAULT_WALKING_SPEED_MPS: f64 = 1.2;
