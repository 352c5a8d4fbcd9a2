//! Dead-reckoning from a relative pose stream, corrected by anchor ranges.
//!
//! Visual-inertial trackers report poses relative to wherever tracking
//! started. Once the integrator is anchored at a known world position, every
//! tracked pose is rotated by the reference heading and added to the
//! reference position. Range measurements to anchors pull the estimate
//! towards the measured circle by a fixed gain, at a limited rate.

use crate::core::Point2D;
use crate::processing::grid::{is_point_free, nearest_free_point, OccupancyGrid};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseConfig {
    /// Fraction of the range error corrected per accepted measurement
    pub correction_gain: f64,
    /// Range errors at or below this are ignored (meters)
    pub min_correction_error_m: f64,
    /// Minimum time between corrections (milliseconds)
    pub correction_interval_ms: u64,
    /// Search radius when snapping out of blocked cells (meters)
    pub snap_radius_m: f64,
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            correction_gain: 0.1,
            min_correction_error_m: 0.5,
            correction_interval_ms: 500,
            snap_radius_m: 2.0,
        }
    }
}

/// Pose reported by the tracker, in its own frame. `x` and `z` are the
/// horizontal translation axes; `yaw` is radians.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackedPose {
    pub x: f64,
    pub z: f64,
    pub yaw: f64,
}

#[derive(Debug, Clone)]
pub struct PoseIntegrator {
    config: PoseConfig,
    localized: bool,
    reference_position: Point2D,
    reference_heading: f64,
    /// Tracked translation at the moment the reference was (re)set
    reference_pose: TrackedPose,
    last_pose: TrackedPose,
    position: Point2D,
    heading: f64,
    last_correction: Option<Instant>,
}

impl PoseIntegrator {
    pub fn new(config: PoseConfig) -> Self {
        Self {
            config,
            localized: false,
            reference_position: Point2D::default(),
            reference_heading: 0.0,
            reference_pose: TrackedPose::default(),
            last_pose: TrackedPose::default(),
            position: Point2D::default(),
            heading: 0.0,
            last_correction: None,
        }
    }

    pub fn is_localized(&self) -> bool {
        self.localized
    }

    pub fn position(&self) -> Option<Point2D> {
        self.localized.then_some(self.position)
    }

    /// World heading in radians
    pub fn heading(&self) -> f64 {
        self.heading
    }

    /// Anchor the tracked frame at a known world position and heading.
    /// The most recent tracked pose becomes the origin of future deltas.
    pub fn initialize_at(&mut self, position: Point2D, heading: f64) {
        self.localized = true;
        self.reference_position = position;
        self.reference_heading = heading;
        self.reference_pose = self.last_pose;
        self.position = position;
        self.heading = heading;
        self.last_correction = None;
        debug!(
            "[Pose] initialized at ({:.2},{:.2}) heading {:.2}",
            position.x, position.y, heading
        );
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }

    /// Apply a tracked pose without map constraints
    pub fn apply_pose(&mut self, pose: TrackedPose) -> Option<Point2D> {
        self.last_pose = pose;
        if !self.localized {
            return None;
        }

        let dx = pose.x - self.reference_pose.x;
        let dz = pose.z - self.reference_pose.z;
        let (sin_h, cos_h) = self.reference_heading.sin_cos();

        self.position = Point2D::new(
            self.reference_position.x + dx * cos_h - dz * sin_h,
            self.reference_position.y + dx * sin_h + dz * cos_h,
        );
        self.heading = self.reference_heading + pose.yaw - self.reference_pose.yaw;
        Some(self.position)
    }

    /// Apply a tracked pose, snapping out of blocked cells
    pub fn apply_pose_on_grid<G: OccupancyGrid + ?Sized>(
        &mut self,
        pose: TrackedPose,
        grid: &G,
    ) -> Option<Point2D> {
        let position = self.apply_pose(pose)?;
        if !is_point_free(grid, position) {
            if let Some(free) = nearest_free_point(grid, position, self.config.snap_radius_m) {
                trace!(
                    "[Pose] snapped ({:.2},{:.2}) -> ({:.2},{:.2})",
                    position.x,
                    position.y,
                    free.x,
                    free.y
                );
                self.position = free;
            }
        }
        Some(self.position)
    }

    /// Nudge the estimate towards the circle of radius `distance` around
    /// `anchor`. Returns true when a correction was applied.
    pub fn apply_range_correction(&mut self, anchor: Point2D, distance: f64, now: Instant) -> bool {
        if !self.localized {
            return false;
        }
        let interval = Duration::from_millis(self.config.correction_interval_ms);
        if let Some(last) = self.last_correction {
            if now.saturating_duration_since(last) <= interval {
                return false;
            }
        }
        self.last_correction = Some(now);

        let current = self.position.distance_to(&anchor);
        let error = (current - distance).abs();
        if error <= self.config.min_correction_error_m || current <= f64::EPSILON {
            return false;
        }

        let ratio = distance / current;
        let corrected = anchor + (self.position - anchor) * ratio;
        self.position = self.position + (corrected - self.position) * self.config.correction_gain;

        // Re-anchor so subsequent deltas build on the corrected estimate
        self.reference_position = self.position;
        self.reference_pose = TrackedPose {
            yaw: self.reference_pose.yaw,
            ..self.last_pose
        };

        debug!("[Pose] range correction applied, error {:.2} m", error);
        true
    }
}

impl Default for PoseIntegrator {
    fn default() -> Self {
        Self::new(PoseConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::grid::BoolGrid;
    use std::f64::consts::FRAC_PI_2;

    fn close(a: Point2D, b: Point2D) -> bool {
        a.distance_to(&b) < 1e-9
    }

    #[test]
    fn test_not_localized_ignores_poses() {
        let mut pose = PoseIntegrator::default();
        assert_eq!(pose.apply_pose(TrackedPose { x: 1.0, z: 2.0, yaw: 0.0 }), None);
        assert_eq!(pose.position(), None);
    }

    #[test]
    fn test_deltas_relative_to_initialization() {
        let mut pose = PoseIntegrator::default();
        // Tracking already moved before we were anchored
        pose.apply_pose(TrackedPose { x: 5.0, z: 5.0, yaw: 0.0 });
        pose.initialize_at(Point2D::new(10.0, 2.0), 0.0);

        let p = pose.apply_pose(TrackedPose { x: 6.0, z: 7.0, yaw: 0.0 }).unwrap();
        assert!(close(p, Point2D::new(11.0, 4.0)));
    }

    #[test]
    fn test_reference_heading_rotates_deltas() {
        let mut pose = PoseIntegrator::default();
        pose.initialize_at(Point2D::new(0.0, 0.0), FRAC_PI_2);

        let p = pose.apply_pose(TrackedPose { x: 1.0, z: 0.0, yaw: 0.2 }).unwrap();
        assert!(close(p, Point2D::new(0.0, 1.0)));
        assert!((pose.heading() - (FRAC_PI_2 + 0.2)).abs() < 1e-12);
    }

    #[test]
    fn test_range_correction_gain_and_rate_limit() {
        let mut pose = PoseIntegrator::default();
        pose.initialize_at(Point2D::new(10.0, 0.0), 0.0);
        let anchor = Point2D::new(0.0, 0.0);
        let t0 = Instant::now();

        // Estimate says 10 m, anchor says 8 m: move 10% of the 2 m gap
        assert!(pose.apply_range_correction(anchor, 8.0, t0));
        assert!(close(pose.position().unwrap(), Point2D::new(9.8, 0.0)));

        // Too soon after the previous correction
        assert!(!pose.apply_range_correction(anchor, 8.0, t0 + Duration::from_millis(300)));
        assert!(pose.apply_range_correction(anchor, 8.0, t0 + Duration::from_millis(600)));
        assert!(close(pose.position().unwrap(), Point2D::new(9.62, 0.0)));
    }

    #[test]
    fn test_small_range_error_ignored() {
        let mut pose = PoseIntegrator::default();
        pose.initialize_at(Point2D::new(3.0, 4.0), 0.0);
        assert!(!pose.apply_range_correction(Point2D::new(0.0, 0.0), 5.3, Instant::now()));
        assert!(close(pose.position().unwrap(), Point2D::new(3.0, 4.0)));
    }

    #[test]
    fn test_correction_is_kept_by_later_deltas() {
        let mut pose = PoseIntegrator::default();
        pose.initialize_at(Point2D::new(10.0, 0.0), 0.0);
        pose.apply_range_correction(Point2D::new(0.0, 0.0), 8.0, Instant::now());

        let p = pose.apply_pose(TrackedPose { x: 1.0, z: 0.0, yaw: 0.0 }).unwrap();
        assert!(close(p, Point2D::new(10.8, 0.0)));
    }

    #[test]
    fn test_blocked_pose_snaps_to_free_space() {
        let mut grid = BoolGrid::new(50, 50, 0.1, Point2D::new(0.0, 0.0));
        // Wall covering x in [2.0, 2.4]
        grid.block_rect(20, 0, 24, 49);

        let mut pose = PoseIntegrator::default();
        pose.initialize_at(Point2D::new(1.0, 2.5), 0.0);

        let p = pose
            .apply_pose_on_grid(TrackedPose { x: 1.2, z: 0.0, yaw: 0.0 }, &grid)
            .unwrap();
        assert!(is_point_free(&grid, p));
        assert!(p.distance_to(&Point2D::new(2.2, 2.5)) < 0.5);
    }
}
