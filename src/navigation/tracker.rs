//! Turn-by-turn progress tracking along a planned path.
//!
//! The tracker consumes position fixes, advances through the waypoints and
//! emits [`NavigationEvent`]s. It never plans on its own: when the agent
//! drifts off the path it asks the caller to replan.

use crate::core::{
    Point2D, DEFAULT_ARRIVAL_THRESHOLD_M, DEFAULT_OFF_PATH_THRESHOLD_M,
    DEFAULT_STRAIGHT_TOLERANCE_RAD, DEFAULT_TURN_THRESHOLD_RAD, DEFAULT_WAYPOINT_ADVANCE_M,
};
use crate::navigation::event::{InstructionKind, NavigationEvent};
use crate::navigation::path::Path;
use crate::validation::error::{NavError, NavResult};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Distance to the target that counts as arrival (meters)
    pub arrival_threshold_m: f64,
    /// Distance at which the current waypoint counts as reached (meters)
    pub waypoint_advance_m: f64,
    /// Distance from the active path segment that triggers a replan (meters)
    pub off_path_threshold_m: f64,
    /// Turn angles below this are "continue straight" (radians)
    pub straight_tolerance_rad: f64,
    /// Turn angles at or above this are "turn" rather than "bear" (radians)
    pub turn_threshold_rad: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            arrival_threshold_m: DEFAULT_ARRIVAL_THRESHOLD_M,
            waypoint_advance_m: DEFAULT_WAYPOINT_ADVANCE_M,
            off_path_threshold_m: DEFAULT_OFF_PATH_THRESHOLD_M,
            straight_tolerance_rad: DEFAULT_STRAIGHT_TOLERANCE_RAD,
            turn_threshold_rad: DEFAULT_TURN_THRESHOLD_RAD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackerState {
    Idle,
    Navigating,
    Arrived,
}

/// Snapshot of an active navigation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationState {
    pub target: Point2D,
    pub path: Path,
    pub distance_to_target: f64,
    /// World bearing to the next waypoint (radians)
    pub bearing_to_next_waypoint: f64,
    /// Bearing relative to the agent heading, in [-π, π)
    pub turn_angle: f64,
    pub instruction: Option<InstructionKind>,
    pub has_arrived: bool,
}

pub struct NavigationTracker {
    config: TrackerConfig,
    state: TrackerState,
    navigation: Option<NavigationState>,
    /// Agent heading in radians, counter-clockwise from +x
    heading: f64,
    replan_requested: bool,
}

impl NavigationTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            state: TrackerState::Idle,
            navigation: None,
            heading: 0.0,
            replan_requested: false,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn navigation_state(&self) -> Option<&NavigationState> {
        self.navigation.as_ref()
    }

    pub fn heading(&self) -> f64 {
        self.heading
    }

    pub fn set_heading(&mut self, heading_rad: f64) {
        self.heading = normalize_angle(heading_rad);
    }

    /// Begin (or restart) navigation towards `target` along `path`
    pub fn start(&mut self, target: Point2D, mut path: Path) -> NavResult<()> {
        if path.is_empty() {
            return Err(NavError::EmptyPath);
        }
        path.current_index = 0;

        info!(
            "[Tracker] navigating to ({:.2},{:.2}): {} waypoints, {:.1} m",
            target.x,
            target.y,
            path.len(),
            path.total_distance
        );

        self.navigation = Some(NavigationState {
            target,
            path,
            distance_to_target: f64::INFINITY,
            bearing_to_next_waypoint: 0.0,
            turn_angle: 0.0,
            instruction: None,
            has_arrived: false,
        });
        self.state = TrackerState::Navigating;
        self.replan_requested = false;
        Ok(())
    }

    pub fn stop(&mut self) {
        if self.state != TrackerState::Idle {
            debug!("[Tracker] stopped");
        }
        self.state = TrackerState::Idle;
        self.navigation = None;
        self.replan_requested = false;
    }

    /// Allow another `ReplanRequested` on the current route, after the
    /// previous request produced no usable path
    pub fn rearm_replan(&mut self) {
        if self.replan_requested && self.state == TrackerState::Navigating {
            debug!("[Tracker] replan re-armed");
            self.replan_requested = false;
        }
    }

    /// Feed a new position fix. Only acts while navigating.
    pub fn on_position_update(&mut self, position: Point2D) -> Vec<NavigationEvent> {
        let mut events = Vec::new();
        if self.state != TrackerState::Navigating {
            return events;
        }
        let Some(nav) = self.navigation.as_mut() else {
            return events;
        };

        nav.distance_to_target = position.distance_to(&nav.target);
        if nav.distance_to_target < self.config.arrival_threshold_m {
            info!(
                "[Tracker] arrived at ({:.2},{:.2})",
                nav.target.x, nav.target.y
            );
            nav.has_arrived = true;
            self.state = TrackerState::Arrived;
            events.push(NavigationEvent::Arrived);
            return events;
        }

        if let Some(closest) = nav.path.closest_index(position) {
            nav.path.advance_to(closest);
        }
        if let Some(current) = nav.path.current_waypoint() {
            if position.distance_to(&current) < self.config.waypoint_advance_m {
                nav.path.advance();
            }
        }

        let (Some(current), Some(next)) = (nav.path.current_waypoint(), nav.path.next_waypoint())
        else {
            return events;
        };

        nav.bearing_to_next_waypoint = position.bearing_to(&next);
        nav.turn_angle = normalize_angle(nav.bearing_to_next_waypoint - self.heading);

        let kind = InstructionKind::from_turn_angle(
            nav.turn_angle,
            self.config.straight_tolerance_rad,
            self.config.turn_threshold_rad,
        );
        if nav.instruction != Some(kind) {
            nav.instruction = Some(kind);
            events.push(NavigationEvent::InstructionChanged {
                kind,
                bearing: nav.bearing_to_next_waypoint,
            });
        }

        let deviation = position.distance_to_segment(&current, &next);
        if deviation > self.config.off_path_threshold_m && !self.replan_requested {
            debug!(
                "[Tracker] off path by {:.2} m at ({:.2},{:.2})",
                deviation, position.x, position.y
            );
            self.replan_requested = true;
            events.push(NavigationEvent::ReplanRequested {
                from: position,
                to: nav.target,
            });
        }

        events
    }
}

impl Default for NavigationTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

/// Wrap an angle into [-π, π)
pub fn normalize_angle(angle: f64) -> f64 {
    (angle + PI).rem_euclid(TAU) - PI
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn straight_path(len: usize) -> Path {
        Path::new((0..=len).map(|i| Point2D::new(i as f64, 0.0)).collect())
    }

    fn corner_path() -> Path {
        Path::new(vec![
            Point2D::new(0.0, 0.0),
            Point2D::new(10.0, 0.0),
            Point2D::new(10.0, 10.0),
        ])
    }

    #[test]
    fn test_normalize_angle() {
        assert!((normalize_angle(3.0 * PI / 2.0) + FRAC_PI_2).abs() < 1e-12);
        assert!((normalize_angle(-3.0 * PI / 2.0) - FRAC_PI_2).abs() < 1e-12);
        assert!((normalize_angle(0.25) - 0.25).abs() < 1e-12);
        let wrapped = normalize_angle(7.0 * TAU + 0.1);
        assert!((wrapped - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_start_rejects_empty_path() {
        let mut tracker = NavigationTracker::default();
        let result = tracker.start(Point2D::new(1.0, 1.0), Path::new(Vec::new()));
        assert!(matches!(result, Err(NavError::EmptyPath)));
        assert_eq!(tracker.state(), TrackerState::Idle);
    }

    #[test]
    fn test_idle_ignores_updates() {
        let mut tracker = NavigationTracker::default();
        assert!(tracker.on_position_update(Point2D::new(0.0, 0.0)).is_empty());
        assert!(tracker.navigation_state().is_none());
    }

    #[test]
    fn test_index_never_regresses() {
        let mut tracker = NavigationTracker::default();
        tracker.start(Point2D::new(20.0, 0.0), straight_path(20)).unwrap();

        let mut last_index = 0;
        for &x in &[1.2, 3.1, 5.2, 4.1, 2.2, 6.3, 5.7, 9.1, 8.2] {
            tracker.on_position_update(Point2D::new(x, 0.1));
            let index = tracker.navigation_state().unwrap().path.current_index;
            assert!(index >= last_index, "index went from {} to {}", last_index, index);
            last_index = index;
        }
        assert!(last_index >= 9);
    }

    #[test]
    fn test_waypoint_advance_within_threshold() {
        let mut tracker = NavigationTracker::default();
        tracker.start(Point2D::new(10.0, 10.0), corner_path()).unwrap();

        tracker.on_position_update(Point2D::new(9.8, 0.1));
        let nav = tracker.navigation_state().unwrap();
        // Closest waypoint is the corner, reached within 0.5 m, so we move past it
        assert_eq!(nav.path.current_index, 2);
    }

    #[test]
    fn test_arrival_fires_once() {
        let mut tracker = NavigationTracker::default();
        tracker.start(Point2D::new(10.0, 10.0), corner_path()).unwrap();

        let events = tracker.on_position_update(Point2D::new(10.0, 9.5));
        assert_eq!(events, vec![NavigationEvent::Arrived]);
        assert_eq!(tracker.state(), TrackerState::Arrived);
        assert!(tracker.navigation_state().unwrap().has_arrived);

        assert!(tracker.on_position_update(Point2D::new(10.0, 9.6)).is_empty());
        assert_eq!(tracker.state(), TrackerState::Arrived);

        tracker.stop();
        assert_eq!(tracker.state(), TrackerState::Idle);
        assert!(tracker.navigation_state().is_none());
    }

    #[test]
    fn test_instruction_changes_only_on_new_kind() {
        let mut tracker = NavigationTracker::default();
        tracker.start(Point2D::new(20.0, 0.0), corner_path()).unwrap();

        let events = tracker.on_position_update(Point2D::new(1.0, 0.0));
        assert_eq!(
            events,
            vec![NavigationEvent::InstructionChanged {
                kind: InstructionKind::ContinueStraight,
                bearing: 0.0,
            }]
        );

        assert!(tracker.on_position_update(Point2D::new(2.0, 0.0)).is_empty());

        // Facing south while the next waypoint lies east: turn left
        tracker.set_heading(-FRAC_PI_2);
        let events = tracker.on_position_update(Point2D::new(3.0, 0.0));
        assert_eq!(
            events,
            vec![NavigationEvent::InstructionChanged {
                kind: InstructionKind::TurnLeft,
                bearing: 0.0,
            }]
        );
    }

    #[test]
    fn test_bear_right() {
        let mut tracker = NavigationTracker::default();
        tracker.start(Point2D::new(10.0, 10.0), corner_path()).unwrap();
        tracker.set_heading(0.5);

        let events = tracker.on_position_update(Point2D::new(1.0, 0.0));
        assert!(matches!(
            events.as_slice(),
            [NavigationEvent::InstructionChanged {
                kind: InstructionKind::BearRight,
                ..
            }]
        ));
        let nav = tracker.navigation_state().unwrap();
        assert!((nav.turn_angle + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_replan_requested_once_per_start() {
        let mut tracker = NavigationTracker::default();
        let target = Point2D::new(10.0, 10.0);
        tracker.start(target, corner_path()).unwrap();

        let off = Point2D::new(4.0, 3.0);
        let events = tracker.on_position_update(off);
        assert!(events.contains(&NavigationEvent::ReplanRequested { from: off, to: target }));

        let events = tracker.on_position_update(Point2D::new(4.0, 3.5));
        assert!(!events
            .iter()
            .any(|e| matches!(e, NavigationEvent::ReplanRequested { .. })));

        // A fresh path re-arms deviation detection
        tracker.start(target, corner_path()).unwrap();
        let events = tracker.on_position_update(off);
        assert!(events.contains(&NavigationEvent::ReplanRequested { from: off, to: target }));
    }

    #[test]
    fn test_rearm_allows_second_replan_on_same_route() {
        let mut tracker = NavigationTracker::default();
        let target = Point2D::new(10.0, 10.0);
        tracker.start(target, corner_path()).unwrap();

        let off = Point2D::new(4.0, 3.0);
        assert!(tracker
            .on_position_update(off)
            .contains(&NavigationEvent::ReplanRequested { from: off, to: target }));

        tracker.rearm_replan();
        let further = Point2D::new(4.0, 4.0);
        assert!(tracker
            .on_position_update(further)
            .contains(&NavigationEvent::ReplanRequested { from: further, to: target }));
    }

    #[test]
    fn test_rearm_ignored_after_arrival() {
        let mut tracker = NavigationTracker::default();
        let target = Point2D::new(10.0, 10.0);
        tracker.start(target, corner_path()).unwrap();
        tracker.on_position_update(Point2D::new(4.0, 3.0));
        tracker.on_position_update(Point2D::new(9.8, 9.8));
        assert_eq!(tracker.state(), TrackerState::Arrived);

        tracker.rearm_replan();
        assert_eq!(tracker.state(), TrackerState::Arrived);
        assert!(tracker.on_position_update(Point2D::new(0.0, 5.0)).is_empty());
    }

    #[test]
    fn test_on_path_does_not_replan() {
        let mut tracker = NavigationTracker::default();
        tracker.start(Point2D::new(10.0, 10.0), corner_path()).unwrap();

        for &(x, y) in &[(1.0, 0.5), (3.0, -1.0), (4.0, 1.5)] {
            let events = tracker.on_position_update(Point2D::new(x, y));
            assert!(!events
                .iter()
                .any(|e| matches!(e, NavigationEvent::ReplanRequested { .. })));
        }
    }
}
