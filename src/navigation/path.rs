//! Planned route with progress tracking

use crate::core::{Point2D, DEFAULT_WALKING_SPEED_MPS};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ordered waypoints from start to goal.
///
/// `current_index` is the waypoint the agent is currently working towards.
/// It only moves forward and never exceeds `waypoints.len() - 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub waypoints: Vec<Point2D>,
    /// Polyline length in meters
    pub total_distance: f64,
    pub current_index: usize,
}

impl Path {
    pub fn new(waypoints: Vec<Point2D>) -> Self {
        let total_distance = waypoints.windows(2).map(|w| w[0].distance_to(&w[1])).sum();
        Self {
            waypoints,
            total_distance,
            current_index: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    fn last_index(&self) -> usize {
        self.waypoints.len().saturating_sub(1)
    }

    pub fn start(&self) -> Option<Point2D> {
        self.waypoints.first().copied()
    }

    pub fn destination(&self) -> Option<Point2D> {
        self.waypoints.last().copied()
    }

    pub fn current_waypoint(&self) -> Option<Point2D> {
        self.waypoints.get(self.current_index).copied()
    }

    /// Index of the waypoint after the current one, clamped to the last
    pub fn next_index(&self) -> usize {
        (self.current_index + 1).min(self.last_index())
    }

    pub fn next_waypoint(&self) -> Option<Point2D> {
        self.waypoints.get(self.next_index()).copied()
    }

    /// Move progress forward to `index`. Lower indices are ignored and
    /// higher ones are clamped to the last waypoint.
    pub fn advance_to(&mut self, index: usize) {
        let index = index.min(self.last_index());
        if index > self.current_index {
            self.current_index = index;
        }
    }

    /// Step to the next waypoint; returns false when already on the last one
    pub fn advance(&mut self) -> bool {
        if self.current_index < self.last_index() {
            self.current_index += 1;
            true
        } else {
            false
        }
    }

    /// Index of the waypoint closest to `position`; first wins on ties
    pub fn closest_index(&self, position: Point2D) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, waypoint) in self.waypoints.iter().enumerate() {
            let d = waypoint.distance_squared_to(&position);
            if best.map_or(true, |(_, best_d)| d < best_d) {
                best = Some((i, d));
            }
        }
        best.map(|(i, _)| i)
    }

    pub fn is_complete(&self) -> bool {
        !self.waypoints.is_empty() && self.current_index >= self.last_index()
    }

    /// Distance still to walk: straight to the next waypoint, then along the
    /// remaining segments
    pub fn remaining_distance(&self, position: Point2D) -> f64 {
        let next = self.next_index();
        let Some(next_waypoint) = self.waypoints.get(next) else {
            return 0.0;
        };
        let tail: f64 = self.waypoints[next..]
            .windows(2)
            .map(|w| w[0].distance_to(&w[1]))
            .sum();
        position.distance_to(next_waypoint) + tail
    }

    /// Walking time for the full path at `speed_mps`
    pub fn estimated_time(&self, speed_mps: f64) -> Duration {
        if speed_mps <= 0.0 || !speed_mps.is_finite() {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.total_distance / speed_mps)
    }

    /// Walking time at the default pace
    pub fn estimated_walking_time(&self) -> Duration {
        self.estimated_time(DEFAULT_WALKING_SPEED_MPS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn l_path() -> Path {
        Path::new(vec![
            Point2D::new(0.0, 0.0),
            Point2D::new(6.0, 0.0),
            Point2D::new(6.0, 8.0),
        ])
    }

    #[test]
    fn test_total_distance() {
        let path = l_path();
        assert!((path.total_distance - 14.0).abs() < 1e-12);
        assert_eq!(path.current_index, 0);
        assert_eq!(path.start(), Some(Point2D::new(0.0, 0.0)));
        assert_eq!(path.destination(), Some(Point2D::new(6.0, 8.0)));
    }

    #[test]
    fn test_advance_is_monotonic_and_clamped() {
        let mut path = l_path();
        path.advance_to(1);
        path.advance_to(0);
        assert_eq!(path.current_index, 1);

        path.advance_to(10);
        assert_eq!(path.current_index, 2);
        assert!(path.is_complete());
        assert!(!path.advance());
        assert_eq!(path.next_index(), 2);
    }

    #[test]
    fn test_remaining_distance() {
        let mut path = l_path();
        // Halfway along the first leg
        let remaining = path.remaining_distance(Point2D::new(3.0, 0.0));
        assert!((remaining - 11.0).abs() < 1e-12);

        path.advance();
        let remaining = path.remaining_distance(Point2D::new(6.0, 4.0));
        assert!((remaining - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_estimated_time() {
        let path = Path::new(vec![Point2D::new(0.0, 0.0), Point2D::new(12.0, 0.0)]);
        assert_eq!(path.estimated_walking_time(), Duration::from_secs(10));
        assert_eq!(path.estimated_time(2.0), Duration::from_secs(6));
        assert_eq!(path.estimated_time(0.0), Duration::ZERO);
    }

    #[test]
    fn test_closest_index_prefers_first_on_tie() {
        let path = l_path();
        assert_eq!(path.closest_index(Point2D::new(3.0, 0.0)), Some(0));
        assert_eq!(path.closest_index(Point2D::new(6.0, 7.0)), Some(2));
        assert_eq!(Path::new(Vec::new()).closest_index(Point2D::default()), None);
    }

    #[test]
    fn test_empty_path() {
        let path = Path::new(Vec::new());
        assert!(path.is_empty());
        assert!(!path.is_complete());
        assert_eq!(path.current_waypoint(), None);
        assert_eq!(path.remaining_distance(Point2D::new(1.0, 1.0)), 0.0);
        assert_eq!(path.total_distance, 0.0);
    }
}
