//! Thread-safe handle to a [`PositionSolver`].
//!
//! Ranging channels report from their own threads; every update and solve
//! goes through one short critical section.

use crate::algorithms::trilateration::{PositionSolver, SolverConfig};
use crate::core::{Point2D, PositionEstimate};
use nalgebra::Vector3;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone, Default)]
pub struct SharedPositionSolver {
    inner: Arc<Mutex<PositionSolver>>,
}

impl SharedPositionSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(PositionSolver::new(config))),
        }
    }

    pub fn update_measurement(
        &self,
        anchor_id: impl Into<String>,
        anchor_position: Point2D,
        distance: f64,
        bearing: Option<Vector3<f64>>,
        now: Instant,
    ) {
        self.inner
            .lock()
            .update_measurement(anchor_id, anchor_position, distance, bearing, now);
    }

    /// Record a measurement and solve in the same critical section
    pub fn update_and_solve(
        &self,
        anchor_id: impl Into<String>,
        anchor_position: Point2D,
        distance: f64,
        bearing: Option<Vector3<f64>>,
        now: Instant,
    ) -> Option<PositionEstimate> {
        let mut solver = self.inner.lock();
        solver.update_measurement(anchor_id, anchor_position, distance, bearing, now);
        solver.solve(now)
    }

    pub fn solve(&self, now: Instant) -> Option<PositionEstimate> {
        self.inner.lock().solve(now)
    }

    pub fn confidence(&self, now: Instant) -> f32 {
        self.inner.lock().confidence(now)
    }

    pub fn last_position(&self) -> Option<Point2D> {
        self.inner.lock().last_position()
    }

    pub fn reset(&self) {
        self.inner.lock().reset();
    }
}
