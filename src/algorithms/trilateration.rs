//! Range-only 2D trilateration with NLOS rejection and smoothing
//!
//! The solver keeps the latest measurement per anchor. A fix is computed by
//! linearising the circle equations against the closest anchor and solving the
//! normal equations of the resulting over-determined system:
//!
//! ```text
//! 2(xi - x0)·x + 2(yi - y0)·y = d0² - di² + (xi² + yi²) - (x0² + y0²)
//! ```
//!
//! A singular system (collinear or coincident anchors) falls back to the exact
//! three-circle intersection. Anchors whose range residual against the fix
//! exceeds the NLOS threshold are dropped and the fix recomputed, provided at
//! least three anchors remain.

use crate::core::{
    Point2D, PositionEstimate, DEFAULT_CONFIDENCE_TABLE, DEFAULT_MAX_ANCHOR_RANGE_M,
    DEFAULT_NLOS_THRESHOLD_M, DEFAULT_SMOOTHING_ALPHA, DEFAULT_STALE_WINDOW_MS,
    DEGENERATE_DETERMINANT, MAX_ANCHORS_PER_SOLVE, MIN_ANCHORS_FOR_FIX,
};
use log::{debug, trace};
use nalgebra::{Matrix2, Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Tunables for [`PositionSolver`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Measurements older than this are evicted (milliseconds)
    pub stale_window_ms: u64,
    /// Ranges beyond this are ignored (meters)
    pub max_anchor_range_m: f64,
    /// Range residual marking an anchor as non-line-of-sight (meters)
    pub nlos_threshold_m: f64,
    /// EMA weight of the newest fix, in (0, 1]
    pub smoothing_alpha: f64,
    /// Confidence for 0, 1, 2, 3 and 4+ valid anchors
    pub confidence_table: [f32; 5],
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            stale_window_ms: DEFAULT_STALE_WINDOW_MS,
            max_anchor_range_m: DEFAULT_MAX_ANCHOR_RANGE_M,
            nlos_threshold_m: DEFAULT_NLOS_THRESHOLD_M,
            smoothing_alpha: DEFAULT_SMOOTHING_ALPHA,
            confidence_table: DEFAULT_CONFIDENCE_TABLE,
        }
    }
}

impl SolverConfig {
    pub fn stale_window(&self) -> Duration {
        Duration::from_millis(self.stale_window_ms)
    }
}

/// Latest range report from one anchor
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorMeasurement {
    pub anchor_id: String,
    pub anchor_position: Point2D,
    /// Measured range (meters)
    pub distance: f64,
    /// Optional unit direction towards the anchor in the device frame
    pub bearing: Option<Vector3<f64>>,
    pub observed_at: Instant,
}

impl AnchorMeasurement {
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.observed_at)
    }

    /// Offset of the anchor relative to the device on the floor plane.
    ///
    /// Projects the range along the bearing (x lateral, z forward). Without a
    /// bearing the anchor is assumed straight ahead along x.
    pub fn planar_offset(&self) -> Point2D {
        match self.bearing {
            Some(dir) => Point2D::new(dir.x * self.distance, dir.z * self.distance),
            None => Point2D::new(self.distance, 0.0),
        }
    }
}

/// Rolling multi-anchor position solver
#[derive(Debug, Clone)]
pub struct PositionSolver {
    config: SolverConfig,
    measurements: HashMap<String, AnchorMeasurement>,
    previous: Option<Point2D>,
}

impl Default for PositionSolver {
    fn default() -> Self {
        Self::new(SolverConfig::default())
    }
}

impl PositionSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            measurements: HashMap::new(),
            previous: None,
        }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Record a range report, replacing any earlier one from the same anchor,
    /// then evict everything that has gone stale at `now`.
    pub fn update_measurement(
        &mut self,
        anchor_id: impl Into<String>,
        anchor_position: Point2D,
        distance: f64,
        bearing: Option<Vector3<f64>>,
        now: Instant,
    ) {
        let anchor_id = anchor_id.into();
        trace!("range update: {} -> {:.3} m", anchor_id, distance);

        self.measurements.insert(
            anchor_id.clone(),
            AnchorMeasurement {
                anchor_id,
                anchor_position,
                distance,
                bearing,
                observed_at: now,
            },
        );

        let window = self.config.stale_window();
        self.measurements.retain(|_, m| m.age(now) < window);
    }

    /// Solve for the current position.
    ///
    /// Returns `None` with fewer than three valid anchors or when the anchor
    /// geometry is degenerate. Absence of a fix is routine, never an error.
    pub fn solve(&mut self, now: Instant) -> Option<PositionEstimate> {
        let mut valid = self.valid_measurements(now);
        if valid.len() < MIN_ANCHORS_FOR_FIX {
            trace!("insufficient anchors: {} valid", valid.len());
            return None;
        }

        // Closest anchors give the best-conditioned system
        valid.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        valid.truncate(MAX_ANCHORS_PER_SOLVE);

        let raw = match solve_position(&valid) {
            Some(point) => point,
            None => {
                debug!("degenerate anchor geometry with {} anchors", valid.len());
                return None;
            }
        };

        let (raw, used, rejected) = self.reject_nlos(raw, &valid);

        let point = match self.previous {
            Some(prev) => prev + (raw - prev) * self.config.smoothing_alpha,
            None => raw,
        };
        self.previous = Some(point);

        Some(PositionEstimate {
            point,
            confidence: self.confidence_for(self.valid_count(now)),
            anchors_used: used,
            rejected_anchors: rejected,
        })
    }

    /// Confidence for the anchors currently valid at `now`
    pub fn confidence(&self, now: Instant) -> f32 {
        self.confidence_for(self.valid_count(now))
    }

    pub fn valid_count(&self, now: Instant) -> usize {
        self.valid_measurements(now).len()
    }

    pub fn active_measurements(&self) -> Vec<&AnchorMeasurement> {
        self.measurements.values().collect()
    }

    /// Last smoothed fix, if any
    pub fn last_position(&self) -> Option<Point2D> {
        self.previous
    }

    /// Forget all measurements and smoothing history
    pub fn reset(&mut self) {
        self.measurements.clear();
        self.previous = None;
    }

    fn valid_measurements(&self, now: Instant) -> Vec<&AnchorMeasurement> {
        let window = self.config.stale_window();
        self.measurements
            .values()
            .filter(|m| {
                m.distance > 0.0
                    && m.distance <= self.config.max_anchor_range_m
                    && m.age(now) < window
            })
            .collect()
    }

    fn confidence_for(&self, valid: usize) -> f32 {
        let table = &self.config.confidence_table;
        table[valid.min(table.len() - 1)]
    }

    fn reject_nlos(
        &self,
        estimate: Point2D,
        anchors: &[&AnchorMeasurement],
    ) -> (Point2D, usize, Vec<String>) {
        let (kept, outliers): (Vec<&AnchorMeasurement>, Vec<&AnchorMeasurement>) =
            anchors.iter().copied().partition(|m| {
                let residual = (estimate.distance_to(&m.anchor_position) - m.distance).abs();
                residual <= self.config.nlos_threshold_m
            });

        if outliers.is_empty() || kept.len() < MIN_ANCHORS_FOR_FIX {
            return (estimate, anchors.len(), Vec::new());
        }

        match solve_position(&kept) {
            Some(refined) => {
                let rejected: Vec<String> = outliers.iter().map(|m| m.anchor_id.clone()).collect();
                debug!("NLOS rejected anchors: {:?}", rejected);
                (refined, kept.len(), rejected)
            }
            None => (estimate, anchors.len(), Vec::new()),
        }
    }
}

/// Least-squares fix with the geometric three-anchor fallback.
/// The first anchor is the linearisation reference.
pub fn solve_position(anchors: &[&AnchorMeasurement]) -> Option<Point2D> {
    if anchors.len() < MIN_ANCHORS_FOR_FIX {
        return None;
    }

    least_squares(anchors).or_else(|| {
        geometric_intersection(
            (anchors[0].anchor_position, anchors[0].distance),
            (anchors[1].anchor_position, anchors[1].distance),
            (anchors[2].anchor_position, anchors[2].distance),
        )
    })
}

/// Normal-equation solve of the linearised system, `None` when singular
fn least_squares(anchors: &[&AnchorMeasurement]) -> Option<Point2D> {
    let reference = anchors[0];
    let p0 = reference.anchor_position;
    let d0_sq = reference.distance * reference.distance;
    let p0_norm_sq = p0.x * p0.x + p0.y * p0.y;

    // Accumulate AᵀA and Aᵀb row by row; A itself is never materialised
    let mut ata = Matrix2::<f64>::zeros();
    let mut atb = Vector2::<f64>::zeros();

    for anchor in &anchors[1..] {
        let pi = anchor.anchor_position;
        let row = Vector2::new(2.0 * (pi.x - p0.x), 2.0 * (pi.y - p0.y));
        let b = d0_sq - anchor.distance * anchor.distance + (pi.x * pi.x + pi.y * pi.y) - p0_norm_sq;

        ata += row * row.transpose();
        atb += row * b;
    }

    let det = ata.determinant();
    if !det.is_finite() || det.abs() <= DEGENERATE_DETERMINANT {
        return None;
    }

    // Closed-form 2x2 inverse
    let inverse = Matrix2::new(ata[(1, 1)], -ata[(0, 1)], -ata[(1, 0)], ata[(0, 0)]) / det;
    let solution = inverse * atb;
    let point = Point2D::new(solution.x, solution.y);
    point.is_finite().then_some(point)
}

/// Exact intersection of three range circles via Cramer's rule
pub fn geometric_intersection(
    (p1, r1): (Point2D, f64),
    (p2, r2): (Point2D, f64),
    (p3, r3): (Point2D, f64),
) -> Option<Point2D> {
    let a = 2.0 * (p2.x - p1.x);
    let b = 2.0 * (p2.y - p1.y);
    let c = r1 * r1 - r2 * r2 - p1.x * p1.x + p2.x * p2.x - p1.y * p1.y + p2.y * p2.y;

    let d = 2.0 * (p3.x - p2.x);
    let e = 2.0 * (p3.y - p2.y);
    let f = r2 * r2 - r3 * r3 - p2.x * p2.x + p3.x * p3.x - p2.y * p2.y + p3.y * p3.y;

    let denominator = a * e - b * d;
    if !denominator.is_finite() || denominator.abs() <= DEGENERATE_DETERMINANT {
        return None;
    }

    let point = Point2D::new((c * e - f * b) / denominator, (a * f - d * c) / denominator);
    point.is_finite().then_some(point)
}
