//! Core data types for the positioning and guidance core

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// 2D point in world coordinates (meters)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point2D) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn distance_squared_to(&self, other: &Point2D) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Heading from this point towards `other`, in radians within [-π, π]
    pub fn bearing_to(&self, other: &Point2D) -> f64 {
        (other.y - self.y).atan2(other.x - self.x)
    }

    /// Distance to the segment `a`-`b`, projection clamped to the segment
    pub fn distance_to_segment(&self, a: &Point2D, b: &Point2D) -> f64 {
        let dx = b.x - a.x;
        let dy = b.y - a.y;
        let len_sq = dx * dx + dy * dy;
        if len_sq == 0.0 {
            return self.distance_to(a);
        }

        let t = ((self.x - a.x) * dx + (self.y - a.y) * dy) / len_sq;
        let t = t.clamp(0.0, 1.0);
        let projection = Point2D::new(a.x + t * dx, a.y + t * dy);
        self.distance_to(&projection)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Point2D {
    type Output = Point2D;

    fn add(self, rhs: Point2D) -> Point2D {
        Point2D::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point2D {
    type Output = Point2D;

    fn sub(self, rhs: Point2D) -> Point2D {
        Point2D::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point2D {
    type Output = Point2D;

    fn mul(self, rhs: f64) -> Point2D {
        Point2D::new(self.x * rhs, self.y * rhs)
    }
}

impl From<(f64, f64)> for Point2D {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

/// Discrete cell of the occupancy grid.
///
/// Row 0 is the top row of the map image. Cells produced from points outside
/// the map may carry negative or oversized indices; check them with
/// `CoordinateTransform::in_bounds` before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCell {
    pub col: i32,
    pub row: i32,
}

impl GridCell {
    pub const fn new(col: i32, row: i32) -> Self {
        Self { col, row }
    }

    /// The eight surrounding cells; the first four are the straight moves
    pub fn neighbors_8(&self) -> [GridCell; 8] {
        let (c, r) = (self.col, self.row);
        [
            GridCell::new(c + 1, r),
            GridCell::new(c - 1, r),
            GridCell::new(c, r + 1),
            GridCell::new(c, r - 1),
            GridCell::new(c + 1, r + 1),
            GridCell::new(c + 1, r - 1),
            GridCell::new(c - 1, r + 1),
            GridCell::new(c - 1, r - 1),
        ]
    }

    /// Euclidean distance in cells
    pub fn distance_to(&self, other: &GridCell) -> f64 {
        let dc = (self.col - other.col) as f64;
        let dr = (self.row - other.row) as f64;
        dc.hypot(dr)
    }
}

/// Solved agent position with a confidence score in [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionEstimate {
    pub point: Point2D,
    pub confidence: f32,
    /// Number of anchors that contributed to the final solve
    pub anchors_used: usize,
    /// Anchors dropped as non-line-of-sight outliers
    pub rejected_anchors: Vec<String>,
}
