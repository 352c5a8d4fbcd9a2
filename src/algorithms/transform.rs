//! World <-> grid coordinate conversion.
//!
//! Grid row 0 is the top row of the map image while world y grows upward, so
//! the row axis is flipped. `origin` is the world position of cell
//! `(0, height - 1)`.

use crate::core::{GridCell, Point2D};
use crate::processing::grid::OccupancyGrid;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordinateTransform {
    /// Meters per cell
    pub resolution: f64,
    pub origin: Point2D,
    pub width: usize,
    pub height: usize,
}

impl CoordinateTransform {
    pub fn new(resolution: f64, origin: Point2D, width: usize, height: usize) -> Self {
        Self {
            resolution,
            origin,
            width,
            height,
        }
    }

    /// Transform matching a grid's metadata
    pub fn from_grid<G: OccupancyGrid + ?Sized>(grid: &G) -> Self {
        Self::new(grid.resolution(), grid.origin(), grid.width(), grid.height())
    }

    pub fn to_cell(&self, point: Point2D) -> GridCell {
        let col = ((point.x - self.origin.x) / self.resolution).round();
        let up = ((point.y - self.origin.y) / self.resolution).round();
        let row = (self.height as f64 - 1.0) - up;
        // `as` saturates out-of-range values and maps NaN to 0
        GridCell::new(col as i32, row as i32)
    }

    pub fn to_world(&self, cell: GridCell) -> Point2D {
        let up = (self.height as f64 - 1.0) - cell.row as f64;
        Point2D::new(
            self.origin.x + cell.col as f64 * self.resolution,
            self.origin.y + up * self.resolution,
        )
    }

    pub fn in_bounds(&self, cell: GridCell) -> bool {
        cell.col >= 0
            && cell.row >= 0
            && (cell.col as usize) < self.width
            && (cell.row as usize) < self.height
    }

    /// World extent covered by cell centers: (min corner, max corner)
    pub fn world_bounds(&self) -> (Point2D, Point2D) {
        let max = Point2D::new(
            self.origin.x + self.width.saturating_sub(1) as f64 * self.resolution,
            self.origin.y + self.height.saturating_sub(1) as f64 * self.resolution,
        );
        (self.origin, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transform() -> CoordinateTransform {
        CoordinateTransform::new(0.1, Point2D::new(-2.0, -1.0), 100, 50)
    }

    #[test]
    fn test_origin_maps_to_bottom_left() {
        let t = transform();
        assert_eq!(t.to_cell(Point2D::new(-2.0, -1.0)), GridCell::new(0, 49));
        assert_eq!(t.to_world(GridCell::new(0, 49)), Point2D::new(-2.0, -1.0));
    }

    #[test]
    fn test_row_axis_is_flipped() {
        let t = transform();
        let lower = t.to_cell(Point2D::new(0.0, 0.0));
        let upper = t.to_cell(Point2D::new(0.0, 1.0));
        assert!(upper.row < lower.row);
        assert_eq!(lower.row - upper.row, 10);
    }

    #[test]
    fn test_cell_round_trip() {
        let t = transform();
        for &(col, row) in &[(0, 0), (99, 49), (42, 7), (13, 30)] {
            let cell = GridCell::new(col, row);
            assert_eq!(t.to_cell(t.to_world(cell)), cell);
        }
    }

    #[test]
    fn test_rounding_to_nearest_cell() {
        let t = CoordinateTransform::new(1.0, Point2D::new(0.0, 0.0), 10, 10);
        assert_eq!(t.to_cell(Point2D::new(2.4, 0.0)), GridCell::new(2, 9));
        assert_eq!(t.to_cell(Point2D::new(2.6, 0.0)), GridCell::new(3, 9));
    }

    #[test]
    fn test_out_of_map_points_are_out_of_bounds() {
        let t = transform();
        assert!(!t.in_bounds(t.to_cell(Point2D::new(-5.0, 0.0))));
        assert!(!t.in_bounds(t.to_cell(Point2D::new(0.0, 10.0))));
        assert!(!t.in_bounds(t.to_cell(Point2D::new(20.0, 0.0))));
        assert!(t.in_bounds(t.to_cell(Point2D::new(0.0, 0.0))));
    }

    #[test]
    fn test_world_bounds() {
        let t = CoordinateTransform::new(0.5, Point2D::new(1.0, 2.0), 5, 3);
        let (min, max) = t.world_bounds();
        assert_eq!(min, Point2D::new(1.0, 2.0));
        assert_eq!(max, Point2D::new(3.0, 3.0));
    }
}
