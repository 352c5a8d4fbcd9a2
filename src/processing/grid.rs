//! Occupancy grid access.
//!
//! Map loading lives outside this crate; planners only need the read-only
//! [`OccupancyGrid`] view. [`BoolGrid`] is an in-memory implementation used by
//! the CLI and the test suites.

use crate::core::Point2D;
use crate::validation::error::ConfigError;
use std::f64::consts::PI;

/// Read-only free/blocked lookup over a rectangular cell grid
pub trait OccupancyGrid {
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    /// Meters per cell
    fn resolution(&self) -> f64;
    /// World coordinate of cell (0, height-1), the bottom-left corner
    fn origin(&self) -> Point2D;
    /// Whether the cell is traversable. Out-of-range cells are never free.
    fn is_free(&self, col: i32, row: i32) -> bool;
}

/// Dense row-major boolean grid (`true` = free)
#[derive(Debug, Clone, PartialEq)]
pub struct BoolGrid {
    width: usize,
    height: usize,
    resolution: f64,
    origin: Point2D,
    cells: Vec<bool>,
}

impl BoolGrid {
    /// All-free grid
    pub fn new(width: usize, height: usize, resolution: f64, origin: Point2D) -> Self {
        Self {
            width,
            height,
            resolution,
            origin,
            cells: vec![true; width * height],
        }
    }

    /// Parse an ASCII map: `#` is blocked, anything else is free.
    /// The first line is grid row 0 (top of the map).
    pub fn from_ascii(text: &str, resolution: f64, origin: Point2D) -> Result<Self, ConfigError> {
        let rows: Vec<&str> = text
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .collect();

        let height = rows.len();
        let width = rows.first().map(|r| r.chars().count()).unwrap_or(0);
        if width == 0 || height == 0 {
            return Err(ConfigError::InvalidParameter {
                parameter: "grid".to_string(),
                value: String::new(),
                reason: "grid must contain at least one cell".to_string(),
            });
        }
        if !(resolution > 0.0) {
            return Err(ConfigError::InvalidParameter {
                parameter: "resolution".to_string(),
                value: resolution.to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let mut cells = Vec::with_capacity(width * height);
        for (row, line) in rows.iter().enumerate() {
            let count = line.chars().count();
            if count != width {
                return Err(ConfigError::InvalidParameter {
                    parameter: format!("grid row {}", row),
                    value: count.to_string(),
                    reason: format!("expected {} columns", width),
                });
            }
            cells.extend(line.chars().map(|c| c != '#'));
        }

        Ok(Self {
            width,
            height,
            resolution,
            origin,
            cells,
        })
    }

    pub fn set_free(&mut self, col: i32, row: i32, free: bool) {
        if let Some(index) = self.index(col, row) {
            self.cells[index] = free;
        }
    }

    /// Block every cell of the inclusive rectangle
    pub fn block_rect(&mut self, col_min: i32, row_min: i32, col_max: i32, row_max: i32) {
        for row in row_min..=row_max {
            for col in col_min..=col_max {
                self.set_free(col, row, false);
            }
        }
    }

    pub fn free_cell_count(&self) -> usize {
        self.cells.iter().filter(|&&free| free).count()
    }

    fn index(&self, col: i32, row: i32) -> Option<usize> {
        if col < 0 || row < 0 {
            return None;
        }
        let (col, row) = (col as usize, row as usize);
        if col >= self.width || row >= self.height {
            return None;
        }
        Some(row * self.width + col)
    }
}

impl OccupancyGrid for BoolGrid {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn resolution(&self) -> f64 {
        self.resolution
    }

    fn origin(&self) -> Point2D {
        self.origin
    }

    fn is_free(&self, col: i32, row: i32) -> bool {
        self.index(col, row).map(|i| self.cells[i]).unwrap_or(false)
    }
}

/// Whether the cell under a world point is free
pub fn is_point_free<G: OccupancyGrid + ?Sized>(grid: &G, point: Point2D) -> bool {
    let transform = crate::algorithms::transform::CoordinateTransform::from_grid(grid);
    let cell = transform.to_cell(point);
    grid.is_free(cell.col, cell.row)
}

/// Search expanding rings around `point` for a free position.
///
/// Rings grow in 0.1 m steps up to `search_radius`, sampling 16 directions
/// each. Returns `None` when nothing free is found.
pub fn nearest_free_point<G: OccupancyGrid + ?Sized>(
    grid: &G,
    point: Point2D,
    search_radius: f64,
) -> Option<Point2D> {
    const RING_STEP_M: f64 = 0.1;
    const DIRECTIONS: usize = 16;

    if is_point_free(grid, point) {
        return Some(point);
    }

    let mut radius = RING_STEP_M;
    while radius < search_radius {
        for i in 0..DIRECTIONS {
            let angle = i as f64 * 2.0 * PI / DIRECTIONS as f64;
            let candidate = Point2D::new(
                point.x + radius * angle.cos(),
                point.y + radius * angle.sin(),
            );
            if is_point_free(grid, candidate) {
                return Some(candidate);
            }
        }
        radius += RING_STEP_M;
    }

    None
}
