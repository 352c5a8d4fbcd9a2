//! A* search over an 8-connected occupancy grid.
//!
//! Straight moves cost `resolution`, diagonal moves `resolution·√2`; the
//! heuristic is the Euclidean cell distance scaled by `resolution`, which is
//! admissible and consistent for this cost model.
//!
//! Ties on f-score are broken by the smaller heuristic, then by insertion
//! order, so searches are deterministic.

use crate::algorithms::simplify::simplify;
use crate::algorithms::transform::CoordinateTransform;
use crate::core::{GridCell, Point2D, DEFAULT_MAX_EXPANSIONS, DEFAULT_SIMPLIFY_EPSILON_M};
use crate::navigation::path::Path;
use crate::processing::grid::OccupancyGrid;
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::f64::consts::SQRT_2;

/// How often (in expansions) the cancellation predicate is polled
const CANCEL_POLL_INTERVAL: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Douglas–Peucker tolerance used by [`PathPlanner::plan`] (meters)
    pub simplify_epsilon_m: f64,
    /// Give up after expanding this many nodes
    pub max_expansions: usize,
    /// Allow diagonal moves between two blocked orthogonal neighbours
    pub allow_corner_cutting: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            simplify_epsilon_m: DEFAULT_SIMPLIFY_EPSILON_M,
            max_expansions: DEFAULT_MAX_EXPANSIONS,
            allow_corner_cutting: true,
        }
    }
}

#[derive(Debug, Clone)]
struct SearchNode {
    cell: GridCell,
    g: f64,
    f: f64,
    h: f64,
    seq: u64,
}

impl PartialEq for SearchNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SearchNode {}

impl Ord for SearchNode {
    // BinaryHeap is a max-heap: the "greatest" node is the one with the
    // lowest f, then lowest h, then earliest insertion
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.h.total_cmp(&self.h))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for SearchNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Grid path planner
#[derive(Debug, Clone, Default)]
pub struct PathPlanner {
    config: PlannerConfig,
}

impl PathPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Shortest collision-free cell path between two world points, mapped
    /// back to world coordinates. `None` if either end is blocked or no path
    /// exists.
    pub fn find_path<G: OccupancyGrid + ?Sized>(
        &self,
        start: Point2D,
        goal: Point2D,
        grid: &G,
        transform: &CoordinateTransform,
    ) -> Option<Vec<Point2D>> {
        self.find_path_cancellable(start, goal, grid, transform, || false)
    }

    /// Same as [`find_path`](Self::find_path), polling `cancelled` while
    /// expanding. A cancelled search returns `None`.
    pub fn find_path_cancellable<G, F>(
        &self,
        start: Point2D,
        goal: Point2D,
        grid: &G,
        transform: &CoordinateTransform,
        cancelled: F,
    ) -> Option<Vec<Point2D>>
    where
        G: OccupancyGrid + ?Sized,
        F: Fn() -> bool,
    {
        let start_cell = transform.to_cell(start);
        let goal_cell = transform.to_cell(goal);
        trace!(
            "[AStar] find_path: start=({},{}) goal=({},{})",
            start_cell.col,
            start_cell.row,
            goal_cell.col,
            goal_cell.row
        );

        if !self.is_traversable(grid, transform, start_cell) {
            debug!("[AStar] start blocked at ({:.2},{:.2})", start.x, start.y);
            return None;
        }
        if !self.is_traversable(grid, transform, goal_cell) {
            debug!("[AStar] goal blocked at ({:.2},{:.2})", goal.x, goal.y);
            return None;
        }

        let cells = self.search(grid, transform, start_cell, goal_cell, cancelled)?;
        Some(cells.into_iter().map(|c| transform.to_world(c)).collect())
    }

    /// Search, simplify with the configured epsilon and wrap as a [`Path`]
    pub fn plan<G: OccupancyGrid + ?Sized>(
        &self,
        start: Point2D,
        goal: Point2D,
        grid: &G,
        transform: &CoordinateTransform,
    ) -> Option<Path> {
        self.plan_cancellable(start, goal, grid, transform, || false)
    }

    pub fn plan_cancellable<G, F>(
        &self,
        start: Point2D,
        goal: Point2D,
        grid: &G,
        transform: &CoordinateTransform,
        cancelled: F,
    ) -> Option<Path>
    where
        G: OccupancyGrid + ?Sized,
        F: Fn() -> bool,
    {
        let raw = self.find_path_cancellable(start, goal, grid, transform, cancelled)?;
        let simplified = simplify(&raw, self.config.simplify_epsilon_m);
        debug!(
            "[AStar] planned {} cells, simplified to {} waypoints",
            raw.len(),
            simplified.len()
        );
        Some(Path::new(simplified))
    }

    fn is_traversable<G: OccupancyGrid + ?Sized>(
        &self,
        grid: &G,
        transform: &CoordinateTransform,
        cell: GridCell,
    ) -> bool {
        transform.in_bounds(cell) && grid.is_free(cell.col, cell.row)
    }

    fn search<G, F>(
        &self,
        grid: &G,
        transform: &CoordinateTransform,
        start: GridCell,
        goal: GridCell,
        cancelled: F,
    ) -> Option<Vec<GridCell>>
    where
        G: OccupancyGrid + ?Sized,
        F: Fn() -> bool,
    {
        let resolution = transform.resolution;
        let heuristic = |cell: GridCell| cell.distance_to(&goal) * resolution;

        let mut open_set = BinaryHeap::new();
        let mut closed_set: HashSet<GridCell> = HashSet::new();
        let mut came_from: HashMap<GridCell, GridCell> = HashMap::new();
        let mut g_scores: HashMap<GridCell, f64> = HashMap::new();
        let mut seq: u64 = 0;

        let h_start = heuristic(start);
        open_set.push(SearchNode {
            cell: start,
            g: 0.0,
            f: h_start,
            h: h_start,
            seq,
        });
        g_scores.insert(start, 0.0);

        let mut expanded = 0usize;

        while let Some(current) = open_set.pop() {
            if current.cell == goal {
                trace!("[AStar] reached goal after {} expansions, cost {:.2}", expanded, current.g);
                return Some(reconstruct(&came_from, goal));
            }

            if !closed_set.insert(current.cell) {
                continue;
            }

            expanded += 1;
            if expanded > self.config.max_expansions {
                debug!("[AStar] gave up after {} expansions", expanded);
                return None;
            }
            if expanded % CANCEL_POLL_INTERVAL == 0 && cancelled() {
                debug!("[AStar] cancelled after {} expansions", expanded);
                return None;
            }

            for (i, neighbor) in current.cell.neighbors_8().iter().enumerate() {
                if closed_set.contains(neighbor) || !self.is_traversable(grid, transform, *neighbor) {
                    continue;
                }

                let diagonal = i >= 4;
                if diagonal && !self.config.allow_corner_cutting {
                    let side_a = GridCell::new(neighbor.col, current.cell.row);
                    let side_b = GridCell::new(current.cell.col, neighbor.row);
                    if !self.is_traversable(grid, transform, side_a)
                        || !self.is_traversable(grid, transform, side_b)
                    {
                        continue;
                    }
                }

                let step = if diagonal { resolution * SQRT_2 } else { resolution };
                let tentative_g = current.g + step;

                let known_g = g_scores.get(neighbor).copied().unwrap_or(f64::INFINITY);
                if tentative_g < known_g {
                    came_from.insert(*neighbor, current.cell);
                    g_scores.insert(*neighbor, tentative_g);

                    let h = heuristic(*neighbor);
                    seq += 1;
                    open_set.push(SearchNode {
                        cell: *neighbor,
                        g: tentative_g,
                        f: tentative_g + h,
                        h,
                        seq,
                    });
                }
            }
        }

        debug!("[AStar] no path after expanding {} nodes", expanded);
        None
    }
}

fn reconstruct(came_from: &HashMap<GridCell, GridCell>, goal: GridCell) -> Vec<GridCell> {
    let mut cells = vec![goal];
    let mut current = goal;
    while let Some(&previous) = came_from.get(&current) {
        cells.push(previous);
        current = previous;
    }
    cells.reverse();
    cells
}

/// Sum of segment lengths along a polyline
pub fn polyline_length(points: &[Point2D]) -> f64 {
    points.windows(2).map(|w| w[0].distance_to(&w[1])).sum()
}
