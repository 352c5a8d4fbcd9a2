//! Douglas–Peucker polyline simplification.

use crate::core::Point2D;

/// Drop points that lie within `epsilon` of the segment joining their
/// neighbours. Endpoints are always kept and the output is an ordered
/// subsequence of the input.
pub fn simplify(path: &[Point2D], epsilon: f64) -> Vec<Point2D> {
    if path.len() <= 2 {
        return path.to_vec();
    }

    let mut keep = vec![false; path.len()];
    keep[0] = true;
    keep[path.len() - 1] = true;

    // Explicit stack instead of recursion; long A* paths have thousands of cells
    let mut stack = vec![(0usize, path.len() - 1)];
    while let Some((first, last)) = stack.pop() {
        if last <= first + 1 {
            continue;
        }

        let (a, b) = (path[first], path[last]);
        let mut max_dist = 0.0;
        let mut split = first;
        for (i, point) in path.iter().enumerate().take(last).skip(first + 1) {
            let d = point.distance_to_segment(&a, &b);
            if d > max_dist {
                max_dist = d;
                split = i;
            }
        }

        if max_dist > epsilon {
            keep[split] = true;
            stack.push((first, split));
            stack.push((split, last));
        }
    }

    path.iter()
        .zip(keep)
        .filter_map(|(p, kept)| kept.then_some(*p))
        .collect()
}
