//! Background path planning.
//!
//! Searches run on a dedicated thread so they never stall measurement
//! handling. Only the most recent request matters: submitting a new one
//! cancels the search in flight and skips anything still queued, and results
//! for superseded requests are dropped before they reach the caller.

use crate::algorithms::astar::PathPlanner;
use crate::algorithms::transform::CoordinateTransform;
use crate::core::Point2D;
use crate::navigation::path::Path;
use crate::processing::grid::OccupancyGrid;
use crate::validation::error::{NavError, NavResult};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, info, trace, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq)]
struct PlanRequest {
    id: u64,
    start: Point2D,
    goal: Point2D,
}

/// Outcome of one planning request. `path` is `None` when no route exists.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanResult {
    pub request_id: u64,
    pub start: Point2D,
    pub goal: Point2D,
    pub path: Option<Path>,
}

pub struct PlanningWorker {
    requests: Option<Sender<PlanRequest>>,
    results: Receiver<PlanResult>,
    /// Id of the newest request; anything else is stale
    generation: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl PlanningWorker {
    /// Spawn the planning thread over a shared grid
    pub fn spawn<G>(grid: Arc<G>, planner: PathPlanner) -> NavResult<Self>
    where
        G: OccupancyGrid + Send + Sync + ?Sized + 'static,
    {
        let (request_tx, request_rx) = unbounded::<PlanRequest>();
        let (result_tx, result_rx) = unbounded::<PlanResult>();
        let generation = Arc::new(AtomicU64::new(0));

        let current = Arc::clone(&generation);
        let handle = thread::Builder::new()
            .name("planner".into())
            .spawn(move || run_worker(grid, planner, request_rx, result_tx, current))
            .map_err(NavError::Spawn)?;

        Ok(Self {
            requests: Some(request_tx),
            results: result_rx,
            generation,
            handle: Some(handle),
        })
    }

    /// Queue a search, superseding every earlier request. Returns its id.
    pub fn submit(&self, start: Point2D, goal: Point2D) -> NavResult<u64> {
        let requests = self.requests.as_ref().ok_or(NavError::WorkerStopped)?;
        let id = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        requests
            .send(PlanRequest { id, start, goal })
            .map_err(|_| NavError::WorkerStopped)?;
        trace!("[Planner] submitted request {}", id);
        Ok(id)
    }

    /// Abandon the current request without starting a new one
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Id of the newest submitted (or cancelled) request
    pub fn current_request(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Result of the current request, if it has finished
    pub fn try_result(&self) -> Option<PlanResult> {
        while let Ok(result) = self.results.try_recv() {
            if result.request_id == self.current_request() {
                return Some(result);
            }
            trace!("[Planner] dropping stale result {}", result.request_id);
        }
        None
    }

    /// Block up to `timeout` for the current request's result
    pub fn wait_result(&self, timeout: Duration) -> Option<PlanResult> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.results.recv_timeout(remaining) {
                Ok(result) if result.request_id == self.current_request() => return Some(result),
                Ok(result) => trace!("[Planner] dropping stale result {}", result.request_id),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return None
                }
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.requests.is_some()
    }

    /// Stop the thread after the current search and wait for it
    pub fn shutdown(&mut self) {
        self.cancel();
        self.requests = None;
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("[Planner] worker thread panicked");
            }
        }
    }
}

impl Drop for PlanningWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker<G>(
    grid: Arc<G>,
    planner: PathPlanner,
    requests: Receiver<PlanRequest>,
    results: Sender<PlanResult>,
    generation: Arc<AtomicU64>,
) where
    G: OccupancyGrid + ?Sized,
{
    info!("[Planner] worker started");
    let transform = CoordinateTransform::from_grid(&*grid);

    while let Ok(mut request) = requests.recv() {
        // Only the newest queued request is worth searching
        while let Ok(newer) = requests.try_recv() {
            request = newer;
        }
        if request.id != generation.load(Ordering::SeqCst) {
            continue;
        }

        let is_stale = || generation.load(Ordering::SeqCst) != request.id;
        let path =
            planner.plan_cancellable(request.start, request.goal, &*grid, &transform, is_stale);

        if is_stale() {
            debug!("[Planner] request {} superseded", request.id);
            continue;
        }

        let result = PlanResult {
            request_id: request.id,
            start: request.start,
            goal: request.goal,
            path,
        };
        if results.send(result).is_err() {
            break;
        }
    }
    info!("[Planner] worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::grid::BoolGrid;

    fn worker(size: usize) -> PlanningWorker {
        let grid = Arc::new(BoolGrid::new(size, size, 1.0, Point2D::new(0.0, 0.0)));
        PlanningWorker::spawn(grid, PathPlanner::default()).unwrap()
    }

    #[test]
    fn test_plans_in_background() {
        let worker = worker(30);
        let id = worker.submit(Point2D::new(0.0, 0.0), Point2D::new(29.0, 29.0)).unwrap();

        let result = worker.wait_result(Duration::from_secs(10)).unwrap();
        assert_eq!(result.request_id, id);
        let path = result.path.unwrap();
        assert_eq!(path.start(), Some(Point2D::new(0.0, 0.0)));
        assert_eq!(path.destination(), Some(Point2D::new(29.0, 29.0)));
    }

    #[test]
    fn test_last_request_wins() {
        let worker = worker(300);
        let _first = worker.submit(Point2D::new(0.0, 0.0), Point2D::new(299.0, 250.0)).unwrap();
        let second = worker.submit(Point2D::new(0.0, 0.0), Point2D::new(5.0, 5.0)).unwrap();

        let result = worker.wait_result(Duration::from_secs(10)).unwrap();
        assert_eq!(result.request_id, second);
        assert_eq!(result.goal, Point2D::new(5.0, 5.0));
        // Nothing else is pending for the current request
        assert!(worker.try_result().is_none());
    }

    #[test]
    fn test_unreachable_goal_reports_none() {
        let mut grid = BoolGrid::new(10, 10, 1.0, Point2D::new(0.0, 0.0));
        grid.block_rect(5, 0, 5, 9);
        let worker = PlanningWorker::spawn(Arc::new(grid), PathPlanner::default()).unwrap();

        worker.submit(Point2D::new(1.0, 1.0), Point2D::new(8.0, 8.0)).unwrap();
        let result = worker.wait_result(Duration::from_secs(10)).unwrap();
        assert!(result.path.is_none());
    }

    #[test]
    fn test_cancelled_request_yields_nothing() {
        let worker = worker(50);
        worker.submit(Point2D::new(0.0, 0.0), Point2D::new(49.0, 49.0)).unwrap();
        worker.cancel();
        assert!(worker.wait_result(Duration::from_millis(200)).is_none());
    }

    #[test]
    fn test_submit_after_shutdown_fails() {
        let mut worker = worker(5);
        worker.shutdown();
        assert!(!worker.is_running());
        let result = worker.submit(Point2D::new(0.0, 0.0), Point2D::new(4.0, 4.0));
        assert!(matches!(result, Err(NavError::WorkerStopped)));
    }
}
