//! Composition root wiring positioning, planning and guidance together.
//!
//! ```text
//! ranges ──▶ SharedPositionSolver ──┐
//!                                   ├──▶ NavigationTracker ──▶ EventBus
//! tracked poses ──▶ PoseIntegrator ─┘          │
//!                                              │ replan
//!                         PlanningWorker ◀─────┘
//! ```

use crate::algorithms::astar::PathPlanner;
use crate::api::events::EventBus;
use crate::api::planning::{PlanResult, PlanningWorker};
use crate::api::shared::SharedPositionSolver;
use crate::core::{Point2D, PositionEstimate};
use crate::navigation::event::NavigationEvent;
use crate::navigation::tracker::{NavigationState, NavigationTracker, TrackerState};
use crate::processing::grid::{nearest_free_point, OccupancyGrid};
use crate::processing::pose::{PoseIntegrator, TrackedPose};
use crate::utils::config::{NavigationConfig, SiteConfig};
use crate::validation::error::{NavError, NavResult};
use log::{debug, info, warn};
use nalgebra::Vector3;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct NavigationSession<G: OccupancyGrid + Send + Sync + 'static> {
    grid: Arc<G>,
    solver: SharedPositionSolver,
    pose: PoseIntegrator,
    tracker: NavigationTracker,
    planner: PlanningWorker,
    events: Arc<EventBus>,
    destination: Option<Point2D>,
    pending_request: Option<u64>,
    last_position: Option<Point2D>,
    /// Replans starting in a blocked cell are moved this far at most
    snap_radius_m: f64,
}

impl<G: OccupancyGrid + Send + Sync + 'static> NavigationSession<G> {
    /// Validate `config` and start the planning thread
    pub fn new(config: NavigationConfig, grid: Arc<G>) -> NavResult<Self> {
        for warning in config.validate().into_result()? {
            warn!("Navigation config: {}", warning);
        }

        let planner = PlanningWorker::spawn(Arc::clone(&grid), PathPlanner::new(config.planner.clone()))?;

        Ok(Self {
            grid,
            solver: SharedPositionSolver::new(config.solver.clone()),
            pose: PoseIntegrator::new(config.pose.clone()),
            tracker: NavigationTracker::new(config.tracker.clone()),
            planner,
            events: Arc::new(EventBus::new()),
            destination: None,
            pending_request: None,
            last_position: None,
            snap_radius_m: config.pose.snap_radius_m,
        })
    }

    /// Handle for ranging threads that feed measurements directly
    pub fn solver(&self) -> SharedPositionSolver {
        self.solver.clone()
    }

    pub fn events(&self) -> Arc<EventBus> {
        Arc::clone(&self.events)
    }

    pub fn grid(&self) -> &Arc<G> {
        &self.grid
    }

    pub fn current_position(&self) -> Option<Point2D> {
        self.last_position
    }

    pub fn destination(&self) -> Option<Point2D> {
        self.destination
    }

    pub fn tracker_state(&self) -> TrackerState {
        self.tracker.state()
    }

    pub fn navigation_state(&self) -> Option<&NavigationState> {
        self.tracker.navigation_state()
    }

    /// Whether a route request is still outstanding
    pub fn is_planning(&self) -> bool {
        self.pending_request.is_some()
    }

    pub fn set_heading(&mut self, heading_rad: f64) {
        self.tracker.set_heading(heading_rad);
    }

    /// Anchor pose tracking at a known position, e.g. an anchor the user
    /// is standing next to
    pub fn localize_at(&mut self, position: Point2D, heading_rad: f64) {
        self.pose.initialize_at(position, heading_rad);
        self.tracker.set_heading(heading_rad);
        info!("Localized at ({:.2},{:.2})", position.x, position.y);
    }

    /// Feed one range report. Returns the new fix, if any.
    pub fn on_measurement(
        &mut self,
        anchor_id: &str,
        anchor_position: Point2D,
        distance: f64,
        bearing: Option<Vector3<f64>>,
        now: Instant,
    ) -> Option<PositionEstimate> {
        let estimate = self
            .solver
            .update_and_solve(anchor_id, anchor_position, distance, bearing, now);

        if self.pose.is_localized() {
            self.pose.apply_range_correction(anchor_position, distance, now);
        }

        if let Some(estimate) = &estimate {
            self.update_position(estimate.point, estimate.confidence);
        }
        estimate
    }

    /// Feed a pose from the visual-inertial tracker. Ignored until localized.
    pub fn on_tracked_pose(&mut self, pose: TrackedPose, now: Instant) -> Option<Point2D> {
        let position = self.pose.apply_pose_on_grid(pose, &*self.grid)?;
        self.tracker.set_heading(self.pose.heading());
        // Dead reckoning inherits the confidence of the anchor fixes behind it
        let confidence = self.solver.confidence(now);
        self.update_position(position, confidence);
        Some(position)
    }

    /// Feed a position from any other source
    pub fn update_position(&mut self, point: Point2D, confidence: f32) {
        self.last_position = Some(point);
        self.events
            .publish(NavigationEvent::PositionUpdated { point, confidence });

        for event in self.tracker.on_position_update(point) {
            match event {
                NavigationEvent::ReplanRequested { from, to } => {
                    let start = nearest_free_point(&*self.grid, from, self.snap_radius_m)
                        .unwrap_or(from);
                    if let Err(err) = self.request_route(start, to) {
                        warn!("Replan failed: {}", err);
                        self.tracker.rearm_replan();
                    }
                }
                NavigationEvent::Arrived => {
                    // A route finishing now would restart navigation
                    self.planner.cancel();
                    self.pending_request = None;
                }
                _ => {}
            }
            self.events.publish(event);
        }
    }

    /// Plan from the current position to `goal`
    pub fn navigate_to(&mut self, goal: Point2D) -> NavResult<u64> {
        let start = self.last_position.ok_or(NavError::NoFix)?;
        self.navigate_from(start, goal)
    }

    /// Plan from the current position to a named point of interest
    pub fn navigate_to_poi(&mut self, site: &SiteConfig, name: &str) -> NavResult<u64> {
        let poi = site
            .poi_by_name(name)
            .ok_or_else(|| NavError::UnknownDestination(name.to_string()))?;
        info!("Navigating to '{}'", poi.name);
        self.navigate_to(poi.position)
    }

    pub fn navigate_from(&mut self, start: Point2D, goal: Point2D) -> NavResult<u64> {
        self.tracker.stop();
        self.destination = Some(goal);
        self.request_route(start, goal)
    }

    fn request_route(&mut self, start: Point2D, goal: Point2D) -> NavResult<u64> {
        let id = self.planner.submit(start, goal)?;
        debug!(
            "Route request {}: ({:.2},{:.2}) -> ({:.2},{:.2})",
            id, start.x, start.y, goal.x, goal.y
        );
        self.pending_request = Some(id);
        Ok(id)
    }

    /// Install a finished route without blocking. Returns true when
    /// navigation (re)started.
    pub fn poll_route(&mut self) -> NavResult<bool> {
        match self.planner.try_result() {
            Some(result) => self.install_route(result),
            None => Ok(false),
        }
    }

    /// Wait up to `timeout` for the outstanding route
    pub fn wait_for_route(&mut self, timeout: Duration) -> NavResult<bool> {
        if self.pending_request.is_none() {
            return Ok(false);
        }
        match self.planner.wait_result(timeout) {
            Some(result) => self.install_route(result),
            None => Ok(false),
        }
    }

    fn install_route(&mut self, result: PlanResult) -> NavResult<bool> {
        if self.pending_request != Some(result.request_id) {
            return Ok(false);
        }
        self.pending_request = None;
        if self.tracker.state() == TrackerState::Arrived {
            debug!("Ignoring route {} after arrival", result.request_id);
            return Ok(false);
        }

        match result.path {
            Some(path) => {
                self.tracker.start(result.goal, path)?;
                Ok(true)
            }
            None => {
                warn!(
                    "No route from ({:.2},{:.2}) to ({:.2},{:.2})",
                    result.start.x, result.start.y, result.goal.x, result.goal.y
                );
                // Let the next deviation ask again
                self.tracker.rearm_replan();
                Ok(false)
            }
        }
    }

    /// End navigation and forget positioning history
    pub fn stop(&mut self) {
        self.tracker.stop();
        self.planner.cancel();
        self.pending_request = None;
        self.destination = None;
        self.solver.reset();
        info!("Navigation stopped");
    }
}
