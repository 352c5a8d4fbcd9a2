use crate::algorithms::astar::PlannerConfig;
use crate::algorithms::transform::CoordinateTransform;
use crate::algorithms::trilateration::SolverConfig;
use crate::core::Point2D;
use crate::navigation::tracker::TrackerConfig;
use crate::processing::pose::PoseConfig;
use crate::validation::error::ConfigError;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Anchor triples enclosing less than this area count as collinear (m²)
const MIN_ANCHOR_TRIANGLE_AREA_M2: f64 = 0.5;

/// Tunables for every navigation component
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    pub solver: SolverConfig,
    pub planner: PlannerConfig,
    pub tracker: TrackerConfig,
    pub pose: PoseConfig,
}

/// Occupancy map geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapMetadata {
    /// Meters per cell
    pub resolution: f64,
    /// World position of the bottom-left cell
    pub origin: Point2D,
    pub width_px: usize,
    pub height_px: usize,
    /// Occupancy image or ASCII grid, relative to the site file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl MapMetadata {
    pub fn transform(&self) -> CoordinateTransform {
        CoordinateTransform::new(self.resolution, self.origin, self.width_px, self.height_px)
    }

    pub fn contains(&self, point: Point2D) -> bool {
        let (min, max) = self.transform().world_bounds();
        point.x >= min.x && point.x <= max.x && point.y >= min.y && point.y <= max.y
    }
}

/// Fixed ranging anchor installed at the site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorSite {
    pub id: String,
    pub position: Point2D,
    /// Mounting orientation (degrees)
    #[serde(default)]
    pub yaw_deg: f64,
}

impl AnchorSite {
    pub fn yaw_rad(&self) -> f64 {
        self.yaw_deg.to_radians()
    }
}

/// Named navigation destination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    pub id: String,
    pub name: String,
    pub position: Point2D,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Everything needed to navigate one site
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    #[serde(rename = "map_metadata", skip_serializing_if = "Option::is_none")]
    pub map: Option<MapMetadata>,
    pub anchors: Vec<AnchorSite>,
    pub pois: Vec<PointOfInterest>,
    pub navigation: NavigationConfig,
}

/// Configuration validation result
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Whether configuration is valid
    pub is_valid: bool,
    /// Validation errors
    pub errors: Vec<ConfigError>,
    /// Validation warnings
    pub warnings: Vec<String>,
}

impl ValidationResult {
    fn new() -> Self {
        Self {
            is_valid: true,
            ..Default::default()
        }
    }

    fn error(&mut self, parameter: &str, value: impl ToString, reason: &str) {
        self.errors.push(ConfigError::InvalidParameter {
            parameter: parameter.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        });
        self.is_valid = false;
    }

    fn conflict(&mut self, anchor_id: &str, reason: impl Into<String>) {
        self.errors.push(ConfigError::AnchorConflict {
            anchor_id: anchor_id.to_string(),
            reason: reason.into(),
        });
        self.is_valid = false;
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    fn merge(&mut self, other: ValidationResult) {
        self.is_valid &= other.is_valid;
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// First error, if validation failed
    pub fn into_result(self) -> Result<Vec<String>, ConfigError> {
        match self.errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(self.warnings),
        }
    }
}

impl NavigationConfig {
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        let solver = &self.solver;
        if solver.stale_window_ms == 0 {
            result.error("solver.stale_window_ms", solver.stale_window_ms, "must be positive");
        } else if solver.stale_window_ms > 10_000 {
            result.warn("Stale window above 10 s lets outdated ranges drive the fix");
        }
        if !(solver.max_anchor_range_m > 0.0) {
            result.error("solver.max_anchor_range_m", solver.max_anchor_range_m, "must be positive");
        }
        if !(solver.nlos_threshold_m > 0.0) {
            result.error("solver.nlos_threshold_m", solver.nlos_threshold_m, "must be positive");
        }
        if !(solver.smoothing_alpha > 0.0 && solver.smoothing_alpha <= 1.0) {
            result.error("solver.smoothing_alpha", solver.smoothing_alpha, "must be in (0, 1]");
        }
        let table = &solver.confidence_table;
        if table.iter().any(|c| !(0.0..=1.0).contains(c)) {
            result.error("solver.confidence_table", format!("{:?}", table), "values must be in [0, 1]");
        } else if table.windows(2).any(|w| w[1] < w[0]) {
            result.error("solver.confidence_table", format!("{:?}", table), "must be non-decreasing");
        }

        let planner = &self.planner;
        if !(planner.simplify_epsilon_m >= 0.0) {
            result.error("planner.simplify_epsilon_m", planner.simplify_epsilon_m, "must be non-negative");
        } else if planner.simplify_epsilon_m > 2.0 {
            result.warn("Simplification epsilon above 2 m may cut corners through obstacles");
        }
        if planner.max_expansions == 0 {
            result.error("planner.max_expansions", planner.max_expansions, "must be positive");
        }

        let tracker = &self.tracker;
        for (name, value) in [
            ("tracker.arrival_threshold_m", tracker.arrival_threshold_m),
            ("tracker.waypoint_advance_m", tracker.waypoint_advance_m),
            ("tracker.off_path_threshold_m", tracker.off_path_threshold_m),
            ("tracker.straight_tolerance_rad", tracker.straight_tolerance_rad),
            ("tracker.turn_threshold_rad", tracker.turn_threshold_rad),
        ] {
            if !(value > 0.0) {
                result.error(name, value, "must be positive");
            }
        }
        if tracker.straight_tolerance_rad >= tracker.turn_threshold_rad {
            result.error(
                "tracker.straight_tolerance_rad",
                tracker.straight_tolerance_rad,
                "must be below tracker.turn_threshold_rad",
            );
        }
        if tracker.off_path_threshold_m <= tracker.waypoint_advance_m {
            result.warn("Off-path threshold at or below waypoint advance distance triggers constant replanning");
        }

        let pose = &self.pose;
        if !(pose.correction_gain > 0.0 && pose.correction_gain <= 1.0) {
            result.error("pose.correction_gain", pose.correction_gain, "must be in (0, 1]");
        }
        if pose.snap_radius_m < 0.0 {
            result.error("pose.snap_radius_m", pose.snap_radius_m, "must be non-negative");
        }

        result
    }
}

impl SiteConfig {
    /// Parse and validate a site file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(&path)?;
        let site = Self::from_json(&content)?;
        info!(
            "Loaded site config from {}: {} anchors, {} POIs",
            path.as_ref().display(),
            site.anchors.len(),
            site.pois.len()
        );
        Ok(site)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let site: SiteConfig = serde_json::from_str(content)?;
        for warning in site.validate().into_result()? {
            warn!("Site config: {}", warning);
        }
        Ok(site)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn anchor(&self, id: &str) -> Option<&AnchorSite> {
        self.anchors.iter().find(|a| a.id == id)
    }

    /// Case-insensitive lookup by display name
    pub fn poi_by_name(&self, name: &str) -> Option<&PointOfInterest> {
        self.pois.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Up to `count` anchors ordered by distance from `point`
    pub fn nearest_anchors(&self, point: Point2D, count: usize) -> Vec<&AnchorSite> {
        let mut anchors: Vec<&AnchorSite> = self.anchors.iter().collect();
        anchors.sort_by(|a, b| {
            a.position
                .distance_squared_to(&point)
                .total_cmp(&b.position.distance_squared_to(&point))
        });
        anchors.truncate(count);
        anchors
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = self.navigation.validate();

        if let Some(map) = &self.map {
            if !(map.resolution > 0.0) {
                result.error("map_metadata.resolution", map.resolution, "must be positive");
            }
            if map.width_px == 0 || map.height_px == 0 {
                result.error(
                    "map_metadata.size",
                    format!("{}x{}", map.width_px, map.height_px),
                    "map must contain at least one cell",
                );
            }
        }

        result.merge(self.validate_anchors());

        let mut names = HashSet::new();
        for poi in &self.pois {
            if poi.name.trim().is_empty() {
                result.error("pois.name", &poi.id, "name must not be empty");
            } else if !names.insert(poi.name.to_lowercase()) {
                result.warn(format!("Duplicate POI name '{}'", poi.name));
            }
        }

        result
    }

    fn validate_anchors(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        let mut ids = HashSet::new();
        for anchor in &self.anchors {
            if anchor.id.trim().is_empty() {
                result.error("anchors.id", &anchor.id, "anchor id must not be empty");
            } else if !ids.insert(anchor.id.as_str()) {
                result.conflict(&anchor.id, "duplicate anchor id");
            }
            if !anchor.position.is_finite() {
                result.conflict(&anchor.id, "position is not finite");
            }
            if let Some(map) = &self.map {
                if !map.contains(anchor.position) {
                    result.warn(format!("Anchor '{}' lies outside the map", anchor.id));
                }
            }
        }

        if self.anchors.len() < 3 {
            result.warn(format!(
                "{} anchors configured; trilateration needs at least 3",
                self.anchors.len()
            ));
        } else if max_triangle_area(&self.anchors) < MIN_ANCHOR_TRIANGLE_AREA_M2 {
            result.warn("Anchors are collinear; trilateration will be degenerate");
        }

        result
    }
}

fn max_triangle_area(anchors: &[AnchorSite]) -> f64 {
    let mut best: f64 = 0.0;
    for (i, a) in anchors.iter().enumerate() {
        for (j, b) in anchors.iter().enumerate().skip(i + 1) {
            for c in anchors.iter().skip(j + 1) {
                let ab = b.position - a.position;
                let ac = c.position - a.position;
                best = best.max((ab.x * ac.y - ab.y * ac.x).abs() / 2.0);
            }
        }
    }
    best
}
