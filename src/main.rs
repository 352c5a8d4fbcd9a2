use clap::{Parser, Subcommand};
use env_logger::Env;
use indoor_nav::algorithms::astar::{PathPlanner, PlannerConfig};
use indoor_nav::algorithms::transform::CoordinateTransform;
use indoor_nav::algorithms::trilateration::PositionSolver;
use indoor_nav::core::{Point2D, PositionEstimate};
use indoor_nav::processing::grid::{nearest_free_point, BoolGrid};
use indoor_nav::processing::pose::PoseConfig;
use indoor_nav::utils::config::SiteConfig;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "indoor-nav")]
#[command(about = "Indoor positioning and route planning")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Plan a route across an ASCII occupancy map ('#' blocked)
    Plan {
        /// ASCII map file
        #[arg(short, long)]
        map: PathBuf,

        /// Meters per cell
        #[arg(short, long, default_value = "0.1")]
        resolution: f64,

        /// World position of the bottom-left cell, as x,y
        #[arg(long, default_value = "0,0", value_parser = parse_point)]
        origin: Point2D,

        /// Start position, as x,y
        #[arg(long, value_parser = parse_point)]
        from: Point2D,

        /// Goal position, as x,y
        #[arg(long, value_parser = parse_point)]
        to: Point2D,

        /// Douglas–Peucker tolerance (meters)
        #[arg(long, default_value = "0.5")]
        epsilon: f64,

        /// Forbid diagonal moves past blocked corners
        #[arg(long)]
        no_corner_cutting: bool,

        /// Move blocked endpoints to the nearest free cell
        #[arg(long)]
        snap: bool,
    },

    /// Solve a position from a JSON file of range measurements
    Locate {
        /// Measurements file
        measurements: PathBuf,

        /// Site file used to look up anchor positions by id
        #[arg(long)]
        site: Option<PathBuf>,
    },

    /// Print the default site configuration, or validate a site file
    Config {
        #[arg(long)]
        validate: Option<PathBuf>,
    },
}

#[derive(Debug, Deserialize)]
struct MeasurementsJson {
    measurements: Vec<MeasurementJson>,
}

#[derive(Debug, Deserialize)]
struct MeasurementJson {
    anchor_id: String,
    /// Falls back to the site file when absent
    #[serde(default)]
    position: Option<Point2D>,
    distance: f64,
    /// Unit direction towards the anchor in the device frame
    #[serde(default)]
    bearing: Option<[f64; 3]>,
    /// How long ago the range was taken
    #[serde(default)]
    age_ms: u64,
}

#[derive(Debug, Serialize)]
struct LocateReport {
    estimate: PositionEstimate,
    /// Anchor positions relative to the device, for ranges that came with a bearing
    #[serde(skip_serializing_if = "Vec::is_empty")]
    anchor_offsets: Vec<AnchorOffset>,
}

#[derive(Debug, Serialize)]
struct AnchorOffset {
    anchor_id: String,
    offset: Point2D,
}

fn parse_point(s: &str) -> Result<Point2D, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected x,y but got '{}'", s))?;
    let x = x.trim().parse::<f64>().map_err(|e| format!("bad x '{}': {}", x, e))?;
    let y = y.trim().parse::<f64>().map_err(|e| format!("bad y '{}': {}", y, e))?;
    Ok(Point2D::new(x, y))
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Plan {
            map,
            resolution,
            origin,
            from,
            to,
            epsilon,
            no_corner_cutting,
            snap,
        } => {
            let config = PlannerConfig {
                simplify_epsilon_m: epsilon,
                allow_corner_cutting: !no_corner_cutting,
                ..Default::default()
            };
            run_plan(&map, resolution, origin, from, to, config, snap)
        }
        Command::Locate { measurements, site } => run_locate(&measurements, site.as_deref()),
        Command::Config { validate } => run_config(validate.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run_plan(
    map: &std::path::Path,
    resolution: f64,
    origin: Point2D,
    from: Point2D,
    to: Point2D,
    config: PlannerConfig,
    snap: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(map)?;
    let grid = BoolGrid::from_ascii(&text, resolution, origin)?;
    let transform = CoordinateTransform::from_grid(&grid);
    log::info!(
        "Loaded {}x{} map, {} free cells",
        transform.width,
        transform.height,
        grid.free_cell_count()
    );

    let (from, to) = if snap {
        let radius = PoseConfig::default().snap_radius_m;
        (
            nearest_free_point(&grid, from, radius).unwrap_or(from),
            nearest_free_point(&grid, to, radius).unwrap_or(to),
        )
    } else {
        (from, to)
    };

    let planner = PathPlanner::new(config);
    let path = planner
        .plan(from, to, &grid, &transform)
        .ok_or("no path between the requested points")?;

    println!("{}", serde_json::to_string_pretty(&path)?);
    log::info!(
        "{} waypoints, {:.2} m, ~{:.0} s walking",
        path.len(),
        path.total_distance,
        path.estimated_walking_time().as_secs_f64()
    );
    Ok(())
}

fn run_locate(
    measurements: &std::path::Path,
    site: Option<&std::path::Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let input: MeasurementsJson = serde_json::from_str(&std::fs::read_to_string(measurements)?)?;
    let site = site.map(SiteConfig::load_from_file).transpose()?;

    let mut solver = PositionSolver::new(
        site.as_ref()
            .map(|s| s.navigation.solver.clone())
            .unwrap_or_default(),
    );
    let now = Instant::now();

    for m in &input.measurements {
        let position = match (m.position, &site) {
            (Some(p), _) => p,
            (None, Some(site)) => site
                .anchor(&m.anchor_id)
                .map(|a| a.position)
                .ok_or_else(|| format!("anchor '{}' not in site file", m.anchor_id))?,
            (None, None) => return Err(format!("anchor '{}' has no position", m.anchor_id).into()),
        };
        let observed_at = now
            .checked_sub(Duration::from_millis(m.age_ms))
            .unwrap_or(now);
        let bearing = m.bearing.map(|[x, y, z]| Vector3::new(x, y, z));
        solver.update_measurement(m.anchor_id.clone(), position, m.distance, bearing, observed_at);
    }

    match solver.solve(now) {
        Some(estimate) => {
            let report = LocateReport {
                estimate,
                anchor_offsets: anchor_offsets(&solver),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        None => Err(format!(
            "no fix: {} valid anchors (confidence {:.2})",
            solver.valid_count(now),
            solver.confidence(now)
        )
        .into()),
    }
}

fn anchor_offsets(solver: &PositionSolver) -> Vec<AnchorOffset> {
    let mut offsets: Vec<AnchorOffset> = solver
        .active_measurements()
        .into_iter()
        .filter(|m| m.bearing.is_some())
        .map(|m| AnchorOffset {
            anchor_id: m.anchor_id.clone(),
            offset: m.planar_offset(),
        })
        .collect();
    offsets.sort_by(|a, b| a.anchor_id.cmp(&b.anchor_id));
    offsets
}

fn run_config(validate: Option<&std::path::Path>) -> Result<(), Box<dyn std::error::Error>> {
    match validate {
        None => {
            println!("{}", serde_json::to_string_pretty(&SiteConfig::default())?);
            Ok(())
        }
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            let site: SiteConfig = serde_json::from_str(&content)?;
            let result = site.validate();
            for warning in &result.warnings {
                println!("warning: {}", warning);
            }
            for error in &result.errors {
                println!("error: {}", error);
            }
            if result.is_valid {
                println!("{} is valid", path.display());
                Ok(())
            } else {
                Err(format!("{} has {} error(s)", path.display(), result.errors.len()).into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_point() {
        assert_eq!(parse_point("1.5, -2").unwrap(), Point2D::new(1.5, -2.0));
        assert!(parse_point("1.5").is_err());
        assert!(parse_point("a,b").is_err());
    }

    #[test]
    fn test_measurement_json_defaults() {
        let input: MeasurementsJson = serde_json::from_str(
            r#"{ "measurements": [ { "anchor_id": "anchor_A", "distance": 4.2 } ] }"#,
        )
        .unwrap();
        let m = &input.measurements[0];
        assert_eq!(m.position, None);
        assert_eq!(m.age_ms, 0);
    }

    #[test]
    fn test_offsets_only_for_bearing_ranges() {
        let now = Instant::now();
        let mut solver = PositionSolver::default();
        solver.update_measurement("b", Point2D::new(4.0, 0.0), 2.0, Some(Vector3::new(0.0, 0.0, 1.0)), now);
        solver.update_measurement("a", Point2D::new(0.0, 4.0), 3.0, Some(Vector3::new(1.0, 0.0, 0.0)), now);
        solver.update_measurement("c", Point2D::new(4.0, 4.0), 1.0, None, now);

        let offsets = anchor_offsets(&solver);
        assert_eq!(offsets.len(), 2);
        assert_eq!(offsets[0].anchor_id, "a");
        assert_eq!(offsets[0].offset, Point2D::new(3.0, 0.0));
        assert_eq!(offsets[1].anchor_id, "b");
        assert_eq!(offsets[1].offset, Point2D::new(0.0, 2.0));
    }

    #[test]
    fn test_cli_parses_plan() {
        let cli = Cli::try_parse_from([
            "indoor-nav", "plan", "--map", "floor.txt", "--from", "0,0", "--to", "3.5,2",
        ])
        .unwrap();
        match cli.command {
            Command::Plan { from, to, resolution, .. } => {
                assert_eq!(from, Point2D::new(0.0, 0.0));
                assert_eq!(to, Point2D::new(3.5, 2.0));
                assert_eq!(resolution, 0.1);
            }
            _ => panic!("expected plan"),
        }
    }
}
