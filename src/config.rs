//! Configuration loading for rrt_navigation

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use crate::common::{AreaBounds, NavigationError, NavigationResult, Point2D};
use crate::control::PidConfig;
use crate::mapping::{OccupancyMap, DEFAULT_OCCUPIED_THRESHOLD};
use crate::path_planning::{PlannerConfig, WaypointSequencer, DEFAULT_MAX_RETRIES};
use crate::path_tracking::TrackerConfig;

/// Main configuration structure
#[derive(Clone, Debug, Deserialize, Default)]
pub struct NavigationConfig {
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub stitch: StitchConfig,
    #[serde(default)]
    pub waypoints: WaypointConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub pid: PidConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Map source and geometry
#[derive(Clone, Debug, Deserialize)]
pub struct MapConfig {
    /// Grayscale image (PGM/PNG); a synthetic map is built when unset
    #[serde(default)]
    pub image: Option<PathBuf>,

    /// Metres per cell (default: 0.05)
    #[serde(default = "default_resolution")]
    pub resolution: f64,

    /// World sampling bounds `[xmin, xmax, ymin, ymax]`
    #[serde(default = "default_bounds")]
    pub bounds: [f64; 4],

    /// Grayscale values below this are obstacles (default: 127)
    #[serde(default = "default_occupied_threshold")]
    pub occupied_threshold: u8,

    /// Rectangular obstacles `[xmin, xmax, ymin, ymax]` of the synthetic map
    #[serde(default = "default_obstacles")]
    pub obstacles: Vec<[f64; 4]>,
}

/// Rollback bound for path stitching
#[derive(Clone, Debug, Deserialize)]
pub struct StitchConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

/// Candidate table and visiting order
#[derive(Clone, Debug, Deserialize)]
pub struct WaypointConfig {
    #[serde(default = "default_candidates")]
    pub candidates: Vec<Point2D>,

    #[serde(default = "default_order")]
    pub order: Vec<usize>,

    /// Heading at the first waypoint [rad]; unset leaves the first segment free
    #[serde(default)]
    pub start_heading: Option<f64>,
}

/// Stand-in vehicle used by the navigation demo
#[derive(Clone, Debug, Deserialize)]
pub struct SimulationConfig {
    /// Front-to-rear axle distance [m] (default: 0.325)
    #[serde(default = "default_wheelbase")]
    pub wheelbase: f64,

    /// Std-dev of published position noise [m]
    #[serde(default)]
    pub position_noise: f64,

    /// Std-dev of published yaw noise [rad]
    #[serde(default)]
    pub yaw_noise: f64,

    #[serde(default)]
    pub seed: u64,

    /// Give up after this long [s]
    #[serde(default = "default_timeout")]
    pub timeout: f64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            image: None,
            resolution: default_resolution(),
            bounds: default_bounds(),
            occupied_threshold: default_occupied_threshold(),
            obstacles: default_obstacles(),
        }
    }
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
        }
    }
}

impl Default for WaypointConfig {
    fn default() -> Self {
        Self {
            candidates: default_candidates(),
            order: default_order(),
            start_heading: None,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            wheelbase: default_wheelbase(),
            position_noise: 0.0,
            yaw_noise: 0.0,
            seed: 0,
            timeout: default_timeout(),
        }
    }
}

// Default value functions
fn default_resolution() -> f64 {
    0.05
}
fn default_bounds() -> [f64; 4] {
    [-4.5, 4.5, -13.5, 13.5]
}
fn default_occupied_threshold() -> u8 {
    DEFAULT_OCCUPIED_THRESHOLD
}
fn default_obstacles() -> Vec<[f64; 4]> {
    vec![[-1.5, 1.5, -8.0, 8.0]]
}
fn default_max_retries() -> usize {
    DEFAULT_MAX_RETRIES
}
fn default_candidates() -> Vec<Point2D> {
    vec![
        Point2D::new(-3.5, 12.0),
        Point2D::new(2.0, 12.0),
        Point2D::new(3.5, -10.5),
        Point2D::new(-2.0, -12.0),
        Point2D::new(-3.5, 10.0),
    ]
}
fn default_order() -> Vec<usize> {
    vec![0, 1, 2, 3, 4]
}
fn default_wheelbase() -> f64 {
    0.325
}
fn default_timeout() -> f64 {
    300.0
}

impl MapConfig {
    pub fn area_bounds(&self) -> AreaBounds {
        AreaBounds::from_array(self.bounds)
    }

    /// Load the configured image, or build the synthetic map
    pub fn build_map(&self) -> NavigationResult<OccupancyMap> {
        let bounds = self.area_bounds();
        let map = match &self.image {
            Some(path) => OccupancyMap::from_image(path, self.resolution, bounds)?,
            None => {
                let obstacles: Vec<AreaBounds> =
                    self.obstacles.iter().copied().map(AreaBounds::from_array).collect();
                info!("No map image configured, using {} rectangular obstacles", obstacles.len());
                OccupancyMap::from_rectangles(self.resolution, bounds, &obstacles)?
            }
        };
        Ok(map.with_occupied_threshold(self.occupied_threshold))
    }
}

impl WaypointConfig {
    pub fn sequencer(&self) -> WaypointSequencer {
        WaypointSequencer::new(self.candidates.clone(), self.order.clone())
            .with_start_heading(self.start_heading)
    }
}

impl NavigationConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> NavigationResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NavigationError::Config(format!("Failed to read config file: {}", e)))?;
        let config = Self::from_toml(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> NavigationResult<Self> {
        let config: NavigationConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> NavigationResult<()> {
        if self.map.resolution <= 0.0 {
            return Err(NavigationError::Config(format!(
                "map.resolution must be positive, got {}",
                self.map.resolution
            )));
        }
        let [xmin, xmax, ymin, ymax] = self.map.bounds;
        if xmin > xmax || ymin > ymax {
            return Err(NavigationError::Config(format!(
                "map.bounds are inverted: {:?}",
                self.map.bounds
            )));
        }
        if let Some(&bad) = self
            .waypoints
            .order
            .iter()
            .find(|&&i| i >= self.waypoints.candidates.len())
        {
            return Err(NavigationError::Config(format!(
                "waypoints.order refers to candidate {} but only {} exist",
                bad,
                self.waypoints.candidates.len()
            )));
        }
        if self.simulation.wheelbase <= 0.0 {
            return Err(NavigationError::Config(
                "simulation.wheelbase must be positive".to_string(),
            ));
        }
        if self.simulation.position_noise < 0.0 || self.simulation.yaw_noise < 0.0 {
            return Err(NavigationError::Config(format!(
                "simulation noise must be non-negative, got position {} / yaw {}",
                self.simulation.position_noise, self.simulation.yaw_noise
            )));
        }

        self.planner.validate()?;
        self.tracker.validate()?;
        self.pid.validate()?;
        Ok(())
    }
}
