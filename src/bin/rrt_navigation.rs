// Waypoint navigation: plan an RRT path, then follow it with PID steering
// on a simulated vehicle.
//
// usage: rrt_navigation [config.toml]

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{error, info, warn};

use rrt_navigation::control::PidController;
use rrt_navigation::path_planning::{PathStitcher, RRTPlanner};
use rrt_navigation::path_tracking::{SharedTrackingState, TrackingFsm, TrackingLoop};
use rrt_navigation::simulation::{PoseNoise, SimulatedVehicle};
use rrt_navigation::utils::{colors, PathStyle, Visualizer};
use rrt_navigation::{NavigationConfig, NavigationError, NavigationResult, Trajectory};

fn load_config() -> NavigationResult<NavigationConfig> {
    let args: Vec<String> = std::env::args().collect();
    if let Some(path) = args.get(1) {
        NavigationConfig::load(Path::new(path))
    } else if Path::new("navigation.toml").exists() {
        NavigationConfig::load(Path::new("navigation.toml"))
    } else {
        info!("Using default configuration");
        Ok(NavigationConfig::default())
    }
}

fn run() -> NavigationResult<()> {
    let config = load_config()?;
    let map = config.map.build_map()?;

    // Planning
    let mut waypoints = config.waypoints.sequencer().build()?;
    let mut planner = RRTPlanner::new(&map, config.planner.clone());
    let path = PathStitcher::new(config.stitch.max_retries).stitch(&mut planner, &mut waypoints)?;
    info!(
        "Path found: {} points over {} segments",
        path.trajectory.len(),
        path.segment_ends.len()
    );

    // Tracking
    let shared = Arc::new(SharedTrackingState::new());
    let dt = config.tracker.period();
    let mut vehicle = SimulatedVehicle::new(
        Arc::clone(&shared),
        &config.tracker.vehicle_name,
        config.simulation.wheelbase,
        dt,
    );
    if config.simulation.position_noise > 0.0 || config.simulation.yaw_noise > 0.0 {
        let noise = PoseNoise {
            position_std: config.simulation.position_noise,
            yaw_std: config.simulation.yaw_noise,
        };
        vehicle = vehicle.with_noise(noise, config.simulation.seed)?;
    }

    let pid = PidController::from_rate(config.pid, config.tracker.control_rate);
    let fsm = TrackingFsm::new(path.trajectory.clone(), pid, config.tracker.clone());
    let start = waypoints[0];
    let loop_state = Arc::clone(&shared);

    // The simulator both drives the vehicle and hosts the path markers
    let vehicle = Arc::new(Mutex::new(vehicle));
    let handle = {
        let sink = Arc::clone(&vehicle);
        let positioning = Arc::clone(&vehicle);
        thread::spawn(move || TrackingLoop::new(fsm, loop_state, sink, positioning, start).run())
    };

    let deadline = Instant::now() + Duration::from_secs_f64(config.simulation.timeout);
    while !handle.is_finished() {
        if Instant::now() >= deadline && !shared.stop_requested() {
            warn!("Timed out after {:.0} s, stopping the vehicle", config.simulation.timeout);
            shared.request_stop();
        }
        thread::sleep(Duration::from_millis(100));
    }
    let report = handle
        .join()
        .map_err(|_| NavigationError::Tracking("tracking thread panicked".to_string()))?;
    info!(
        "Tracking report: {} ticks, reached {}/{} points, aborted: {}",
        report.ticks,
        report.advancements,
        path.trajectory.len().saturating_sub(1),
        report.aborted
    );

    let mut vis = Visualizer::new();
    vis.set_title("RRT navigation").set_bounds(map.bounds());
    vis.plot_map(&map);
    vis.plot_trajectory(&path.trajectory, &PathStyle::new(colors::PATH, "Planned"));
    vis.plot_trajectory(
        &Trajectory::from_points(vehicle.lock().history().to_vec()),
        &PathStyle::new(colors::DRIVEN, "Driven").with_line_width(1.0),
    );
    vis.plot_waypoints(&waypoints);
    vis.plot_robot(&report.final_pose, 1.0);

    std::fs::create_dir_all("./img")?;
    vis.save_svg("./img/rrt_navigation.svg", 600, 1200)?;
    info!("Saved ./img/rrt_navigation.svg");
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("rrt_navigation=info")
            }),
        )
        .init();

    if let Err(e) = run() {
        error!("{}", e);
        std::process::exit(1);
    }
}
