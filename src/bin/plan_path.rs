// Waypoint path planning: RRT segments stitched with rollback, plotted with gnuplot.
//
// usage: plan_path [config.toml]

use std::path::Path;

use tracing::{error, info};

use rrt_navigation::path_planning::{PathStitcher, RRTPlanner, RrtTree};
use rrt_navigation::utils::{colors, PathStyle, Visualizer};
use rrt_navigation::{NavigationConfig, NavigationResult, SegmentPlanner, SegmentResult, Waypoint};

/// Keeps the search tree of every segment that made it into the path
struct TreeRecorder<'a> {
    planner: RRTPlanner<'a>,
    trees: Vec<RrtTree>,
}

impl SegmentPlanner for TreeRecorder<'_> {
    fn plan_segment(&mut self, start: &Waypoint, goal: &Waypoint) -> SegmentResult {
        let result = self.planner.plan_segment(start, goal);
        if result.is_reached() {
            // Roll back alongside the stitcher: a replanned segment replaces its tree
            let segment = self
                .trees
                .iter()
                .position(|t| t.nodes().first().map(|n| n.position()) == Some(start.position()));
            if let Some(index) = segment {
                self.trees.truncate(index);
            }
            self.trees.push(self.planner.last_tree().clone());
        }
        result
    }
}

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
    let mut waypoints = config.waypoints.sequencer().build()?;
    info!("Planning through {} waypoints", waypoints.len());

    let mut recorder = TreeRecorder {
        planner: RRTPlanner::new(&map, config.planner.clone()),
        trees: Vec::new(),
    };
    let stitcher = PathStitcher::new(config.stitch.max_retries);
    let path = stitcher.stitch(&mut recorder, &mut waypoints)?;
    info!(
        "Path found: {} points, {:.2} m, {} retries, segment ends {:?}",
        path.trajectory.len(),
        path.trajectory.total_length(),
        path.retries,
        path.segment_ends
    );

    let mut vis = Visualizer::new();
    vis.set_title("RRT waypoint path").set_bounds(map.bounds());
    vis.plot_map(&map);
    for tree in &recorder.trees {
        vis.plot_tree(tree);
    }
    vis.plot_trajectory(&path.trajectory, &PathStyle::new(colors::PATH, "Path"));
    vis.plot_waypoints(&waypoints);

    std::fs::create_dir_all("./img")?;
    vis.save_svg("./img/plan_path.svg", 600, 1200)?;
    info!("Saved ./img/plan_path.svg");
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("rrt_navigation=info,plan_path=info")),
        )
        .init();

    if let Err(e) = run() {
        error!("{}", e);
        std::process::exit(1);
    }
}
