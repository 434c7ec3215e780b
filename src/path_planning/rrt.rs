//! RRT (Rapidly-exploring Random Tree) segment planner
//!
//! Grows one tree per pair of consecutive waypoints over an occupancy map.
//! Nodes live in a single arena and refer to their parent by index, so the
//! tree can never contain a cycle and backtracking is a chain of lookups.

use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use tracing::debug;

use crate::common::{
    normalize_angle, NavigationError, NavigationResult, Point2D, Pose2D, SegmentPlanner,
    SegmentResult, Trajectory, Waypoint,
};
use crate::mapping::OccupancyMap;

/// Node of the search tree
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeNode {
    pub x: f64,
    pub y: f64,
    /// Direction of travel into this node; `None` only for a root with a free heading
    pub heading: Option<f64>,
    pub parent: Option<usize>,
}

impl TreeNode {
    pub fn new(x: f64, y: f64, heading: Option<f64>) -> Self {
        TreeNode {
            x,
            y,
            heading,
            parent: None,
        }
    }

    pub fn position(&self) -> Point2D {
        Point2D::new(self.x, self.y)
    }
}

/// Arena of tree nodes; index 0 is the root
#[derive(Debug, Clone, Default)]
pub struct RrtTree {
    nodes: Vec<TreeNode>,
}

impl RrtTree {
    pub fn with_root(x: f64, y: f64, heading: Option<f64>) -> Self {
        RrtTree {
            nodes: vec![TreeNode::new(x, y, heading)],
        }
    }

    /// Insert a node and return its index. The parent must already be in the tree.
    pub fn add_node(&mut self, node: TreeNode) -> usize {
        debug_assert!(node.parent.map_or(true, |p| p < self.nodes.len()));
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Index of the node closest to `point` (Euclidean in x, y)
    pub fn nearest(&self, point: Point2D) -> usize {
        self.nodes
            .iter()
            .enumerate()
            .min_by_key(|(_, node)| OrderedFloat(node.position().distance_squared(&point)))
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    /// Walk parent links from `leaf` to the root and return the root-to-leaf path
    pub fn backtrack(&self, leaf: usize) -> Trajectory {
        let mut points = Vec::new();
        let mut node_index = Some(leaf);

        while let Some(index) = node_index {
            let node = &self.nodes[index];
            points.push(node);
            node_index = node.parent;
        }
        points.reverse();

        let mut poses: Vec<Pose2D> = Vec::with_capacity(points.len());
        for (i, node) in points.iter().enumerate() {
            let yaw = match node.heading {
                Some(heading) => heading,
                None => points
                    .get(i + 1)
                    .map(|next| node.position().bearing_to(&next.position()))
                    .unwrap_or(0.0),
            };
            poses.push(Pose2D::new(node.x, node.y, yaw));
        }

        Trajectory::from_points(poses)
    }

    /// Parent-child segments, for plotting
    pub fn edges(&self) -> Vec<(Point2D, Point2D)> {
        self.nodes
            .iter()
            .filter_map(|node| {
                node.parent
                    .map(|p| (self.nodes[p].position(), node.position()))
            })
            .collect()
    }
}

/// Configuration for the RRT segment planner
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Required clearance from occupied cells [cells]
    pub margin: usize,
    /// Sampling budget per segment (K)
    pub max_iterations: usize,
    /// Longest edge a single expansion may add [m]
    pub max_step_length: f64,
    /// Percentage of samples drawn at the goal (0-100)
    pub goal_sample_rate: u32,
    /// A new node this close to the goal is connected to it directly [m]
    pub capture_radius: f64,
    /// Largest heading change between consecutive edges [rad]; `None` disables the limit
    pub max_heading_change: Option<f64>,
    /// Seed for reproducible sampling
    pub seed: Option<u64>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            margin: 8,
            max_iterations: 10000,
            max_step_length: 1.2,
            goal_sample_rate: 5,
            capture_radius: 1.2,
            max_heading_change: Some(std::f64::consts::FRAC_PI_2),
            seed: None,
        }
    }
}

impl PlannerConfig {
    pub fn validate(&self) -> NavigationResult<()> {
        if self.max_iterations == 0 {
            return Err(NavigationError::InvalidParameter(
                "planner max_iterations must be positive".to_string(),
            ));
        }
        if self.max_step_length <= 0.0 {
            return Err(NavigationError::InvalidParameter(
                "planner max_step_length must be positive".to_string(),
            ));
        }
        if self.capture_radius <= 0.0 {
            return Err(NavigationError::InvalidParameter(
                "planner capture_radius must be positive".to_string(),
            ));
        }
        if self.goal_sample_rate > 100 {
            return Err(NavigationError::InvalidParameter(format!(
                "goal_sample_rate is a percentage, got {}",
                self.goal_sample_rate
            )));
        }
        if let Some(limit) = self.max_heading_change {
            if limit <= 0.0 {
                return Err(NavigationError::InvalidParameter(
                    "max_heading_change must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// RRT planner bound to one map
pub struct RRTPlanner<'a> {
    map: &'a OccupancyMap,
    config: PlannerConfig,
    rng: StdRng,
    tree: RrtTree,
}

impl<'a> RRTPlanner<'a> {
    /// Create a new RRT planner
    pub fn new(map: &'a OccupancyMap, config: PlannerConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        RRTPlanner {
            map,
            config,
            rng,
            tree: RrtTree::default(),
        }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Tree grown by the most recent call to `plan_segment`
    pub fn last_tree(&self) -> &RrtTree {
        &self.tree
    }

    fn sample_point(&mut self, goal: Point2D) -> Point2D {
        if self.rng.gen_range(0..100) < self.config.goal_sample_rate {
            return goal;
        }
        let bounds = *self.map.bounds();
        Point2D::new(
            self.rng.gen_range(bounds.xmin..=bounds.xmax),
            self.rng.gen_range(bounds.ymin..=bounds.ymax),
        )
    }

    fn turn_allowed(&self, from_heading: Option<f64>, heading: f64) -> bool {
        match (self.config.max_heading_change, from_heading) {
            (Some(limit), Some(current)) => normalize_angle(heading - current).abs() <= limit + 1e-9,
            _ => true,
        }
    }

    /// Move from `from` toward `toward` by at most one step
    fn steer(&self, from: &TreeNode, toward: Point2D) -> Option<TreeNode> {
        let origin = from.position();
        let distance = origin.distance(&toward);
        if distance < 1e-9 {
            return None;
        }

        let bearing = origin.bearing_to(&toward);
        let mut heading = bearing;
        if let (Some(limit), Some(current)) = (self.config.max_heading_change, from.heading) {
            let turn = normalize_angle(bearing - current).clamp(-limit, limit);
            heading = normalize_angle(current + turn);
        }

        // Land exactly on the target when it is within reach and no turn was clipped
        if distance <= self.config.max_step_length && heading == bearing {
            return Some(TreeNode::new(toward.x, toward.y, Some(heading)));
        }

        let step = distance.min(self.config.max_step_length);
        Some(TreeNode::new(
            origin.x + step * heading.cos(),
            origin.y + step * heading.sin(),
            Some(heading),
        ))
    }

    /// Connect node `index` to the goal if it is close enough; returns the goal's node index
    fn try_connect_goal(&mut self, index: usize, goal: Point2D) -> Option<usize> {
        let node = self.tree.nodes()[index];
        let distance = node.position().distance(&goal);
        if distance > self.config.capture_radius {
            return None;
        }
        if distance < 1e-9 {
            return Some(index);
        }

        let heading = node.position().bearing_to(&goal);
        if !self.turn_allowed(node.heading, heading) {
            return None;
        }
        if !self.map.is_segment_free(node.position(), goal, self.config.margin) {
            return None;
        }

        let mut goal_node = TreeNode::new(goal.x, goal.y, Some(heading));
        goal_node.parent = Some(index);
        Some(self.tree.add_node(goal_node))
    }
}

impl<'a> SegmentPlanner for RRTPlanner<'a> {
    fn plan_segment(&mut self, start: &Waypoint, goal: &Waypoint) -> SegmentResult {
        let start_pt = start.position();
        let goal_pt = goal.position();
        let margin = self.config.margin;
        self.tree = RrtTree::with_root(start.x, start.y, start.heading);

        if !self.map.is_free(start_pt, margin) || !self.map.is_free(goal_pt, margin) {
            tracing::warn!(
                "Segment ({:.2}, {:.2}) -> ({:.2}, {:.2}) has a blocked endpoint at margin {}",
                start.x,
                start.y,
                goal.x,
                goal.y,
                margin
            );
            return SegmentResult::NotFound {
                iterations: 0,
                tree_size: self.tree.len(),
            };
        }

        for iteration in 1..=self.config.max_iterations {
            let sample = self.sample_point(goal_pt);
            let nearest_ind = self.tree.nearest(sample);
            let nearest_node = self.tree.nodes()[nearest_ind];

            let mut new_node = match self.steer(&nearest_node, sample) {
                Some(node) => node,
                None => continue,
            };
            if !self
                .map
                .is_segment_free(nearest_node.position(), new_node.position(), margin)
            {
                continue;
            }

            new_node.parent = Some(nearest_ind);
            let new_ind = self.tree.add_node(new_node);

            if let Some(goal_ind) = self.try_connect_goal(new_ind, goal_pt) {
                let trajectory = self.tree.backtrack(goal_ind);
                debug!(
                    "RRT reached goal after {} iterations ({} nodes, {} path points)",
                    iteration,
                    self.tree.len(),
                    trajectory.len()
                );
                return SegmentResult::Reached(trajectory);
            }
        }

        debug!(
            "RRT exhausted {} iterations with {} nodes",
            self.config.max_iterations,
            self.tree.len()
        );
        SegmentResult::NotFound {
            iterations: self.config.max_iterations,
            tree_size: self.tree.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::AreaBounds;
    use nalgebra::DMatrix;

    const FREE: u8 = 255;
    const WALL: u8 = 0;

    fn open_map() -> OccupancyMap {
        let grid = DMatrix::from_element(41, 41, FREE);
        OccupancyMap::centered(grid, 0.1, AreaBounds::new(-1.5, 1.5, -1.5, 1.5)).unwrap()
    }

    /// 6 m x 6 m with a wall along x = 0 and a gap around y = 2
    fn wall_with_gap_map() -> OccupancyMap {
        let mut grid = DMatrix::from_element(61, 61, FREE);
        for col in 0..61 {
            if !(45..=55).contains(&col) {
                grid[(30, col)] = WALL;
            }
        }
        OccupancyMap::centered(grid, 0.1, AreaBounds::new(-2.8, 2.8, -2.8, 2.8)).unwrap()
    }

    fn test_config() -> PlannerConfig {
        PlannerConfig {
            margin: 1,
            max_iterations: 5000,
            max_step_length: 0.3,
            goal_sample_rate: 10,
            capture_radius: 0.3,
            max_heading_change: None,
            seed: Some(42),
        }
    }

    fn assert_clearance(map: &OccupancyMap, traj: &Trajectory, margin: usize) {
        for p in traj.iter() {
            assert!(map.is_free(p.position(), margin), "point {:?} violates clearance", p);
        }
        for w in traj.points.windows(2) {
            assert!(map.is_segment_free(w[0].position(), w[1].position(), margin));
        }
    }

    #[test]
    fn test_rrt_config_default() {
        let config = PlannerConfig::default();
        assert_eq!(config.margin, 8);
        assert_eq!(config.max_iterations, 10000);
        assert_eq!(config.max_step_length, 1.2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rrt_config_validation() {
        let mut config = test_config();
        config.max_step_length = 0.0;
        assert!(config.validate().is_err());
        let mut config = test_config();
        config.goal_sample_rate = 101;
        assert!(config.validate().is_err());
        let mut config = test_config();
        config.max_iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tree_backtrack() {
        let mut tree = RrtTree::with_root(0.0, 0.0, None);
        let mut a = TreeNode::new(1.0, 0.0, Some(0.0));
        a.parent = Some(0);
        let a = tree.add_node(a);
        let mut stray = TreeNode::new(-1.0, 0.0, Some(std::f64::consts::PI));
        stray.parent = Some(0);
        tree.add_node(stray);
        let mut b = TreeNode::new(1.0, 1.0, Some(std::f64::consts::FRAC_PI_2));
        b.parent = Some(a);
        let b = tree.add_node(b);

        let traj = tree.backtrack(b);
        assert_eq!(traj.len(), 3);
        assert_eq!(traj.points[0].position(), Point2D::new(0.0, 0.0));
        assert_eq!(traj.points[2].position(), Point2D::new(1.0, 1.0));
        // Free root heading takes the direction of the first step
        assert!(traj.points[0].yaw.abs() < 1e-12);
        assert_eq!(tree.edges().len(), 3);
    }

    #[test]
    fn test_tree_nearest() {
        let mut tree = RrtTree::with_root(0.0, 0.0, None);
        let mut n = TreeNode::new(2.0, 2.0, None);
        n.parent = Some(0);
        tree.add_node(n);
        assert_eq!(tree.nearest(Point2D::new(1.8, 1.5)), 1);
        assert_eq!(tree.nearest(Point2D::new(0.2, -0.5)), 0);
    }

    #[test]
    fn test_samples_stay_in_bounds() {
        let map = open_map();
        let mut planner = RRTPlanner::new(&map, PlannerConfig { goal_sample_rate: 0, ..test_config() });
        let goal = Point2D::new(1.0, 1.0);
        for _ in 0..2000 {
            let p = planner.sample_point(goal);
            assert!(map.bounds().contains(p.x, p.y));
        }

        let mut greedy = RRTPlanner::new(&map, PlannerConfig { goal_sample_rate: 100, ..test_config() });
        for _ in 0..10 {
            assert_eq!(greedy.sample_point(goal), goal);
        }
    }

    #[test]
    fn test_rrt_open_map() {
        let map = open_map();
        let config = test_config();
        let mut planner = RRTPlanner::new(&map, config.clone());
        let start = Waypoint::new(-1.0, -1.0);
        let goal = Waypoint::new(1.0, 1.0);

        let traj = match planner.plan_segment(&start, &goal) {
            SegmentResult::Reached(traj) => traj,
            other => panic!("expected a path, got {:?}", other),
        };

        assert!(traj.len() >= 2);
        assert_eq!(traj.first().unwrap().position(), start.position());
        assert_eq!(traj.last().unwrap().position(), goal.position());
        assert_clearance(&map, &traj, config.margin);
        for w in traj.points.windows(2) {
            let step = w[0].position().distance(&w[1].position());
            assert!(step <= config.max_step_length.max(config.capture_radius) + 1e-9);
        }
        // Headings are directions of travel
        for w in traj.points.windows(2) {
            let bearing = w[0].position().bearing_to(&w[1].position());
            assert!(normalize_angle(w[1].yaw - bearing).abs() < 1e-9);
        }
    }

    #[test]
    fn test_rrt_routes_through_gap() {
        let map = wall_with_gap_map();
        let config = PlannerConfig {
            margin: 2,
            max_iterations: 20000,
            max_step_length: 0.5,
            capture_radius: 0.5,
            seed: Some(7),
            ..test_config()
        };
        let mut planner = RRTPlanner::new(&map, config);
        let start = Waypoint::new(-2.0, -2.0);
        let goal = Waypoint::new(2.0, -2.0);

        let traj = planner
            .plan_segment(&start, &goal)
            .into_trajectory()
            .expect("gap is wide enough to pass");
        assert_clearance(&map, &traj, 2);
        // The only way across the wall is through the gap
        assert!(traj.iter().any(|p| p.y > 1.0));
    }

    #[test]
    fn test_rrt_unreachable_goal() {
        let mut grid = DMatrix::from_element(41, 41, FREE);
        // Box around cell (30, 30)
        for i in 26..=34 {
            grid[(26, i)] = WALL;
            grid[(34, i)] = WALL;
            grid[(i, 26)] = WALL;
            grid[(i, 34)] = WALL;
        }
        let map = OccupancyMap::centered(grid, 0.1, AreaBounds::new(-1.5, 1.5, -1.5, 1.5)).unwrap();
        let config = PlannerConfig {
            max_iterations: 500,
            ..test_config()
        };
        let mut planner = RRTPlanner::new(&map, config);

        let result = planner.plan_segment(&Waypoint::new(-1.0, -1.0), &Waypoint::new(1.0, 1.0));
        match result {
            SegmentResult::NotFound { iterations, tree_size } => {
                assert_eq!(iterations, 500);
                assert!(tree_size >= 1);
            }
            other => panic!("goal should be unreachable, got {:?}", other),
        }
    }

    #[test]
    fn test_rrt_blocked_start() {
        let mut grid = DMatrix::from_element(41, 41, FREE);
        grid[(10, 10)] = WALL;
        let map = OccupancyMap::centered(grid, 0.1, AreaBounds::new(-1.5, 1.5, -1.5, 1.5)).unwrap();
        let mut planner = RRTPlanner::new(&map, test_config());

        let result = planner.plan_segment(&Waypoint::new(-1.0, -1.0), &Waypoint::new(1.0, 1.0));
        assert_eq!(
            result,
            SegmentResult::NotFound {
                iterations: 0,
                tree_size: 1
            }
        );
    }

    #[test]
    fn test_rrt_respects_heading_limit() {
        let map = open_map();
        let limit = std::f64::consts::FRAC_PI_4;
        let config = PlannerConfig {
            max_iterations: 10000,
            max_heading_change: Some(limit),
            seed: Some(3),
            ..test_config()
        };
        let mut planner = RRTPlanner::new(&map, config);
        let start = Waypoint::with_heading(-1.0, -1.0, std::f64::consts::FRAC_PI_4);
        let goal = Waypoint::new(1.0, 1.0);

        let traj = planner
            .plan_segment(&start, &goal)
            .into_trajectory()
            .expect("open map");
        assert!((traj.points[0].yaw - std::f64::consts::FRAC_PI_4).abs() < 1e-12);
        for w in traj.points.windows(2) {
            assert!(normalize_angle(w[1].yaw - w[0].yaw).abs() <= limit + 1e-9);
        }
    }

    #[test]
    fn test_rrt_seeded_runs_are_reproducible() {
        let map = open_map();
        let start = Waypoint::new(-1.0, 0.5);
        let goal = Waypoint::new(1.0, -0.5);

        let mut first = RRTPlanner::new(&map, test_config());
        let mut second = RRTPlanner::new(&map, test_config());
        assert_eq!(
            first.plan_segment(&start, &goal),
            second.plan_segment(&start, &goal)
        );
        assert_eq!(first.last_tree().len(), second.last_tree().len());
    }
}
