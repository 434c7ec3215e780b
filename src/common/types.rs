//! Common types used throughout rrt_navigation

use std::f64::consts::PI;

use itertools::Itertools;
use serde::Deserialize;

/// Wrap an angle to [-pi, pi]. Non-finite input is returned unchanged.
pub fn normalize_angle(angle: f64) -> f64 {
    if !angle.is_finite() || (-PI..=PI).contains(&angle) {
        return angle;
    }
    PI - (PI - angle).rem_euclid(2.0 * PI)
}

/// 2D point representation
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn origin() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    pub fn distance(&self, other: &Point2D) -> f64 {
        self.distance_squared(other).sqrt()
    }

    pub fn distance_squared(&self, other: &Point2D) -> f64 {
        (self.x - other.x).powi(2) + (self.y - other.y).powi(2)
    }

    /// Direction of travel from `self` to `other`
    pub fn bearing_to(&self, other: &Point2D) -> f64 {
        (other.y - self.y).atan2(other.x - self.x)
    }
}

impl From<(f64, f64)> for Point2D {
    fn from(tuple: (f64, f64)) -> Self {
        Self { x: tuple.0, y: tuple.1 }
    }
}

/// 2D pose (position + orientation)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose2D {
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
}

impl Pose2D {
    pub fn new(x: f64, y: f64, yaw: f64) -> Self {
        Self { x, y, yaw }
    }

    pub fn origin() -> Self {
        Self { x: 0.0, y: 0.0, yaw: 0.0 }
    }

    pub fn position(&self) -> Point2D {
        Point2D::new(self.x, self.y)
    }

    /// Normalize yaw to [-pi, pi]
    pub fn normalize_yaw(&mut self) {
        self.yaw = normalize_angle(self.yaw);
    }
}

/// A point the vehicle has to pass through.
///
/// `heading` stays `None` until the sequencer or the stitcher fills it in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    pub x: f64,
    pub y: f64,
    pub heading: Option<f64>,
}

impl Waypoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, heading: None }
    }

    pub fn with_heading(x: f64, y: f64, heading: f64) -> Self {
        Self { x, y, heading: Some(heading) }
    }

    pub fn position(&self) -> Point2D {
        Point2D::new(self.x, self.y)
    }

    /// Pose with an unset heading reported as 0
    pub fn pose(&self) -> Pose2D {
        Pose2D::new(self.x, self.y, self.heading.unwrap_or(0.0))
    }
}

impl From<Point2D> for Waypoint {
    fn from(p: Point2D) -> Self {
        Waypoint::new(p.x, p.y)
    }
}

/// Drivable path: an ordered sequence of poses
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trajectory {
    pub points: Vec<Pose2D>,
}

impl Trajectory {
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    pub fn from_points(points: Vec<Pose2D>) -> Self {
        Self { points }
    }

    pub fn push(&mut self, pose: Pose2D) {
        self.points.push(pose);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Pose2D> {
        self.points.get(index)
    }

    pub fn first(&self) -> Option<&Pose2D> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&Pose2D> {
        self.points.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Pose2D> {
        self.points.iter()
    }

    pub fn x_coords(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.x).collect()
    }

    pub fn y_coords(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.y).collect()
    }

    /// Direction between the last two points, i.e. how the path arrives at its end
    pub fn arrival_heading(&self) -> Option<f64> {
        let n = self.points.len();
        if n < 2 {
            return None;
        }
        let prev = self.points[n - 2].position();
        let last = self.points[n - 1].position();
        Some(prev.bearing_to(&last))
    }

    pub fn total_length(&self) -> f64 {
        self.points
            .iter()
            .tuple_windows()
            .map(|(a, b)| a.position().distance(&b.position()))
            .sum()
    }
}

/// Axis-aligned world bounds, inclusive on every side
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct AreaBounds {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

impl AreaBounds {
    pub fn new(xmin: f64, xmax: f64, ymin: f64, ymax: f64) -> Self {
        AreaBounds { xmin, xmax, ymin, ymax }
    }

    pub fn from_array(area: [f64; 4]) -> Self {
        AreaBounds {
            xmin: area[0],
            xmax: area[1],
            ymin: area[2],
            ymax: area[3],
        }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.xmin && x <= self.xmax && y >= self.ymin && y <= self.ymax
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }
}

/// Cell address in an occupancy grid (row indexes world x, col indexes world y)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridIndex {
    pub row: i64,
    pub col: i64,
}

impl GridIndex {
    pub fn new(row: i64, col: i64) -> Self {
        Self { row, col }
    }
}

/// Command for an Ackermann-steered vehicle
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DriveCommand {
    /// Forward speed [m/s]
    pub speed: f64,
    /// Steering angle [rad]
    pub steering_angle: f64,
}

impl DriveCommand {
    pub fn new(speed: f64, steering_angle: f64) -> Self {
        Self { speed, steering_angle }
    }

    pub fn stop() -> Self {
        Self { speed: 0.0, steering_angle: 0.0 }
    }

    pub fn is_stop(&self) -> bool {
        self.speed == 0.0 && self.steering_angle == 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point2d_distance() {
        let p1 = Point2D::new(0.0, 0.0);
        let p2 = Point2D::new(3.0, 4.0);
        assert!((p1.distance(&p2) - 5.0).abs() < 1e-10);
        assert!((p1.distance_squared(&p2) - 25.0).abs() < 1e-10);
    }

    #[test]
    fn test_normalize_angle() {
        assert!((normalize_angle(3.0 * PI) - PI).abs() < 1e-10);
        assert!((normalize_angle(-1.5 * PI) - 0.5 * PI).abs() < 1e-10);
        assert_eq!(normalize_angle(0.25), 0.25);
        assert_eq!(normalize_angle(-PI), -PI);
    }

    #[test]
    fn test_normalize_angle_extreme_input() {
        assert!(normalize_angle(f64::INFINITY).is_infinite());
        assert!(normalize_angle(f64::NEG_INFINITY).is_infinite());
        assert!(normalize_angle(f64::NAN).is_nan());

        let wrapped = normalize_angle(1e12);
        assert!(wrapped >= -PI && wrapped <= PI);

        let wrapped = normalize_angle(1000.0);
        assert!((wrapped.sin() - 1000f64.sin()).abs() < 1e-9);
        assert!((wrapped.cos() - 1000f64.cos()).abs() < 1e-9);
    }

    #[test]
    fn test_pose2d_normalize_yaw() {
        let mut pose = Pose2D::new(0.0, 0.0, 4.0);
        pose.normalize_yaw();
        assert!(pose.yaw >= -PI && pose.yaw <= PI);
    }

    #[test]
    fn test_trajectory_arrival_heading() {
        let mut traj = Trajectory::new();
        assert!(traj.arrival_heading().is_none());
        traj.push(Pose2D::new(0.0, 0.0, 0.0));
        traj.push(Pose2D::new(1.0, 0.0, 0.0));
        traj.push(Pose2D::new(1.0, 2.0, 0.0));
        let heading = traj.arrival_heading().unwrap();
        assert!((heading - PI / 2.0).abs() < 1e-10);
        assert!((traj.total_length() - 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_area_bounds_inclusive() {
        let bounds = AreaBounds::new(-4.5, 4.5, -13.5, 13.5);
        assert!(bounds.contains(4.5, -13.5));
        assert!(bounds.contains(-4.5, 13.5));
        assert!(!bounds.contains(4.5 + 1e-9, 0.0));
    }

    #[test]
    fn test_drive_command_stop() {
        assert!(DriveCommand::stop().is_stop());
        assert!(!DriveCommand::new(1.0, 0.0).is_stop());
    }
}
