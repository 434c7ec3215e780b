//! rrt_navigation - waypoint navigation with RRT planning and PID tracking
//!
//! Plans a collision-free path through an ordered list of waypoints on an
//! occupancy grid, one RRT search per consecutive pair, stitching the
//! segments together with rollback when a segment cannot be found. The
//! resulting trajectory is followed by a PID steering loop driven by a small
//! state machine.

// Core modules
pub mod common;
pub mod config;
pub mod utils;

// Algorithm modules
pub mod mapping;
pub mod path_planning;
pub mod control;
pub mod path_tracking;
pub mod simulation;

// Re-export common types for convenience
pub use common::{DriveCommand, Point2D, Pose2D, Trajectory, Waypoint};
pub use common::{ActuationSink, Controller, PositioningService, SegmentPlanner, SegmentResult};
pub use common::{NavigationError, NavigationResult};
pub use config::NavigationConfig;
