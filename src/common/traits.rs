//! Common traits defining the seams between planning, control and the outside world

use std::sync::Arc;

use parking_lot::Mutex;

use crate::common::error::NavigationResult;
use crate::common::types::*;

/// Outcome of planning a single waypoint-to-waypoint segment.
///
/// Failing to reach the goal is an expected result, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentResult {
    /// Root-to-goal trajectory, both endpoints included
    Reached(Trajectory),
    /// The iteration budget ran out before the goal was captured
    NotFound { iterations: usize, tree_size: usize },
}

impl SegmentResult {
    pub fn is_reached(&self) -> bool {
        matches!(self, SegmentResult::Reached(_))
    }

    pub fn into_trajectory(self) -> Option<Trajectory> {
        match self {
            SegmentResult::Reached(traj) => Some(traj),
            SegmentResult::NotFound { .. } => None,
        }
    }
}

/// Trait for planners that connect two consecutive waypoints
pub trait SegmentPlanner {
    /// Plan a path from `start` to `goal`
    fn plan_segment(&mut self, start: &Waypoint, goal: &Waypoint) -> SegmentResult;
}

/// Trait for controllers (PID, ...)
pub trait Controller {
    /// State type
    type State;
    /// Reference/target type
    type Reference;
    /// Output control type
    type Output;

    /// Compute control output
    fn compute(&mut self, state: &Self::State, reference: &Self::Reference) -> Self::Output;

    /// Reset controller state
    fn reset(&mut self);
}

/// Receives drive commands at tick rate; no acknowledgment
pub trait ActuationSink {
    fn send(&mut self, command: DriveCommand);
}

/// Places models (the vehicle, path markers) at world poses.
///
/// Only used during initialization; callers treat failures as best-effort.
pub trait PositioningService {
    fn set_model_pose(&mut self, name: &str, pose: Pose2D) -> NavigationResult<()>;
}

impl<T: ActuationSink + ?Sized> ActuationSink for &mut T {
    fn send(&mut self, command: DriveCommand) {
        (**self).send(command)
    }
}

impl<T: PositioningService + ?Sized> PositioningService for &mut T {
    fn set_model_pose(&mut self, name: &str, pose: Pose2D) -> NavigationResult<()> {
        (**self).set_model_pose(name, pose)
    }
}

/// One device behind a lock can serve as both the sink and the positioning service
impl<T: ActuationSink + ?Sized> ActuationSink for Arc<Mutex<T>> {
    fn send(&mut self, command: DriveCommand) {
        self.lock().send(command)
    }
}

impl<T: PositioningService + ?Sized> PositioningService for Arc<Mutex<T>> {
    fn set_model_pose(&mut self, name: &str, pose: Pose2D) -> NavigationResult<()> {
        self.lock().set_model_pose(name, pose)
    }
}
