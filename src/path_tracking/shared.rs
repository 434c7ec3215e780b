//! State shared between the pose feed and the control loop

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::warn;

use crate::common::{DriveCommand, NavigationError, NavigationResult, Pose2D};

/// Latest pose, stop flag and last command.
///
/// One writer (the pose feed) and one reader (the control loop). The pose is
/// always read and written as a whole under the lock.
#[derive(Debug, Default)]
pub struct SharedTrackingState {
    pose: RwLock<Pose2D>,
    pose_updates: AtomicU64,
    stop: AtomicBool,
    last_command: RwLock<Option<DriveCommand>>,
}

impl SharedTrackingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pose(pose: Pose2D) -> Self {
        SharedTrackingState {
            pose: RwLock::new(pose),
            ..Self::default()
        }
    }

    pub fn publish_pose(&self, pose: Pose2D) {
        *self.pose.write() = pose;
        self.pose_updates.fetch_add(1, Ordering::Release);
    }

    /// Snapshot of the most recent pose
    pub fn pose(&self) -> Pose2D {
        *self.pose.read()
    }

    /// Number of poses published so far
    pub fn pose_updates(&self) -> u64 {
        self.pose_updates.load(Ordering::Acquire)
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    pub fn record_command(&self, command: DriveCommand) {
        *self.last_command.write() = Some(command);
    }

    pub fn last_command(&self) -> Option<DriveCommand> {
        *self.last_command.read()
    }

    /// Pick the vehicle out of a model-states message and publish its pose.
    ///
    /// `names` and `poses` are parallel lists. Returns the index the vehicle
    /// was found at.
    pub fn ingest_model_states(
        &self,
        names: &[String],
        poses: &[Pose2D],
        vehicle_name: &str,
    ) -> NavigationResult<usize> {
        if names.len() != poses.len() {
            return Err(NavigationError::InvalidParameter(format!(
                "model states carry {} names but {} poses",
                names.len(),
                poses.len()
            )));
        }

        match names.iter().position(|name| name == vehicle_name) {
            Some(index) => {
                let mut pose = poses[index];
                pose.normalize_yaw();
                self.publish_pose(pose);
                Ok(index)
            }
            None => {
                warn!("Model '{}' missing from model states", vehicle_name);
                Err(NavigationError::InvalidParameter(format!(
                    "model '{}' not found in model states",
                    vehicle_name
                )))
            }
        }
    }
}
