//! Kinematic vehicle simulation
//!
//! Stands in for the external simulator: consumes drive commands, integrates
//! a bicycle model and publishes the resulting pose into the shared state.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use tracing::warn;

use crate::common::{
    normalize_angle, ActuationSink, DriveCommand, NavigationError, NavigationResult,
    PositioningService, Pose2D,
};
use crate::path_tracking::SharedTrackingState;

/// Bicycle model referenced at the vehicle centre
#[derive(Debug, Copy, Clone)]
pub struct KinematicBicycle {
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
    pub v: f64,
    pub wheelbase: f64,
}

impl KinematicBicycle {
    pub fn new(pose: Pose2D, wheelbase: f64) -> Self {
        KinematicBicycle {
            x: pose.x,
            y: pose.y,
            yaw: pose.yaw,
            v: 0.0,
            wheelbase,
        }
    }

    pub fn pose(&self) -> Pose2D {
        Pose2D::new(self.x, self.y, self.yaw)
    }

    pub fn place(&mut self, pose: Pose2D) {
        self.x = pose.x;
        self.y = pose.y;
        self.yaw = pose.yaw;
        self.v = 0.0;
    }

    /// Speed is commanded directly; steering bends the path through the wheelbase
    pub fn update(&mut self, command: DriveCommand, dt: f64) {
        self.v = command.speed;
        self.x += self.v * self.yaw.cos() * dt;
        self.y += self.v * self.yaw.sin() * dt;
        self.yaw += self.v / self.wheelbase * command.steering_angle.tan() * dt;
        self.yaw = normalize_angle(self.yaw);
    }
}

/// Gaussian noise on published poses
#[derive(Debug, Clone, Copy)]
pub struct PoseNoise {
    pub position_std: f64,
    pub yaw_std: f64,
}

/// Simulated vehicle plus marker registry.
///
/// Implements both the actuation sink and the positioning service; every
/// command advances the model by one control period.
pub struct SimulatedVehicle {
    model: KinematicBicycle,
    shared: Arc<SharedTrackingState>,
    vehicle_name: String,
    dt: f64,
    noise: Option<(Normal<f64>, Normal<f64>)>,
    rng: StdRng,
    markers: Vec<(String, Pose2D)>,
    history: Vec<Pose2D>,
}

impl SimulatedVehicle {
    pub fn new(
        shared: Arc<SharedTrackingState>,
        vehicle_name: &str,
        wheelbase: f64,
        dt: f64,
    ) -> Self {
        let start = shared.pose();
        SimulatedVehicle {
            model: KinematicBicycle::new(start, wheelbase),
            shared,
            vehicle_name: vehicle_name.to_string(),
            dt,
            noise: None,
            rng: StdRng::from_entropy(),
            markers: Vec::new(),
            history: Vec::new(),
        }
    }

    pub fn with_noise(mut self, noise: PoseNoise, seed: u64) -> NavigationResult<Self> {
        if noise.position_std < 0.0 || noise.yaw_std < 0.0 {
            return Err(NavigationError::InvalidParameter(format!(
                "noise standard deviations must be non-negative, got {} / {}",
                noise.position_std, noise.yaw_std
            )));
        }
        let position = Normal::new(0.0, noise.position_std)
            .map_err(|e| NavigationError::InvalidParameter(format!("position noise: {}", e)))?;
        let yaw = Normal::new(0.0, noise.yaw_std)
            .map_err(|e| NavigationError::InvalidParameter(format!("yaw noise: {}", e)))?;
        self.noise = Some((position, yaw));
        self.rng = StdRng::seed_from_u64(seed);
        Ok(self)
    }

    pub fn model(&self) -> &KinematicBicycle {
        &self.model
    }

    pub fn markers(&self) -> &[(String, Pose2D)] {
        &self.markers
    }

    /// True poses visited since the vehicle was last placed
    pub fn history(&self) -> &[Pose2D] {
        &self.history
    }

    /// Every model in the world, markers first, as parallel name/pose lists
    pub fn model_states(&self) -> (Vec<String>, Vec<Pose2D>) {
        self.markers
            .iter()
            .cloned()
            .chain(std::iter::once((self.vehicle_name.clone(), self.model.pose())))
            .unzip()
    }

    fn publish(&mut self) {
        let truth = self.model.pose();
        self.history.push(truth);
        let (names, mut poses) = self.model_states();
        if let (Some((position, yaw)), Some(observed)) = (&self.noise, poses.last_mut()) {
            *observed = Pose2D::new(
                truth.x + position.sample(&mut self.rng),
                truth.y + position.sample(&mut self.rng),
                normalize_angle(truth.yaw + yaw.sample(&mut self.rng)),
            );
        }
        if let Err(e) = self
            .shared
            .ingest_model_states(&names, &poses, &self.vehicle_name)
        {
            warn!("Pose not published: {}", e);
        }
    }
}

impl ActuationSink for SimulatedVehicle {
    fn send(&mut self, command: DriveCommand) {
        self.model.update(command, self.dt);
        self.publish();
    }
}

impl PositioningService for SimulatedVehicle {
    fn set_model_pose(&mut self, name: &str, pose: Pose2D) -> NavigationResult<()> {
        if name == self.vehicle_name {
            self.model.place(pose);
            self.history.clear();
            self.publish();
        } else {
            match self.markers.iter_mut().find(|(n, _)| n == name) {
                Some(marker) => marker.1 = pose,
                None => self.markers.push((name.to_string(), pose)),
            }
        }
        Ok(())
    }
}
