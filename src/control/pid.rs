//! PID steering control on heading error
//!
//! The error is the bearing from the vehicle to the target point minus the
//! vehicle yaw, wrapped to [-pi, pi].

use serde::Deserialize;

use crate::common::{normalize_angle, Controller, NavigationError, NavigationResult, Pose2D};

/// PID gains
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PidConfig {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            kp: 1.0,
            ki: 0.0,
            kd: 0.05,
        }
    }
}

impl PidConfig {
    pub fn validate(&self) -> NavigationResult<()> {
        if !(self.kp.is_finite() && self.ki.is_finite() && self.kd.is_finite()) {
            return Err(NavigationError::InvalidParameter(
                "PID gains must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

pub struct PidController {
    gains: PidConfig,
    dt: f64,
    integral: f64,
    prev_error: Option<f64>,
}

impl PidController {
    /// `dt` is the control period [s], i.e. `1 / control_rate`
    pub fn new(gains: PidConfig, dt: f64) -> Self {
        PidController {
            gains,
            dt,
            integral: 0.0,
            prev_error: None,
        }
    }

    pub fn from_rate(gains: PidConfig, control_rate: f64) -> Self {
        Self::new(gains, 1.0 / control_rate)
    }

    pub fn gains(&self) -> &PidConfig {
        &self.gains
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Wrapped heading error from `pose` toward `target`
    pub fn heading_error(pose: &Pose2D, target: &Pose2D) -> f64 {
        let bearing = pose.position().bearing_to(&target.position());
        normalize_angle(bearing - pose.yaw)
    }

    /// One PID step on a precomputed error
    pub fn update(&mut self, error: f64) -> f64 {
        self.integral += error * self.dt;
        // No derivative kick on the first sample after a reset
        let derivative = match self.prev_error {
            Some(prev) => normalize_angle(error - prev) / self.dt,
            None => 0.0,
        };
        self.prev_error = Some(error);

        self.gains.kp * error + self.gains.ki * self.integral + self.gains.kd * derivative
    }
}

impl Controller for PidController {
    type State = Pose2D;
    type Reference = Pose2D;
    type Output = f64;

    fn compute(&mut self, state: &Pose2D, reference: &Pose2D) -> f64 {
        let error = Self::heading_error(state, reference);
        self.update(error)
    }

    fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = None;
    }
}
