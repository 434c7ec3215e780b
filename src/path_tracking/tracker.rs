//! Trajectory tracking state machine
//!
//! `Init -> Running -> Finish`. The transition logic lives in
//! [`TrackingFsm::step`], which maps the current state and pose to the next
//! state plus the command to emit. It knows nothing about timing, so the
//! real-time loop and the tests drive it the same way.

use std::fmt;

use serde::Deserialize;
use tracing::info;

use crate::common::{
    Controller, DriveCommand, NavigationError, NavigationResult, Pose2D, Trajectory,
};
use crate::control::PidController;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingState {
    Init,
    Running,
    Finish,
}

impl fmt::Display for TrackingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrackingState::Init => "INIT",
            TrackingState::Running => "RUNNING",
            TrackingState::Finish => "FINISH",
        };
        write!(f, "{}", name)
    }
}

/// Tracking loop parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Constant forward speed while running [m/s]
    pub speed: f64,
    /// Steering saturation [rad]
    pub max_turn: f64,
    /// Tick rate [Hz]
    pub control_rate: f64,
    /// A target point closer than this counts as reached [m]
    pub capture_radius: f64,
    /// Pause after placing the vehicle before driving [s]
    pub settle_time: f64,
    /// Warn once the pose has not been refreshed for this many ticks; 0 disables
    pub stale_pose_ticks: u64,
    /// Model name of the vehicle in the positioning service
    pub vehicle_name: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            max_turn: 0.6,
            control_rate: 60.0,
            capture_radius: 0.2,
            settle_time: 3.0,
            stale_pose_ticks: 30,
            vehicle_name: "racecar".to_string(),
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> NavigationResult<()> {
        if self.control_rate <= 0.0 {
            return Err(NavigationError::InvalidParameter(
                "control_rate must be positive".to_string(),
            ));
        }
        if self.max_turn <= 0.0 {
            return Err(NavigationError::InvalidParameter(
                "max_turn must be positive".to_string(),
            ));
        }
        if self.capture_radius <= 0.0 {
            return Err(NavigationError::InvalidParameter(
                "tracking capture_radius must be positive".to_string(),
            ));
        }
        if self.settle_time < 0.0 {
            return Err(NavigationError::InvalidParameter(
                "settle_time must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    pub fn period(&self) -> f64 {
        1.0 / self.control_rate
    }
}

/// Result of one transition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub next: TrackingState,
    pub command: Option<DriveCommand>,
    /// The lookahead index moved forward on this tick
    pub advanced: bool,
}

/// Look-ahead selection: the index only moves forward, one point per capture
pub fn look_ahead_index(
    trajectory: &Trajectory,
    pose: &Pose2D,
    current: usize,
    capture_radius: f64,
) -> usize {
    match trajectory.get(current) {
        Some(target) => {
            let dist_sq = pose.position().distance_squared(&target.position());
            if dist_sq <= capture_radius * capture_radius {
                current + 1
            } else {
                current
            }
        }
        None => current,
    }
}

pub struct TrackingFsm {
    config: TrackerConfig,
    controller: PidController,
    trajectory: Trajectory,
    state: TrackingState,
    lookahead: usize,
    advancements: usize,
}

impl TrackingFsm {
    pub fn new(trajectory: Trajectory, controller: PidController, config: TrackerConfig) -> Self {
        TrackingFsm {
            config,
            controller,
            trajectory,
            state: TrackingState::Init,
            lookahead: 0,
            advancements: 0,
        }
    }

    pub fn state(&self) -> TrackingState {
        self.state
    }

    pub fn lookahead(&self) -> usize {
        self.lookahead
    }

    pub fn advancements(&self) -> usize {
        self.advancements
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Current target point, if running
    pub fn target(&self) -> Option<&Pose2D> {
        match self.state {
            TrackingState::Running => self.trajectory.get(self.lookahead),
            _ => None,
        }
    }

    /// Abandon tracking; the next step emits the final stop command
    pub fn abort(&mut self) {
        self.state = TrackingState::Finish;
    }

    /// Advance the machine by one tick.
    ///
    /// `Init` must only be stepped once the vehicle has been placed and has
    /// settled. `Finish` emits the stop command every time it is stepped; the
    /// caller ends the loop after the first one.
    pub fn step(&mut self, pose: &Pose2D) -> Tick {
        let tick = match self.state {
            TrackingState::Init => self.enter_running(),
            TrackingState::Running => self.run(pose),
            TrackingState::Finish => Tick {
                next: TrackingState::Finish,
                command: Some(DriveCommand::stop()),
                advanced: false,
            },
        };
        if tick.next != self.state {
            info!("Tracking state {} -> {}", self.state, tick.next);
        }
        self.state = tick.next;
        tick
    }

    fn enter_running(&mut self) -> Tick {
        self.controller.reset();
        self.lookahead = 1;
        self.advancements = 0;
        let next = if self.trajectory.len() < 2 {
            TrackingState::Finish
        } else {
            TrackingState::Running
        };
        Tick {
            next,
            command: None,
            advanced: false,
        }
    }

    fn run(&mut self, pose: &Pose2D) -> Tick {
        let target = match self.trajectory.get(self.lookahead) {
            Some(target) => *target,
            None => {
                return Tick {
                    next: TrackingState::Finish,
                    command: None,
                    advanced: false,
                }
            }
        };

        let steering = self
            .controller
            .compute(pose, &target)
            .clamp(-self.config.max_turn, self.config.max_turn);
        let command = DriveCommand::new(self.config.speed, steering);

        let next_index =
            look_ahead_index(&self.trajectory, pose, self.lookahead, self.config.capture_radius);
        let advanced = next_index > self.lookahead;
        if advanced {
            self.lookahead = next_index;
            self.advancements += 1;
            info!(
                "Reached point {}/{} at ({:.3}, {:.3}, {:.3})",
                self.lookahead,
                self.trajectory.len(),
                pose.x,
                pose.y,
                pose.yaw
            );
        }

        let next = if self.lookahead >= self.trajectory.len() {
            TrackingState::Finish
        } else {
            TrackingState::Running
        };
        Tick {
            next,
            command: Some(command),
            advanced,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::PidConfig;

    fn square_path() -> Trajectory {
        Trajectory::from_points(vec![
            Pose2D::new(0.0, 0.0, 0.0),
            Pose2D::new(1.0, 0.0, 0.0),
            Pose2D::new(2.0, 0.0, 0.0),
            Pose2D::new(2.0, 1.0, 0.0),
            Pose2D::new(2.0, 2.0, 0.0),
        ])
    }

    fn fsm(trajectory: Trajectory) -> TrackingFsm {
        let config = TrackerConfig::default();
        let pid = PidController::from_rate(PidConfig::default(), config.control_rate);
        TrackingFsm::new(trajectory, pid, config)
    }

    #[test]
    fn test_init_enters_running_at_index_one() {
        let mut fsm = fsm(square_path());
        assert_eq!(fsm.state(), TrackingState::Init);
        let tick = fsm.step(&Pose2D::origin());
        assert_eq!(tick.next, TrackingState::Running);
        assert!(tick.command.is_none());
        assert_eq!(fsm.lookahead(), 1);
    }

    #[test]
    fn test_five_points_finish_after_four_advancements() {
        let path = square_path();
        let mut fsm = fsm(path.clone());
        fsm.step(&Pose2D::origin());

        let mut stops = 0;
        let mut ticks = 0;
        loop {
            // Vehicle sits exactly on whatever it is chasing
            let pose = path
                .get(fsm.lookahead())
                .copied()
                .unwrap_or_else(|| *path.last().unwrap());
            let tick = fsm.step(&pose);
            if let Some(cmd) = tick.command {
                if cmd.is_stop() {
                    stops += 1;
                }
            }
            ticks += 1;
            if tick.next == TrackingState::Finish && tick.command.map_or(false, |c| c.is_stop()) {
                break;
            }
            assert!(ticks < 100);
        }

        assert_eq!(fsm.advancements(), 4);
        assert_eq!(fsm.lookahead(), 5);
        assert_eq!(stops, 1);
    }

    #[test]
    fn test_lookahead_never_decreases() {
        let path = square_path();
        let mut fsm = fsm(path.clone());
        fsm.step(&Pose2D::origin());

        // Poses wander: near point 1, far away, back at point 0, near point 2
        let poses = [
            Pose2D::new(0.95, 0.05, 0.0),
            Pose2D::new(5.0, 5.0, 1.0),
            Pose2D::new(0.0, 0.0, 0.0),
            Pose2D::new(2.0, 0.1, 0.0),
            Pose2D::new(-3.0, 0.0, 0.0),
        ];
        let mut last = fsm.lookahead();
        for pose in &poses {
            fsm.step(pose);
            assert!(fsm.lookahead() >= last);
            assert!(fsm.lookahead() <= last + 1);
            last = fsm.lookahead();
        }
        assert_eq!(fsm.lookahead(), 3);
    }

    #[test]
    fn test_steering_is_clamped() {
        let mut fsm = fsm(square_path());
        fsm.step(&Pose2D::origin());
        // Target directly behind: raw PID output is about pi
        let tick = fsm.step(&Pose2D::new(3.0, 0.0, 0.0));
        let cmd = tick.command.unwrap();
        assert!(cmd.steering_angle.abs() <= 0.6 + 1e-12);
        assert!((cmd.steering_angle.abs() - 0.6).abs() < 1e-12);
        assert_eq!(cmd.speed, 1.0);
    }

    #[test]
    fn test_short_trajectory_finishes_immediately() {
        let mut fsm = fsm(Trajectory::from_points(vec![Pose2D::origin()]));
        let tick = fsm.step(&Pose2D::origin());
        assert_eq!(tick.next, TrackingState::Finish);
        let tick = fsm.step(&Pose2D::origin());
        assert_eq!(tick.command, Some(DriveCommand::stop()));
    }

    #[test]
    fn test_abort_emits_stop() {
        let mut fsm = fsm(square_path());
        fsm.step(&Pose2D::origin());
        fsm.abort();
        let tick = fsm.step(&Pose2D::new(5.0, 5.0, 0.0));
        assert_eq!(tick.command, Some(DriveCommand::stop()));
        assert_eq!(fsm.state(), TrackingState::Finish);
    }

    #[test]
    fn test_look_ahead_index_capture_radius_is_inclusive() {
        let path = square_path();
        let on_edge = Pose2D::new(1.0, 0.25, 0.0);
        assert_eq!(look_ahead_index(&path, &on_edge, 1, 0.25), 2);
        assert_eq!(look_ahead_index(&path, &on_edge, 1, 0.2), 1);
        assert_eq!(look_ahead_index(&path, &on_edge, 5, 0.2), 5);
    }

    #[test]
    fn test_config_validation() {
        assert!(TrackerConfig::default().validate().is_ok());
        let bad = TrackerConfig {
            control_rate: 0.0,
            ..TrackerConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
