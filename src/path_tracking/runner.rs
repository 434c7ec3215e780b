//! Fixed-rate tracking loop
//!
//! Performs the one-time setup of the `Init` state (path markers, vehicle
//! placement, settle delay), then steps the [`TrackingFsm`] on evenly spaced
//! ticks until it reaches `Finish` and the stop command has gone out.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::common::{ActuationSink, PositioningService, Pose2D, Waypoint};
use crate::path_tracking::shared::SharedTrackingState;
use crate::path_tracking::tracker::{TrackingFsm, TrackingState};

/// Summary of one tracking run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackingReport {
    pub ticks: u64,
    pub advancements: usize,
    /// Lookahead index when the loop ended
    pub final_index: usize,
    /// The trajectory was not completed (stop flag or tick limit)
    pub aborted: bool,
    pub final_pose: Pose2D,
}

pub struct TrackingLoop<S, P> {
    fsm: TrackingFsm,
    shared: Arc<SharedTrackingState>,
    sink: S,
    positioning: P,
    start: Waypoint,
    paced: bool,
    tick_limit: Option<u64>,
}

impl<S: ActuationSink, P: PositioningService> TrackingLoop<S, P> {
    /// `start` is the first waypoint; the vehicle is placed there during `Init`
    pub fn new(
        fsm: TrackingFsm,
        shared: Arc<SharedTrackingState>,
        sink: S,
        positioning: P,
        start: Waypoint,
    ) -> Self {
        TrackingLoop {
            fsm,
            shared,
            sink,
            positioning,
            start,
            paced: true,
            tick_limit: None,
        }
    }

    /// Run ticks back to back instead of at the control rate (simulated time)
    pub fn unpaced(mut self) -> Self {
        self.paced = false;
        self
    }

    /// Abort after this many ticks
    pub fn with_tick_limit(mut self, limit: u64) -> Self {
        self.tick_limit = Some(limit);
        self
    }

    pub fn fsm(&self) -> &TrackingFsm {
        &self.fsm
    }

    pub fn into_parts(self) -> (TrackingFsm, S, P) {
        (self.fsm, self.sink, self.positioning)
    }

    /// Place markers at every trajectory point and the vehicle at the start
    fn initialize(&mut self) {
        let markers: Vec<Pose2D> = self.fsm.trajectory().iter().copied().collect();
        for (i, pose) in markers.iter().enumerate() {
            if let Err(e) = self.positioning.set_model_pose(&i.to_string(), *pose) {
                warn!("Failed to place marker {}: {}", i, e);
            }
        }
        info!("Placed {} path markers", markers.len());

        let vehicle = self.fsm.config().vehicle_name.clone();
        let start = self.start.pose();
        if let Err(e) = self.positioning.set_model_pose(&vehicle, start) {
            warn!("Failed to place '{}' at the start: {}", vehicle, e);
        }
        info!(
            "Placed '{}' at ({:.3}, {:.3}, {:.3})",
            vehicle, start.x, start.y, start.yaw
        );

        let settle = self.fsm.config().settle_time;
        if self.paced && settle > 0.0 {
            thread::sleep(Duration::from_secs_f64(settle));
        }
    }

    pub fn run(&mut self) -> TrackingReport {
        self.initialize();

        let period = Duration::from_secs_f64(self.fsm.config().period());
        let stale_limit = self.fsm.config().stale_pose_ticks;
        let mut next_tick = Instant::now();
        let mut ticks: u64 = 0;
        let mut aborted = false;
        let mut last_updates = self.shared.pose_updates();
        let mut stale_ticks: u64 = 0;

        loop {
            if self.fsm.state() != TrackingState::Finish {
                let limit_hit = self.tick_limit.map_or(false, |limit| ticks >= limit);
                if self.shared.stop_requested() || limit_hit {
                    info!("Tracking stopped after {} ticks", ticks);
                    self.fsm.abort();
                    aborted = true;
                }
            }

            let updates = self.shared.pose_updates();
            if updates == last_updates {
                stale_ticks += 1;
                if stale_limit > 0 && stale_ticks == stale_limit {
                    warn!(
                        "No pose update for {} ticks, steering from the last known pose",
                        stale_ticks
                    );
                }
            } else {
                last_updates = updates;
                stale_ticks = 0;
            }

            let pose = self.shared.pose();
            let tick = self.fsm.step(&pose);
            ticks += 1;

            if let Some(command) = tick.command {
                debug!(
                    "Command speed {:.2} steering {:.3}",
                    command.speed, command.steering_angle
                );
                self.sink.send(command);
                self.shared.record_command(command);
                if tick.next == TrackingState::Finish && command.is_stop() {
                    break;
                }
            }

            if self.paced {
                next_tick += period;
                let now = Instant::now();
                if next_tick > now {
                    thread::sleep(next_tick - now);
                } else {
                    next_tick = now;
                }
            }
        }

        let report = TrackingReport {
            ticks,
            advancements: self.fsm.advancements(),
            final_index: self.fsm.lookahead(),
            aborted,
            final_pose: self.shared.pose(),
        };
        info!(
            "Tracking finished: {} ticks, {} points reached",
            report.ticks, report.advancements
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{DriveCommand, NavigationError, NavigationResult, Trajectory};
    use crate::control::{PidConfig, PidController};
    use crate::path_tracking::tracker::TrackerConfig;

    /// Sink that teleports the vehicle onto the point it is chasing
    struct Teleport {
        shared: Arc<SharedTrackingState>,
        path: Trajectory,
        next: usize,
        commands: Vec<DriveCommand>,
    }

    impl ActuationSink for Teleport {
        fn send(&mut self, command: DriveCommand) {
            self.commands.push(command);
            if let Some(p) = self.path.get(self.next) {
                self.shared.publish_pose(*p);
                self.next += 1;
            }
        }
    }

    #[derive(Default)]
    struct RecordingPositioner {
        placed: Vec<(String, Pose2D)>,
        fail_markers: bool,
    }

    impl PositioningService for RecordingPositioner {
        fn set_model_pose(&mut self, name: &str, pose: Pose2D) -> NavigationResult<()> {
            self.placed.push((name.to_string(), pose));
            if self.fail_markers && name != "racecar" {
                return Err(NavigationError::InvalidParameter("no such model".to_string()));
            }
            Ok(())
        }
    }

    fn path() -> Trajectory {
        Trajectory::from_points(vec![
            Pose2D::new(0.0, 0.0, 0.0),
            Pose2D::new(1.0, 0.0, 0.0),
            Pose2D::new(2.0, 0.0, 0.0),
            Pose2D::new(3.0, 0.0, 0.0),
        ])
    }

    fn tracking_loop(
        positioner: RecordingPositioner,
    ) -> (TrackingLoop<Teleport, RecordingPositioner>, Arc<SharedTrackingState>) {
        let config = TrackerConfig {
            settle_time: 0.0,
            ..TrackerConfig::default()
        };
        let pid = PidController::from_rate(PidConfig::default(), config.control_rate);
        let fsm = TrackingFsm::new(path(), pid, config);
        let shared = Arc::new(SharedTrackingState::new());
        let sink = Teleport {
            shared: Arc::clone(&shared),
            path: path(),
            next: 1,
            commands: Vec::new(),
        };
        let lp = TrackingLoop::new(fsm, Arc::clone(&shared), sink, positioner, Waypoint::new(0.0, 0.0))
            .unpaced();
        (lp, shared)
    }

    #[test]
    fn test_run_to_completion() {
        let (mut lp, shared) = tracking_loop(RecordingPositioner::default());
        let report = lp.run();

        assert!(!report.aborted);
        assert_eq!(report.advancements, 3);
        assert_eq!(report.final_index, 4);
        assert_eq!(shared.last_command(), Some(DriveCommand::stop()));

        let (_, sink, positioner) = lp.into_parts();
        let stops = sink.commands.iter().filter(|c| c.is_stop()).count();
        assert_eq!(stops, 1);
        assert!(sink.commands.last().unwrap().is_stop());

        // One marker per point, named by index, then the vehicle
        assert_eq!(positioner.placed.len(), 5);
        assert_eq!(positioner.placed[0].0, "0");
        assert_eq!(positioner.placed[3].0, "3");
        assert_eq!(positioner.placed[4].0, "racecar");
    }

    #[test]
    fn test_marker_failures_are_not_fatal() {
        let positioner = RecordingPositioner {
            fail_markers: true,
            ..RecordingPositioner::default()
        };
        let (mut lp, _) = tracking_loop(positioner);
        let report = lp.run();
        assert!(!report.aborted);
        assert_eq!(report.advancements, 3);
    }

    #[test]
    fn test_stop_flag_still_sends_stop() {
        let (mut lp, shared) = tracking_loop(RecordingPositioner::default());
        shared.request_stop();
        let report = lp.run();

        assert!(report.aborted);
        assert_eq!(report.advancements, 0);
        let (_, sink, _) = lp.into_parts();
        assert_eq!(sink.commands, vec![DriveCommand::stop()]);
    }

    #[test]
    fn test_tick_limit_aborts() {
        let (lp, _) = tracking_loop(RecordingPositioner::default());
        let mut lp = lp.with_tick_limit(2);
        let report = lp.run();
        assert!(report.aborted);
        let (_, sink, _) = lp.into_parts();
        assert_eq!(sink.commands.iter().filter(|c| c.is_stop()).count(), 1);
    }
}
