//! Multi-segment path stitching
//!
//! Plans every consecutive waypoint pair left to right and concatenates the
//! results. A failed segment rolls back the segment before it, on the
//! assumption that the earlier segment's arrival heading made the later one
//! infeasible. A global retry budget keeps the process finite.

use tracing::{info, warn};

use crate::common::{
    NavigationError, NavigationResult, SegmentPlanner, SegmentResult, Trajectory, Waypoint,
};

/// Default bound on failed segment attempts across one stitching run
pub const DEFAULT_MAX_RETRIES: usize = 50;

/// Global trajectory assembled from per-segment plans
#[derive(Debug, Clone, PartialEq)]
pub struct StitchedPath {
    pub trajectory: Trajectory,
    /// Global index of the last point of every segment
    pub segment_ends: Vec<usize>,
    /// Number of failed segment attempts absorbed along the way
    pub retries: usize,
}

/// Orchestrates segment planning with cascading rollback
#[derive(Debug, Clone)]
pub struct PathStitcher {
    max_retries: usize,
}

impl Default for PathStitcher {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

impl PathStitcher {
    pub fn new(max_retries: usize) -> Self {
        PathStitcher { max_retries }
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// Plan through all waypoints.
    ///
    /// On success every waypoint after the first carries the heading with
    /// which its arriving segment actually ends.
    pub fn stitch<P: SegmentPlanner + ?Sized>(
        &self,
        planner: &mut P,
        waypoints: &mut [Waypoint],
    ) -> NavigationResult<StitchedPath> {
        if waypoints.len() < 2 {
            return Err(NavigationError::InvalidParameter(format!(
                "need at least 2 waypoints to plan, got {}",
                waypoints.len()
            )));
        }

        let segment_count = waypoints.len() - 1;
        let mut segments: Vec<Trajectory> = Vec::with_capacity(segment_count);
        let mut retries = 0;
        let mut i = 0;

        while i < segment_count {
            match planner.plan_segment(&waypoints[i], &waypoints[i + 1]) {
                SegmentResult::Reached(trajectory) => {
                    if let Some(heading) = trajectory.arrival_heading() {
                        waypoints[i + 1].heading = Some(heading);
                    }
                    info!(
                        "Segment {} -> {} planned ({} points)",
                        i,
                        i + 1,
                        trajectory.len()
                    );
                    segments.push(trajectory);
                    i += 1;
                }
                SegmentResult::NotFound { iterations, tree_size } => {
                    retries += 1;
                    if retries > self.max_retries {
                        return Err(NavigationError::StitchingExhausted {
                            retries: self.max_retries,
                            segment: i,
                        });
                    }

                    if i == 0 {
                        warn!(
                            "Segment 0 -> 1 failed after {} iterations ({} nodes), retrying (attempt {}/{})",
                            iterations, tree_size, retries, self.max_retries
                        );
                    } else {
                        segments.pop();
                        warn!(
                            "Segment {} -> {} failed after {} iterations ({} nodes), discarding segment {} -> {} (attempt {}/{})",
                            i,
                            i + 1,
                            iterations,
                            tree_size,
                            i - 1,
                            i,
                            retries,
                            self.max_retries
                        );
                        i -= 1;
                    }
                }
            }
        }

        Ok(concatenate(segments, retries))
    }
}

/// Join segments so that each junction point appears once: every segment
/// after the first drops its leading point, which equals the previous end.
fn concatenate(segments: Vec<Trajectory>, retries: usize) -> StitchedPath {
    let mut trajectory = Trajectory::new();
    let mut segment_ends = Vec::with_capacity(segments.len());

    for (k, segment) in segments.into_iter().enumerate() {
        let skip = if k == 0 { 0 } else { 1 };
        trajectory.points.extend(segment.points.into_iter().skip(skip));
        segment_ends.push(trajectory.len().saturating_sub(1));
    }

    StitchedPath {
        trajectory,
        segment_ends,
        retries,
    }
}
