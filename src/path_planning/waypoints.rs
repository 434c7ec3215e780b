//! Waypoint sequencing
//!
//! Builds the ordered list of waypoints from a candidate table and a visiting
//! order, then assigns the approach heading of every waypoint after the first.

use crate::common::{NavigationError, NavigationResult, Point2D, Waypoint};

/// Candidate table plus the order in which the candidates are visited
#[derive(Debug, Clone)]
pub struct WaypointSequencer {
    candidates: Vec<Point2D>,
    order: Vec<usize>,
    start_heading: Option<f64>,
}

impl WaypointSequencer {
    pub fn new(candidates: Vec<Point2D>, order: Vec<usize>) -> Self {
        WaypointSequencer {
            candidates,
            order,
            start_heading: None,
        }
    }

    /// Visit every candidate in table order
    pub fn in_order(candidates: Vec<Point2D>) -> Self {
        let order = (0..candidates.len()).collect();
        Self::new(candidates, order)
    }

    /// Heading the vehicle starts with; unset means the first segment may leave in any direction
    pub fn with_start_heading(mut self, heading: Option<f64>) -> Self {
        self.start_heading = heading;
        self
    }

    /// Ordered waypoints with headings assigned
    pub fn build(&self) -> NavigationResult<Vec<Waypoint>> {
        let mut waypoints = Vec::with_capacity(self.order.len());
        for &index in &self.order {
            let candidate = self.candidates.get(index).ok_or_else(|| {
                NavigationError::InvalidParameter(format!(
                    "waypoint order refers to candidate {} but only {} exist",
                    index,
                    self.candidates.len()
                ))
            })?;
            waypoints.push(Waypoint::from(*candidate));
        }

        if let Some(first) = waypoints.first_mut() {
            first.heading = self.start_heading;
        }
        assign_headings(&mut waypoints);
        Ok(waypoints)
    }
}

/// Fill in approach headings.
///
/// Interior waypoints face from their predecessor toward their successor
/// (central difference). The last waypoint faces along the direction it is
/// approached from. The first waypoint is left untouched.
pub fn assign_headings(waypoints: &mut [Waypoint]) {
    let n = waypoints.len();
    if n < 2 {
        return;
    }

    for i in 1..n - 1 {
        let prev = waypoints[i - 1].position();
        let next = waypoints[i + 1].position();
        waypoints[i].heading = Some(prev.bearing_to(&next));
    }

    let prev = waypoints[n - 2].position();
    let last = waypoints[n - 1].position();
    waypoints[n - 1].heading = Some(prev.bearing_to(&last));
}
