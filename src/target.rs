//! Waypoint targets: the caller-facing way to tell a spline "get to this
//! value (and velocity) by this time".
//!
//! Grounded on `include/motive/target.h` from the retrieved upstream source:
//! the original `MotiveTarget1f` holds at most `kMaxNodes = 3` waypoints
//! inline, no heap allocation. This crate keeps the same cap and uses
//! `smallvec` (already in the teacher's dependency stack) to get the same
//! no-heap-for-the-common-case property with an ordinary-looking collection
//! API.

use smallvec::SmallVec;

use crate::error::{MotiveError, Result};
use crate::range::Direction;
use crate::time::MotiveTime;

/// Maximum number of waypoints a single [`Target`] may hold.
pub const MAX_WAYPOINTS: usize = 3;

/// One point a spline should pass through: a value, the velocity (dy/dx) it
/// should have there, the time it should arrive, and how to resolve the
/// value under modular wraparound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    pub value: f32,
    pub velocity: f32,
    pub time: MotiveTime,
    pub direction: Direction,
}

impl Waypoint {
    #[must_use]
    pub const fn new(value: f32, velocity: f32, time: MotiveTime, direction: Direction) -> Self {
        Waypoint { value, velocity, time, direction }
    }

    /// A waypoint describing the spline's state *right now* (`time == 0`).
    #[must_use]
    pub const fn current(value: f32, velocity: f32) -> Self {
        Waypoint { value, velocity, time: 0, direction: Direction::Direct }
    }
}

/// A validated, time-ordered sequence of 1..=3 waypoints.
///
/// If the first waypoint has `time == 0` it overrides the spline's current
/// state; otherwise the current state is left alone and the sequence
/// describes future motion only.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    waypoints: SmallVec<[Waypoint; MAX_WAYPOINTS]>,
}

impl Target {
    /// Validates and constructs a target. Rejects (§7 `InvalidTarget`):
    /// more than [`MAX_WAYPOINTS`] waypoints, a non-monotone time sequence,
    /// or a waypoint after the first with `time <= 0`.
    pub fn new(waypoints: impl Into<SmallVec<[Waypoint; MAX_WAYPOINTS]>>) -> Result<Self> {
        let waypoints = waypoints.into();
        if waypoints.is_empty() {
            return Err(MotiveError::InvalidTarget("target must have at least one waypoint"));
        }
        if waypoints.len() > MAX_WAYPOINTS {
            return Err(MotiveError::InvalidTarget("target exceeds the maximum of 3 waypoints"));
        }
        for (i, w) in waypoints.iter().enumerate() {
            if i > 0 {
                if w.time <= waypoints[i - 1].time {
                    return Err(MotiveError::InvalidTarget("waypoint times must be strictly increasing"));
                }
                if w.time <= 0 {
                    return Err(MotiveError::InvalidTarget("a future waypoint must have time > 0"));
                }
            }
        }
        Ok(Target { waypoints })
    }

    /// A single-waypoint target describing the current state, taking effect
    /// immediately (`time == 0`).
    pub fn current(value: f32, velocity: f32) -> Result<Self> {
        Target::new([Waypoint::current(value, velocity)])
    }

    /// A single future waypoint to reach by `time`.
    pub fn future(value: f32, velocity: f32, time: MotiveTime, direction: Direction) -> Result<Self> {
        Target::new([Waypoint::new(value, velocity, time, direction)])
    }

    #[must_use]
    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        false // validated non-empty at construction
    }

    /// Whether the first waypoint overrides the current value (`time == 0`).
    #[must_use]
    pub fn overrides_current(&self) -> bool {
        self.waypoints[0].time == 0
    }

    #[must_use]
    pub fn end_time(&self) -> MotiveTime {
        self.waypoints[self.waypoints.len() - 1].time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_monotone_times() {
        let err = Target::new([Waypoint::current(0.0, 0.0), Waypoint::new(1.0, 0.0, 5, Direction::Direct), Waypoint::new(2.0, 0.0, 3, Direction::Direct)]);
        assert!(err.is_err());
    }

    #[test]
    fn rejects_nonpositive_future_time() {
        let err = Target::new([Waypoint::current(0.0, 0.0), Waypoint::new(1.0, 0.0, 0, Direction::Direct)]);
        assert!(err.is_err());
    }

    #[test]
    fn rejects_too_many_waypoints() {
        let err = Target::new([
            Waypoint::new(0.0, 0.0, 1, Direction::Direct),
            Waypoint::new(1.0, 0.0, 2, Direction::Direct),
            Waypoint::new(2.0, 0.0, 3, Direction::Direct),
            Waypoint::new(3.0, 0.0, 4, Direction::Direct),
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn accepts_simple_future_target() {
        let t = Target::future(-3.041, 0.0, 10, Direction::Closest).unwrap();
        assert_eq!(t.end_time(), 10);
        assert!(!t.overrides_current());
    }
}
