//! Time units and playback descriptors.
//!
//! The engine treats time as a caller-defined, monotone integer. It never
//! reads the wall clock; `Engine::advance` is handed a delta each frame.

/// Caller-defined time unit. Monotone within one engine's lifetime.
///
/// Splines use the same type for their `x` parameter, so a curve's duration
/// and an engine's delta share units by construction.
pub type MotiveTime = i32;

/// Sentinel meaning "no end" / "plays forever". Used by curves with no
/// declared duration and by playback descriptors that never reach `end_time`.
pub const ENDLESS: MotiveTime = i32::MAX;

/// `{start_time, repeat, blend_in_duration, playback_rate}`, as described in
/// the data model: how a spline or rig should begin and evolve playback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Playback {
    /// Spline-x (or rig-time) at which playback logically begins.
    pub start_time: MotiveTime,
    /// Whether the curve/animation wraps back to its start after reaching its end.
    pub repeat: bool,
    /// Duration, in the same time units, over which a blend transitions in.
    pub blend_in_duration: MotiveTime,
    /// Multiplier applied to `delta_time` before advancing this playback's `x`.
    pub playback_rate: f32,
}

impl Playback {
    /// A playback descriptor that starts immediately, does not repeat, blends
    /// instantly, and runs at normal speed.
    #[must_use]
    pub const fn instant() -> Self {
        Playback {
            start_time: 0,
            repeat: false,
            blend_in_duration: 0,
            playback_rate: 1.0,
        }
    }

    /// A repeating playback descriptor starting immediately at normal speed.
    #[must_use]
    pub const fn looping() -> Self {
        Playback {
            start_time: 0,
            repeat: true,
            blend_in_duration: 0,
            playback_rate: 1.0,
        }
    }
}

impl Default for Playback {
    fn default() -> Self {
        Playback::instant()
    }
}
