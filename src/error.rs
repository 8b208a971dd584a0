//! Error Types
//!
//! This module defines the error types used throughout the engine.
//!
//! # Overview
//!
//! The main error type [`MotiveError`] covers all failure modes documented
//! by the engine's error handling design: detached-handle misuse, rig/animation
//! hierarchy mismatches, invalid spline targets, unregistered processor types,
//! and out-of-range bone/child indices.
//!
//! # Usage
//!
//! All fallible public APIs return [`Result<T>`], an alias for
//! `std::result::Result<T, MotiveError>`.
//!
//! ```rust,ignore
//! use motive::error::{MotiveError, Result};
//!
//! fn bind() -> Result<()> {
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// The main error type for the Motive engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MotiveError {
    // ========================================================================
    // Handle Errors
    // ========================================================================
    /// Accessed a handle that is default-constructed, moved-from, or whose
    /// processor has been reset.
    #[error("handle is detached (not bound to any processor)")]
    DetachedHandle,

    // ========================================================================
    // Rig Errors
    // ========================================================================
    /// A rig and an animation were bound together but their `bone_parents`
    /// arrays differ element-wise.
    #[error("rig hierarchy mismatch: rig has {rig_bones} bones, animation expects {anim_bones}")]
    HierarchyMismatch {
        /// Number of bones in the rig.
        rig_bones: usize,
        /// Number of bones the animation was authored against.
        anim_bones: usize,
    },

    /// A bone or child index passed by the caller is out of range.
    #[error("index {index} out of range (len {len})")]
    IndexOutOfRange {
        /// The offending index.
        index: i32,
        /// The valid length it was checked against.
        len: usize,
    },

    // ========================================================================
    // Spline / Target Errors
    // ========================================================================
    /// A waypoint target was rejected: a future waypoint had `time <= 0`, the
    /// waypoint times were not strictly increasing, or the target exceeded
    /// the maximum waypoint count.
    #[error("invalid target: {0}")]
    InvalidTarget(&'static str),

    // ========================================================================
    // Registry Errors
    // ========================================================================
    /// `Engine::processor_for` was called for a type tag with no registered
    /// factory.
    #[error("no factory registered for processor type {0:?}")]
    UnknownProcessor(crate::handle::TypeTag),
}

/// Alias for `Result<T, MotiveError>`.
pub type Result<T> = std::result::Result<T, MotiveError>;
