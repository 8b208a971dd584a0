//! Motive: a data-oriented animation engine core.
//!
//! An [`Engine`](engine::Engine) owns a set of type-indexed processors, each
//! driving many slots of its own per-slot data over a defragmenting index
//! allocator ([`index`]). Callers get a move-only, non-copyable
//! [`Handle`](handle::Handle) to one slot in one processor; dropping a handle
//! frees its slot. Four processors are provided, run in ascending priority
//! order every [`Engine::advance`](engine::Engine::advance):
//!
//! - [`processors::spline`] (priority 0) — a single float following a
//!   spline or chasing a waypoint [`target::Target`].
//! - [`processors::overshoot`] (priority 1) — a brief bounded-acceleration
//!   chase simulation, for responses too simple to need a spline.
//! - [`processors::composer`] (priority 2) — composes an ordered list of
//!   primitive ops into a 4x4 matrix, either axis-rotation/translate/scale
//!   ("matrix" style) or translate/quaternion/scale ("SQT" style).
//! - [`processors::rig`] (priority 3) — blends one or more concurrently
//!   playing animations across a bone hierarchy into per-bone global
//!   transforms, via one composer per bone per animation.
//!
//! Curve storage and math, FBX import, host application code, and
//! benchmarking are out of scope; [`curve::Curve`] is the contract a caller
//! supplies a curve implementation against (this crate bundles
//! [`curve::CubicCurve`] so the processors above have something concrete to
//! exercise and test against).

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::too_many_lines)]

pub mod curve;
pub mod engine;
pub mod error;
pub mod handle;
pub mod index;
pub mod processors;
pub mod range;
pub mod registry;
pub mod slot_table;
pub mod target;
pub mod time;

pub use curve::{Curve, CurveNode, CubicCurve};
pub use engine::Engine;
pub use error::{MotiveError, Result};
pub use handle::{Handle, Processor, TypeTag};
pub use index::{Dimension, Index};
pub use processors::composer::{ComposerProcessor, ComposerStyle};
pub use processors::matrix_op::{MatrixOpId, MatrixOpInit, MatrixOpKind, OpDriver};
pub use processors::overshoot::{OvershootInit, OvershootProcessor, Settled};
pub use processors::rig::{BoneIndex, RigAnimation, RigProcessor, INVALID_BONE};
pub use processors::spline::{SplineInit, SplineProcessor};
pub use range::{Direction, Range};
pub use registry::FactoryRegistry;
pub use target::{Target, Waypoint, MAX_WAYPOINTS};
pub use time::{MotiveTime, Playback, ENDLESS};
