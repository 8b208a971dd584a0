//! Matrix operation primitives: the per-op type tag, default-value and
//! category rules, and the caller-facing init record an op is driven from.
//!
//! Grounded on `include/motive/matrix_op.h` from the retrieved upstream
//! source: the op-id bounds, the epsilon used to collapse a settled spline
//! into a constant, and the rotate/translate/scale/quaternion category
//! predicates all come directly from there. The union-typed `MatrixOperationInit`
//! becomes the `OpDriver` tagged sum per §9's redesign note.

use std::rc::Rc;

use crate::curve::Curve;
use crate::target::Target;
use crate::time::Playback;

/// Identifies an operation across animations so it can be matched during a blend.
pub type MatrixOpId = u8;

/// Largest id an op may carry.
pub const MAX_MATRIX_OP_ID: MatrixOpId = 254;

/// Sentinel meaning "no operation".
pub const INVALID_MATRIX_OP_ID: MatrixOpId = 255;

/// Epsilon for deciding a spline-driven op has settled at a new constant
/// target and can collapse back to a plain constant (§9 open question: the
/// source hard-codes this value).
pub const BLEND_COLLAPSE_EPSILON: f32 = 1e-3;

/// One primitive transform an operation applies to the composed matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixOpKind {
    RotateX,
    RotateY,
    RotateZ,
    TranslateX,
    TranslateY,
    TranslateZ,
    ScaleX,
    ScaleY,
    ScaleZ,
    ScaleUniform,
    QuatW,
    QuatX,
    QuatY,
    QuatZ,
}

impl MatrixOpKind {
    #[must_use]
    pub fn is_rotate(self) -> bool {
        matches!(self, MatrixOpKind::RotateX | MatrixOpKind::RotateY | MatrixOpKind::RotateZ)
    }

    #[must_use]
    pub fn is_translate(self) -> bool {
        matches!(self, MatrixOpKind::TranslateX | MatrixOpKind::TranslateY | MatrixOpKind::TranslateZ)
    }

    #[must_use]
    pub fn is_scale(self) -> bool {
        matches!(
            self,
            MatrixOpKind::ScaleX | MatrixOpKind::ScaleY | MatrixOpKind::ScaleZ | MatrixOpKind::ScaleUniform
        )
    }

    #[must_use]
    pub fn is_quaternion(self) -> bool {
        matches!(self, MatrixOpKind::QuatW | MatrixOpKind::QuatX | MatrixOpKind::QuatY | MatrixOpKind::QuatZ)
    }

    /// The value that makes this op a no-op: 1 for scales and the
    /// quaternion real component, 0 for everything else.
    #[must_use]
    pub fn default_value(self) -> f32 {
        if self.is_scale() || matches!(self, MatrixOpKind::QuatW) {
            1.0
        } else {
            0.0
        }
    }
}

/// The source of an op's driven value, as supplied by the caller.
///
/// `Spline`/`Target`/`Curve` all cause the composer to create and own an
/// internal spline handle for this op; `Constant` never does.
#[derive(Clone)]
pub enum OpDriver {
    /// Never changes.
    Constant(f32),
    /// Driven by a fresh internal spline, seeded at the op's default value.
    Spline,
    /// Driven by a fresh internal spline, immediately given this target.
    Target(Target),
    /// Driven by a fresh internal spline bound to this externally owned curve.
    Curve(Rc<dyn Curve>, Playback),
}

/// Caller-supplied configuration for one operation within a composer's op list.
#[derive(Clone)]
pub struct MatrixOpInit {
    pub id: MatrixOpId,
    pub kind: MatrixOpKind,
    pub driver: OpDriver,
}

impl MatrixOpInit {
    #[must_use]
    pub fn constant(id: MatrixOpId, kind: MatrixOpKind, value: f32) -> Self {
        MatrixOpInit { id, kind, driver: OpDriver::Constant(value) }
    }

    #[must_use]
    pub fn spline(id: MatrixOpId, kind: MatrixOpKind) -> Self {
        MatrixOpInit { id, kind, driver: OpDriver::Spline }
    }

    #[must_use]
    pub fn target(id: MatrixOpId, kind: MatrixOpKind, target: Target) -> Self {
        MatrixOpInit { id, kind, driver: OpDriver::Target(target) }
    }

    /// The value this op starts at, before any spline it owns has produced a
    /// frame (mirrors `MatrixOperationInit::StartValue`).
    #[must_use]
    pub fn start_value(&self) -> f32 {
        match &self.driver {
            OpDriver::Constant(v) => *v,
            OpDriver::Spline => self.kind.default_value(),
            OpDriver::Target(t) => t.waypoints()[0].value,
            OpDriver::Curve(c, _) => {
                let mut y = [0.0f32; 1];
                let mut dy = [0.0f32; 1];
                c.evaluate_range(c.start_x(), 0.0, 1, &mut y, &mut dy);
                y[0]
            }
        }
    }
}
