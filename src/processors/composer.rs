//! The matrix/SQT composer processor (priority 2): drives a single 4x4
//! affine transform by applying an ordered list of primitive operations.
//!
//! Grounded on §4.5 for the evaluation algorithm and blend merge, and on
//! `src/motive/processor/matrix_data.h` (matrix-style `CalculateResultMatrix`/
//! `BlendToOps`, no insertion) and `src/motive/processor/sqt_data.h`
//! (SQT-style `UpdateResultMatrix`/`BlendToOps` with insertion and quaternion
//! hemisphere alignment) from the retrieved upstream source. Unlike the
//! source, which splits these into two processor classes, this crate keeps
//! one `ComposerProcessor` type whose slots each carry their own
//! [`ComposerStyle`] — the evaluation and blend algorithms already branch on
//! style per §4.5 ("same interface, different evaluator"), so a second
//! type-erased processor would only duplicate the merge logic.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use glam::{Mat4, Quat, Vec3, Vec4};

use crate::engine::Engine;
use crate::error::{MotiveError, Result};
use crate::handle::{Handle, Processor, SlotOwner, TypeTag};
use crate::index::{Dimension, Index};
use crate::processors::matrix_op::{
    MatrixOpInit, MatrixOpKind, OpDriver, BLEND_COLLAPSE_EPSILON, MAX_MATRIX_OP_ID,
};
use crate::processors::spline::{SplineInit, SplineProcessor};
use crate::range::{Direction, Range};
use crate::slot_table::SlotTable;
use crate::target::Target;
use crate::time::{MotiveTime, Playback};

/// Whether a composer's ops are axis rotations (never mixed with quaternion
/// components) or SQT components (translate/quat/scale, never axis rotations).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComposerStyle {
    #[default]
    Matrix,
    Sqt,
}

enum OpState {
    Constant(f32),
    Spline(Handle<SplineProcessor>),
}

struct ComposerOp {
    id: crate::processors::matrix_op::MatrixOpId,
    kind: MatrixOpKind,
    driver: OpState,
}

impl ComposerOp {
    fn value(&self) -> f32 {
        match &self.driver {
            OpState::Constant(v) => *v,
            OpState::Spline(h) => {
                if h.valid() {
                    h.value()
                } else {
                    0.0
                }
            }
        }
    }

    fn velocity(&self) -> f32 {
        match &self.driver {
            OpState::Constant(_) => 0.0,
            OpState::Spline(h) => {
                if h.valid() {
                    h.velocity()
                } else {
                    0.0
                }
            }
        }
    }

    fn time_remaining(&self) -> f32 {
        match &self.driver {
            OpState::Constant(_) => 0.0,
            OpState::Spline(h) => {
                if h.valid() {
                    h.target_time().max(0.0)
                } else {
                    0.0
                }
            }
        }
    }
}

#[derive(Default)]
struct ComposerSlot {
    style: ComposerStyle,
    ops: Vec<ComposerOp>,
    result_matrix: Mat4,
}

/// Rotates the column pair `(a, b)` by `theta` radians, the primitive shared
/// by every axis-rotation op.
fn rotate_columns(a: Vec4, b: Vec4, theta: f32) -> (Vec4, Vec4) {
    let (s, c) = theta.sin_cos();
    (c * a + s * b, c * b - s * a)
}

fn evaluate_matrix(ops: &[ComposerOp]) -> Mat4 {
    let mut c0 = Vec4::X;
    let mut c1 = Vec4::Y;
    let mut c2 = Vec4::Z;
    let mut c3 = Vec4::W;

    for op in ops {
        let v = op.value();
        match op.kind {
            MatrixOpKind::RotateX => {
                let (nc1, nc2) = rotate_columns(c1, c2, v);
                c1 = nc1;
                c2 = nc2;
            }
            MatrixOpKind::RotateY => {
                let (nc2, nc0) = rotate_columns(c2, c0, v);
                c2 = nc2;
                c0 = nc0;
            }
            MatrixOpKind::RotateZ => {
                let (nc0, nc1) = rotate_columns(c0, c1, v);
                c0 = nc0;
                c1 = nc1;
            }
            MatrixOpKind::TranslateX => c3 += v * c0,
            MatrixOpKind::TranslateY => c3 += v * c1,
            MatrixOpKind::TranslateZ => c3 += v * c2,
            MatrixOpKind::ScaleX => c0 *= v,
            MatrixOpKind::ScaleY => c1 *= v,
            MatrixOpKind::ScaleZ => c2 *= v,
            MatrixOpKind::ScaleUniform => {
                c0 *= v;
                c1 *= v;
                c2 *= v;
            }
            MatrixOpKind::QuatW | MatrixOpKind::QuatX | MatrixOpKind::QuatY | MatrixOpKind::QuatZ => {
                unreachable!("quaternion op in a matrix-style composer")
            }
        }
    }

    Mat4::from_cols(c0, c1, c2, c3)
}

fn evaluate_sqt(ops: &[ComposerOp]) -> (Mat4, Vec3, Quat, Vec3) {
    let mut translation = Vec3::ZERO;
    let mut scale = Vec3::ONE;
    let mut quat_xyzw = [0.0_f32, 0.0, 0.0, 1.0];

    for op in ops {
        let v = op.value();
        match op.kind {
            MatrixOpKind::TranslateX => translation.x = v,
            MatrixOpKind::TranslateY => translation.y = v,
            MatrixOpKind::TranslateZ => translation.z = v,
            MatrixOpKind::ScaleX => scale.x = v,
            MatrixOpKind::ScaleY => scale.y = v,
            MatrixOpKind::ScaleZ => scale.z = v,
            MatrixOpKind::ScaleUniform => scale = Vec3::splat(v),
            MatrixOpKind::QuatW => quat_xyzw[3] = v,
            MatrixOpKind::QuatX => quat_xyzw[0] = v,
            MatrixOpKind::QuatY => quat_xyzw[1] = v,
            MatrixOpKind::QuatZ => quat_xyzw[2] = v,
            MatrixOpKind::RotateX | MatrixOpKind::RotateY | MatrixOpKind::RotateZ => {
                unreachable!("axis-rotation op in an SQT-style composer")
            }
        }
    }

    let rotation = Quat::from_xyzw(quat_xyzw[0], quat_xyzw[1], quat_xyzw[2], quat_xyzw[3]).normalize();
    let matrix = Mat4::from_scale_rotation_translation(scale, rotation, translation);
    (matrix, translation, rotation, scale)
}

/// Drives any number of independent 4x4 transforms from ordered op lists.
#[derive(Default)]
pub struct ComposerProcessor {
    table: SlotTable<ComposerSlot>,
}

impl ComposerProcessor {
    fn spline_init_for(kind: MatrixOpKind) -> SplineInit {
        if kind.is_rotate() {
            SplineInit { y_range: Range::new(-std::f32::consts::PI, std::f32::consts::PI), modular: true }
        } else {
            SplineInit { y_range: Range::new(-1.0e6, 1.0e6), modular: false }
        }
    }

    fn target_for_blend(value: f32, velocity: f32, blend_in_duration: MotiveTime) -> Result<Target> {
        if blend_in_duration <= 0 {
            Target::current(value, velocity)
        } else {
            Target::future(value, velocity, blend_in_duration, Direction::Closest)
        }
    }

    /// Replaces a constant-or-uninitialized op with a fresh spline seeded at
    /// its current value, if it isn't spline-driven already.
    fn ensure_spline(engine: &mut Engine, op: &mut ComposerOp) -> Result<()> {
        if matches!(op.driver, OpState::Spline(_)) {
            return Ok(());
        }
        let current = op.value();
        let handle = Handle::new_spline(engine, Self::spline_init_for(op.kind))?;
        handle.set_target(Target::current(current, 0.0)?)?;
        op.driver = OpState::Spline(handle);
        Ok(())
    }

    fn blend_op_to(engine: &mut Engine, op: &mut ComposerOp, new_init: &MatrixOpInit, playback: Playback) -> Result<()> {
        match &new_init.driver {
            OpDriver::Constant(target_value) => {
                let target_value = *target_value;
                if playback.blend_in_duration > 0 {
                    Self::ensure_spline(engine, op)?;
                }
                match &op.driver {
                    OpState::Constant(_) => op.driver = OpState::Constant(target_value),
                    OpState::Spline(h) => {
                        let value = h.value();
                        let velocity = h.velocity();
                        if (value - target_value).abs() <= BLEND_COLLAPSE_EPSILON
                            && velocity.abs() <= BLEND_COLLAPSE_EPSILON
                        {
                            op.driver = OpState::Constant(target_value);
                        } else {
                            h.set_target(Self::target_for_blend(target_value, 0.0, playback.blend_in_duration)?)?;
                        }
                    }
                }
            }
            OpDriver::Spline => {
                Self::ensure_spline(engine, op)?;
            }
            OpDriver::Target(target) => {
                Self::ensure_spline(engine, op)?;
                if let OpState::Spline(h) = &op.driver {
                    h.set_target(target.clone())?;
                }
            }
            OpDriver::Curve(curve, pb) => {
                Self::ensure_spline(engine, op)?;
                if let OpState::Spline(h) = &op.driver {
                    h.set_spline(curve.clone(), *pb)?;
                }
            }
        }
        Ok(())
    }

    fn blend_op_to_default(engine: &mut Engine, op: &mut ComposerOp, playback: Playback) -> Result<()> {
        let default_value = op.kind.default_value();
        if playback.blend_in_duration > 0 {
            Self::ensure_spline(engine, op)?;
        }
        match &op.driver {
            OpState::Constant(_) => op.driver = OpState::Constant(default_value),
            OpState::Spline(h) => {
                h.set_target(Self::target_for_blend(default_value, 0.0, playback.blend_in_duration)?)?;
            }
        }
        Ok(())
    }

    fn new_op_from_init_record(engine: &mut Engine, init: &MatrixOpInit) -> Result<ComposerOp> {
        match &init.driver {
            OpDriver::Constant(v) => {
                Ok(ComposerOp { id: init.id, kind: init.kind, driver: OpState::Constant(*v) })
            }
            OpDriver::Spline => {
                let handle = Handle::new_spline(engine, Self::spline_init_for(init.kind))?;
                handle.set_target(Target::current(init.kind.default_value(), 0.0)?)?;
                Ok(ComposerOp { id: init.id, kind: init.kind, driver: OpState::Spline(handle) })
            }
            OpDriver::Target(target) => {
                let handle = Handle::new_spline(engine, Self::spline_init_for(init.kind))?;
                handle.set_target(target.clone())?;
                Ok(ComposerOp { id: init.id, kind: init.kind, driver: OpState::Spline(handle) })
            }
            OpDriver::Curve(curve, pb) => {
                let handle = Handle::new_spline(engine, Self::spline_init_for(init.kind))?;
                handle.set_spline(curve.clone(), *pb)?;
                Ok(ComposerOp { id: init.id, kind: init.kind, driver: OpState::Spline(handle) })
            }
        }
    }

    /// Creates a new op, starting from its default value and immediately
    /// blending to `init` (the "insert" case of an SQT blend, §4.5).
    fn new_op_blending_in(engine: &mut Engine, init: &MatrixOpInit, playback: Playback) -> Result<ComposerOp> {
        let mut op = ComposerOp { id: init.id, kind: init.kind, driver: OpState::Constant(init.kind.default_value()) };
        Self::ensure_spline(engine, &mut op)?;
        Self::blend_op_to(engine, &mut op, init, playback)?;
        Ok(op)
    }

    /// Before an SQT blend: if the new animation's first quaternion sample is
    /// on the opposite hemisphere from the current one, negate every
    /// currently-driven quaternion component so the blend takes the short
    /// path (§4.5, ported from `SqtData::AlignQuaternionOps`).
    fn align_quaternion_ops(ops: &mut [ComposerOp], new_ops: &[MatrixOpInit]) -> Result<()> {
        let mut next_xyzw = [0.0_f32, 0.0, 0.0, 1.0];
        for new_op in new_ops {
            if new_op.kind.is_quaternion() {
                let v = new_op.start_value();
                match new_op.kind {
                    MatrixOpKind::QuatW => next_xyzw[3] = v,
                    MatrixOpKind::QuatX => next_xyzw[0] = v,
                    MatrixOpKind::QuatY => next_xyzw[1] = v,
                    MatrixOpKind::QuatZ => next_xyzw[2] = v,
                    _ => unreachable!(),
                }
            }
        }
        let next = Quat::from_xyzw(next_xyzw[0], next_xyzw[1], next_xyzw[2], next_xyzw[3]).normalize();

        let mut current_xyzw = [0.0_f32, 0.0, 0.0, 1.0];
        for op in ops.iter() {
            match op.kind {
                MatrixOpKind::QuatW => current_xyzw[3] = op.value(),
                MatrixOpKind::QuatX => current_xyzw[0] = op.value(),
                MatrixOpKind::QuatY => current_xyzw[1] = op.value(),
                MatrixOpKind::QuatZ => current_xyzw[2] = op.value(),
                _ => {}
            }
        }
        let current = Quat::from_xyzw(current_xyzw[0], current_xyzw[1], current_xyzw[2], current_xyzw[3]).normalize();

        if current.dot(next) < 0.0 {
            for op in ops.iter_mut() {
                if !op.kind.is_quaternion() {
                    continue;
                }
                match &op.driver {
                    OpState::Constant(v) => op.driver = OpState::Constant(-v),
                    OpState::Spline(h) => {
                        let v = h.value();
                        let vel = h.velocity();
                        h.set_target(Target::current(-v, -vel)?)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn create_slot(&mut self, style: ComposerStyle, engine: &mut Engine, init_ops: Vec<MatrixOpInit>) -> Result<Index> {
        let first = self.table.create(1);
        let mut ops = Vec::with_capacity(init_ops.len());
        for op_init in &init_ops {
            assert!(op_init.id <= MAX_MATRIX_OP_ID, "matrix op id exceeds the maximum of 254");
            match style {
                ComposerStyle::Matrix => {
                    assert!(!op_init.kind.is_quaternion(), "a matrix-style composer cannot hold a quaternion op");
                }
                ComposerStyle::Sqt => {
                    assert!(!op_init.kind.is_rotate(), "an SQT-style composer cannot hold an axis-rotation op");
                }
            }
            ops.push(Self::new_op_from_init_record(engine, op_init)?);
        }
        ops.sort_by_key(|o| o.id);

        let slot = self.table.get_mut(first);
        slot.style = style;
        slot.ops = ops;
        slot.result_matrix = Mat4::IDENTITY;
        Ok(first)
    }
}

impl SlotOwner for ComposerProcessor {
    fn destroy_slot(&mut self, first: Index, width: Dimension) {
        self.table.destroy(first, width);
    }
}

impl Processor for ComposerProcessor {
    fn priority(&self) -> i32 {
        2
    }

    fn type_tag(&self) -> TypeTag {
        TypeTag::of::<ComposerProcessor>()
    }

    fn advance(&mut self, _dt: MotiveTime) {
        let moved = self.table.defragment();
        if moved > 0 {
            log::debug!("composer processor defragmented {moved} range(s)");
        }

        let firsts: Vec<Index> = self.table.active_firsts().collect();
        for first in firsts {
            let slot = self.table.get_mut(first);
            slot.result_matrix = match slot.style {
                ComposerStyle::Matrix => evaluate_matrix(&slot.ops),
                ComposerStyle::Sqt => evaluate_sqt(&slot.ops).0,
            };
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Handle<ComposerProcessor> {
    fn new_composer(engine: &mut Engine, style: ComposerStyle, ops: Vec<MatrixOpInit>) -> Result<Self> {
        let processor = engine.processor::<ComposerProcessor>()?;
        let first = processor.borrow_mut().create_slot(style, engine, ops)?;
        let cell = Rc::new(Cell::new(first));
        processor.borrow_mut().table.bind(first, &cell);
        Ok(Handle::from_parts(Rc::downgrade(&processor), cell, 1))
    }

    /// Creates a matrix-style composer (rotations allowed, no quaternion ops,
    /// no insertion during blend).
    pub fn new_matrix(engine: &mut Engine, ops: Vec<MatrixOpInit>) -> Result<Self> {
        Self::new_composer(engine, ComposerStyle::Matrix, ops)
    }

    /// Creates an SQT-style composer (quaternion ops allowed, no axis
    /// rotation, insertion allowed during blend).
    pub fn new_sqt(engine: &mut Engine, ops: Vec<MatrixOpInit>) -> Result<Self> {
        Self::new_composer(engine, ComposerStyle::Sqt, ops)
    }

    fn processor_or_panic(&self) -> Rc<RefCell<ComposerProcessor>> {
        self.processor().expect("accessed a detached composer handle")
    }

    fn processor_or_err(&self) -> Result<Rc<RefCell<ComposerProcessor>>> {
        self.processor().ok_or(MotiveError::DetachedHandle)
    }

    /// This frame's cached transform.
    #[must_use]
    pub fn matrix(&self) -> Mat4 {
        let p = self.processor_or_panic();
        let p = p.borrow();
        p.table.get(self.index()).result_matrix
    }

    /// Decomposes this frame's transform into translation/rotation/scale.
    /// For an SQT-style composer this is exact; for a matrix-style composer
    /// it is a decomposition of the cached matrix (the rig processor uses
    /// this to blend matrix-style bone composers, per §4.6).
    #[must_use]
    pub fn sqt(&self) -> (Vec3, Quat, Vec3) {
        let p = self.processor_or_panic();
        let p = p.borrow();
        let (scale, rotation, translation) = p.table.get(self.index()).result_matrix.to_scale_rotation_translation();
        (translation, rotation, scale)
    }

    /// Applies `rate` to every spline-driven op in this composer; constant
    /// ops are unaffected.
    pub fn set_playback_rate(&self, rate: f32) -> Result<()> {
        let p = self.processor_or_err()?;
        let p = p.borrow();
        for op in &p.table.get(self.index()).ops {
            if let OpState::Spline(h) = &op.driver {
                h.set_playback_rate(rate)?;
            }
        }
        Ok(())
    }

    /// Applies `repeat` to every spline-driven op in this composer.
    pub fn set_repeat(&self, repeat: bool) -> Result<()> {
        let p = self.processor_or_err()?;
        let p = p.borrow();
        for op in &p.table.get(self.index()).ops {
            if let OpState::Spline(h) = &op.driver {
                h.set_repeat(repeat)?;
            }
        }
        Ok(())
    }

    /// Per-op raw values, in ascending id order, for debug dumping (§10.5).
    #[must_use]
    pub fn child_values(&self) -> Vec<(MatrixOpKind, f32)> {
        let p = self.processor_or_panic();
        let p = p.borrow();
        p.table.get(self.index()).ops.iter().map(|op| (op.kind, op.value())).collect()
    }

    /// Snapshots this composer's current op values as constant-valued inits.
    /// Used when a rig clones a single running composer into a second slot
    /// for a newly added concurrent animation (§4.6).
    #[must_use]
    pub fn snapshot_ops(&self) -> Vec<MatrixOpInit> {
        let p = self.processor_or_panic();
        let p = p.borrow();
        p.table
            .get(self.index())
            .ops
            .iter()
            .map(|op| MatrixOpInit::constant(op.id, op.kind, op.value()))
            .collect()
    }

    /// Maximum, over every op's internal spline, of the spline-x distance
    /// remaining to its target; 0 if every op is constant.
    #[must_use]
    pub fn time_remaining(&self) -> f32 {
        let p = self.processor_or_panic();
        let p = p.borrow();
        p.table
            .get(self.index())
            .ops
            .iter()
            .map(ComposerOp::time_remaining)
            .fold(0.0_f32, f32::max)
    }

    /// Replaces the composer's future behavior with `new_ops`, per §4.5's
    /// three-way ascending-id merge. Matrix-style composers require
    /// `new_ops`' ids to be a subset of the existing ops' ids; panics
    /// (a caller precondition, not a runtime error) otherwise, mirroring the
    /// source's assertion rather than silently reordering (§9).
    pub fn blend_to(&self, engine: &mut Engine, new_ops: &[MatrixOpInit], playback: Playback) -> Result<()> {
        let processor = self.processor_or_err()?;
        let first = self.index();

        let style = processor.borrow().table.get(first).style;
        if style == ComposerStyle::Matrix {
            let existing_ids: Vec<_> = processor.borrow().table.get(first).ops.iter().map(|o| o.id).collect();
            for new_op in new_ops {
                assert!(
                    existing_ids.contains(&new_op.id),
                    "matrix-style composer cannot insert a new op id during blend"
                );
            }
        }

        let mut ops = std::mem::take(&mut processor.borrow_mut().table.get_mut(first).ops);
        if style == ComposerStyle::Sqt {
            ComposerProcessor::align_quaternion_ops(&mut ops, new_ops)?;
        }

        let mut old_ops = std::collections::VecDeque::from(ops);
        let mut result = Vec::with_capacity(old_ops.len().max(new_ops.len()));
        let mut new_idx = 0usize;

        while !old_ops.is_empty() && new_idx < new_ops.len() {
            let existing_id = old_ops[0].id;
            let new_id = new_ops[new_idx].id;
            if existing_id == new_id {
                let mut op = old_ops.pop_front().expect("checked non-empty above");
                ComposerProcessor::blend_op_to(engine, &mut op, &new_ops[new_idx], playback)?;
                result.push(op);
                new_idx += 1;
            } else if existing_id < new_id {
                let mut op = old_ops.pop_front().expect("checked non-empty above");
                ComposerProcessor::blend_op_to_default(engine, &mut op, playback)?;
                result.push(op);
            } else {
                let op = ComposerProcessor::new_op_blending_in(engine, &new_ops[new_idx], playback)?;
                result.push(op);
                new_idx += 1;
            }
        }
        while let Some(mut op) = old_ops.pop_front() {
            ComposerProcessor::blend_op_to_default(engine, &mut op, playback)?;
            result.push(op);
        }
        while new_idx < new_ops.len() {
            let op = ComposerProcessor::new_op_blending_in(engine, &new_ops[new_idx], playback)?;
            result.push(op);
            new_idx += 1;
        }

        processor.borrow_mut().table.get_mut(first).ops = result;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FactoryRegistry;

    fn engine_with_composer() -> Engine {
        let mut registry = FactoryRegistry::new();
        registry.register::<SplineProcessor>();
        registry.register::<ComposerProcessor>();
        Engine::new(Rc::new(registry))
    }

    #[test]
    fn simple_rotate_translate_matrix() {
        let mut eng = engine_with_composer();
        let ops = vec![
            MatrixOpInit::constant(0, MatrixOpKind::RotateY, std::f32::consts::FRAC_PI_3),
            MatrixOpInit::constant(1, MatrixOpKind::TranslateZ, 1.0),
        ];
        let handle = Handle::new_matrix(&mut eng, ops).unwrap();
        eng.advance(0);

        let expected =
            Mat4::from_rotation_y(std::f32::consts::FRAC_PI_3) * Mat4::from_translation(Vec3::new(0.0, 0.0, 1.0));
        let got = handle.matrix();
        let (e, g) = (expected.to_cols_array(), got.to_cols_array());
        for i in 0..16 {
            assert!((e[i] - g[i]).abs() < 1e-3, "column-major element {i}: expected {}, got {}", e[i], g[i]);
        }
    }

    #[test]
    fn matrix_style_rejects_op_insertion_during_blend() {
        let mut eng = engine_with_composer();
        let handle = Handle::new_matrix(&mut eng, vec![MatrixOpInit::constant(0, MatrixOpKind::TranslateX, 1.0)]).unwrap();
        let new_ops = vec![MatrixOpInit::constant(1, MatrixOpKind::TranslateX, 2.0)];
        let playback = Playback::instant();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            handle.blend_to(&mut eng, &new_ops, playback)
        }));
        assert!(result.is_err(), "expected a panic for out-of-subset op ids");
    }

    #[test]
    fn blend_to_default_decays_dropped_op_to_identity_value() {
        let mut eng = engine_with_composer();
        let handle = Handle::new_matrix(
            &mut eng,
            vec![
                MatrixOpInit::constant(0, MatrixOpKind::TranslateX, 5.0),
                MatrixOpInit::constant(1, MatrixOpKind::ScaleX, 2.0),
            ],
        )
        .unwrap();

        // Blend to only op 0; op 1 (scale) should decay toward its default (1.0).
        let new_ops = vec![MatrixOpInit::constant(0, MatrixOpKind::TranslateX, 5.0)];
        handle.blend_to(&mut eng, &new_ops, Playback::instant()).unwrap();
        eng.advance(0);

        let m = handle.matrix();
        assert!((m.col(0).x - 1.0).abs() < 1e-3, "scale op should have collapsed to its default");
    }
}
