//! The rig processor (priority 3): blends one or more concurrently-playing
//! animations across a bone hierarchy into per-bone global transforms.
//!
//! Grounded on §4.6 and on `src/motive/processor/rig_data.h` from the
//! retrieved upstream source: the struct-of-arrays composer layout
//! (`motivators_`, all bones for animation 0 then all bones for animation 1),
//! `BlendToAnim`/`BlendToAnims` (including the "clone the single running
//! composer" and "seed from defining animation defaults" cases when growing
//! past one concurrent animation), the single ascending-bone-index pass for
//! `CalculateGlobalTransforms`/`CalculateBlendedGlobalTransforms`, and the
//! root-motion bone special case. Unlike the source, a rig here owns a copy
//! of its defining hierarchy rather than a raw pointer into it, for the same
//! handle-safety reasons as [`crate::processors::composer`]'s redesign.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use glam::{Mat4, Quat, Vec3, Vec4};

use crate::engine::Engine;
use crate::error::{MotiveError, Result};
use crate::handle::{Handle, Processor, SlotOwner, TypeTag};
use crate::index::{Dimension, Index};
use crate::processors::composer::ComposerProcessor;
use crate::processors::matrix_op::{MatrixOpId, MatrixOpInit, MatrixOpKind};
use crate::slot_table::SlotTable;
use crate::time::{MotiveTime, Playback};

/// Index of a bone within a rig's (or animation's) hierarchy.
pub type BoneIndex = i16;

/// Sentinel meaning "no parent" — this bone is a hierarchy root.
pub const INVALID_BONE: BoneIndex = -1;

/// One authored animation: a bone hierarchy plus the ordered op list driving
/// each bone's local transform, as a matrix-style composer would take it.
///
/// `bone_parents[i]` must be [`INVALID_BONE`] or `< i` — every parent is
/// listed before its children (mirrors the source's implicit assumption,
/// asserted in `CalculateGlobalTransforms`).
pub struct RigAnimation {
    bone_parents: Vec<BoneIndex>,
    bone_ops: Vec<Vec<MatrixOpInit>>,
    end_time: MotiveTime,
    name: String,
}

impl RigAnimation {
    #[must_use]
    pub fn new(name: impl Into<String>, bone_parents: Vec<BoneIndex>, bone_ops: Vec<Vec<MatrixOpInit>>, end_time: MotiveTime) -> Self {
        assert_eq!(bone_parents.len(), bone_ops.len(), "one op list is required per bone");
        for (i, &parent) in bone_parents.iter().enumerate() {
            assert!(
                parent == INVALID_BONE || (parent as usize) < i,
                "bone {i}'s parent must be listed earlier in bone_parents"
            );
        }
        RigAnimation { bone_parents, bone_ops, end_time, name: name.into() }
    }

    #[must_use]
    pub fn num_bones(&self) -> usize {
        self.bone_parents.len()
    }

    #[must_use]
    pub fn bone_parents(&self) -> &[BoneIndex] {
        &self.bone_parents
    }

    /// The op list authored for `bone`, or empty if this animation has fewer
    /// bones than the rig it is played against (everything on that bone
    /// decays to its default, per §4.6).
    #[must_use]
    pub fn ops_for_bone(&self, bone: usize) -> &[MatrixOpInit] {
        self.bone_ops.get(bone).map_or(&[][..], Vec::as_slice)
    }

    #[must_use]
    pub fn end_time(&self) -> MotiveTime {
        self.end_time
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Default)]
struct RigSlot {
    bone_parents: Vec<BoneIndex>,
    /// Struct-of-arrays: all `num_bones` composers for animation 0, then all
    /// for animation 1, etc. `composers.len() == num_bones * weights.len()`.
    composers: Vec<Handle<ComposerProcessor>>,
    weights: Vec<f32>,
    num_bones: usize,
    root_motion_bone: BoneIndex,
    global_transforms: Vec<Mat4>,
    root_motion_transform: Mat4,
    end_time: MotiveTime,
    /// `(op id, op kind)` per bone, fixed at creation from the defining
    /// animation. A matrix-style composer's op set never grows after
    /// creation (insertion is forbidden), so this stays valid for the rig's
    /// whole lifetime and is what the debug CSV surface is shaped against.
    bone_op_info: Vec<Vec<(MatrixOpId, MatrixOpKind)>>,
    current_anim_name: String,
    current_anim_duration: MotiveTime,
}

#[derive(Default)]
pub struct RigProcessor {
    table: SlotTable<RigSlot>,
}

impl RigProcessor {
    fn check_hierarchy(rig_bones: &[BoneIndex], anim: &RigAnimation) -> Result<()> {
        // A single-bone animation drives only the root of any rig (§4.6).
        if anim.num_bones() == 1 || rig_bones.len() == 1 {
            return Ok(());
        }
        if rig_bones != anim.bone_parents() {
            return Err(MotiveError::HierarchyMismatch { rig_bones: rig_bones.len(), anim_bones: anim.num_bones() });
        }
        Ok(())
    }

    fn create_slot(&mut self, engine: &mut Engine, defining: &RigAnimation, root_motion_bone: BoneIndex, start_time: MotiveTime) -> Result<Index> {
        let num_bones = defining.num_bones();
        let first = self.table.create(1);

        let mut composers = Vec::with_capacity(num_bones);
        let mut bone_op_info = Vec::with_capacity(num_bones);
        for b in 0..num_bones {
            let ops = defining.ops_for_bone(b).to_vec();
            bone_op_info.push(ops.iter().map(|o| (o.id, o.kind)).collect());
            composers.push(Handle::new_matrix(engine, ops)?);
        }

        let slot = self.table.get_mut(first);
        slot.bone_parents = defining.bone_parents().to_vec();
        slot.composers = composers;
        slot.weights = vec![1.0];
        slot.num_bones = num_bones;
        slot.root_motion_bone = root_motion_bone;
        slot.global_transforms = vec![Mat4::IDENTITY; num_bones];
        slot.root_motion_transform = Mat4::IDENTITY;
        slot.end_time = start_time + defining.end_time();
        slot.bone_op_info = bone_op_info;
        slot.current_anim_name = defining.name().to_string();
        slot.current_anim_duration = defining.end_time();
        Ok(first)
    }

    fn place_bone(slot: &mut RigSlot, bone: usize, local: Mat4) {
        let parent = slot.bone_parents[bone];
        let is_root_motion = slot.root_motion_bone >= 0 && bone == slot.root_motion_bone as usize;
        if is_root_motion {
            slot.root_motion_transform = local;
            slot.global_transforms[bone] = if parent == INVALID_BONE {
                Mat4::IDENTITY
            } else {
                slot.global_transforms[parent as usize]
            };
            return;
        }
        slot.global_transforms[bone] = if parent == INVALID_BONE {
            local
        } else {
            slot.global_transforms[parent as usize] * local
        };
    }

    fn update_global_transforms(slot: &mut RigSlot) {
        let num_bones = slot.num_bones;
        let num_anims = slot.weights.len();

        if num_anims <= 1 {
            for b in 0..num_bones {
                let local = slot.composers[b].matrix();
                Self::place_bone(slot, b, local);
            }
            return;
        }

        for b in 0..num_bones {
            let mut translation = Vec3::ZERO;
            let mut scale = Vec3::ZERO;
            let mut quat_acc = Vec4::ZERO;
            let mut first_quat: Option<Quat> = None;

            for a in 0..num_anims {
                let weight = slot.weights[a];
                let (t, q, s) = slot.composers[a * num_bones + b].sqt();
                let mut rotation_weight = weight;
                match first_quat {
                    None => first_quat = Some(q),
                    Some(first) => {
                        if first.dot(q) < 0.0 {
                            rotation_weight = -rotation_weight;
                        }
                    }
                }
                translation += t * weight;
                scale += s * weight;
                quat_acc += Vec4::new(q.x, q.y, q.z, q.w) * rotation_weight;
            }

            let quat_acc = quat_acc.normalize_or_zero();
            let rotation = if quat_acc == Vec4::ZERO {
                Quat::IDENTITY
            } else {
                Quat::from_xyzw(quat_acc.x, quat_acc.y, quat_acc.z, quat_acc.w)
            };
            let local = Mat4::from_scale_rotation_translation(scale, rotation, translation);
            Self::place_bone(slot, b, local);
        }
    }
}

impl SlotOwner for RigProcessor {
    fn destroy_slot(&mut self, first: Index, width: Dimension) {
        self.table.destroy(first, width);
    }
}

impl Processor for RigProcessor {
    fn priority(&self) -> i32 {
        3
    }

    fn type_tag(&self) -> TypeTag {
        TypeTag::of::<RigProcessor>()
    }

    fn advance(&mut self, _dt: MotiveTime) {
        let moved = self.table.defragment();
        if moved > 0 {
            log::debug!("rig processor defragmented {moved} range(s)");
        }

        let firsts: Vec<Index> = self.table.active_firsts().collect();
        for first in firsts {
            Self::update_global_transforms(self.table.get_mut(first));
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Handle<RigProcessor> {
    /// Creates a rig bound to `defining`'s hierarchy, with every bone's
    /// composer seeded directly from `defining`'s ops (no blend).
    pub fn new_rig(engine: &mut Engine, defining: &RigAnimation, root_motion_bone: BoneIndex, start_time: MotiveTime) -> Result<Self> {
        let processor = engine.processor::<RigProcessor>()?;
        let first = processor.borrow_mut().create_slot(engine, defining, root_motion_bone, start_time)?;
        let cell = Rc::new(Cell::new(first));
        processor.borrow_mut().table.bind(first, &cell);
        Ok(Handle::from_parts(Rc::downgrade(&processor), cell, 1))
    }

    fn processor_or_panic(&self) -> Rc<RefCell<RigProcessor>> {
        self.processor().expect("accessed a detached rig handle")
    }

    fn processor_or_err(&self) -> Result<Rc<RefCell<RigProcessor>>> {
        self.processor().ok_or(MotiveError::DetachedHandle)
    }

    /// Collapses this rig onto a single animation, blending every bone's
    /// composer toward `anim`'s ops for that bone (§4.6 `BlendToAnim`).
    pub fn blend_to(&self, engine: &mut Engine, anim: &RigAnimation, playback: Playback, start_time: MotiveTime) -> Result<()> {
        let processor = self.processor_or_err()?;
        let first = self.index();

        let rig_bones = processor.borrow().table.get(first).bone_parents.clone();
        RigProcessor::check_hierarchy(&rig_bones, anim)?;

        let num_bones = processor.borrow().table.get(first).num_bones;
        {
            let mut p = processor.borrow_mut();
            let slot = p.table.get_mut(first);
            slot.weights = vec![1.0];
            slot.composers.truncate(num_bones);
        }

        for b in 0..num_bones {
            let p = processor.borrow();
            let composer = &p.table.get(first).composers[b];
            composer.blend_to(engine, anim.ops_for_bone(b), playback)?;
        }

        let mut p = processor.borrow_mut();
        let slot = p.table.get_mut(first);
        slot.end_time = start_time + anim.end_time();
        slot.current_anim_name = anim.name().to_string();
        slot.current_anim_duration = anim.end_time();
        Ok(())
    }

    /// Blends toward several concurrently-playing animations, each weighted.
    /// Weights are normalized to sum to 1; rejects a non-positive total
    /// (§4.6 `BlendToAnims`).
    pub fn blend_to_many(
        &self,
        engine: &mut Engine,
        anims: &[&RigAnimation],
        playbacks: &[Playback],
        weights: &[f32],
        start_time: MotiveTime,
    ) -> Result<()> {
        assert_eq!(anims.len(), playbacks.len(), "one playback is required per animation");
        assert_eq!(anims.len(), weights.len(), "one weight is required per animation");

        let total_weight: f32 = weights.iter().sum();
        if total_weight <= 0.0 {
            return Err(MotiveError::InvalidTarget("rig blend weights must sum to a positive total"));
        }
        let normalized: Vec<f32> = weights.iter().map(|w| w / total_weight).collect();

        let processor = self.processor_or_err()?;
        let first = self.index();

        let rig_bones = processor.borrow().table.get(first).bone_parents.clone();
        for anim in anims {
            RigProcessor::check_hierarchy(&rig_bones, anim)?;
        }

        let num_bones = processor.borrow().table.get(first).num_bones;
        let old_count = processor.borrow().table.get(first).weights.len();
        let new_count = anims.len();

        {
            let mut p = processor.borrow_mut();
            let slot = p.table.get_mut(first);
            slot.composers.resize_with(num_bones * new_count, Handle::default);
            slot.weights = normalized;
        }

        for a in 0..new_count {
            let base = a * num_bones;
            for b in 0..num_bones {
                let idx = base + b;
                if a >= old_count {
                    let new_handle = if old_count == 1 {
                        let source_ops = processor.borrow().table.get(first).composers[b].snapshot_ops();
                        Handle::new_matrix(engine, source_ops)?
                    } else {
                        let defining_ops: Vec<MatrixOpInit> = processor.borrow().table.get(first).bone_op_info[b]
                            .iter()
                            .map(|&(id, kind)| MatrixOpInit::constant(id, kind, kind.default_value()))
                            .collect();
                        Handle::new_matrix(engine, defining_ops)?
                    };
                    processor.borrow_mut().table.get_mut(first).composers[idx] = new_handle;
                }

                let p = processor.borrow();
                let composer = &p.table.get(first).composers[idx];
                composer.blend_to(engine, anims[a].ops_for_bone(b), playbacks[a])?;
            }
        }

        let mut p = processor.borrow_mut();
        let slot = p.table.get_mut(first);
        let max_duration = anims.iter().map(|a| a.end_time()).max().unwrap_or(0);
        slot.end_time = start_time + max_duration;
        slot.current_anim_name = anims[0].name().to_string();
        slot.current_anim_duration = anims[0].end_time();
        Ok(())
    }

    /// Applies `rate` to every bone's composer, across every concurrent animation.
    pub fn set_playback_rate(&self, rate: f32) -> Result<()> {
        let p = self.processor_or_err()?;
        let p = p.borrow();
        for composer in &p.table.get(self.index()).composers {
            composer.set_playback_rate(rate)?;
        }
        Ok(())
    }

    /// Applies a per-animation rate to that animation's bone composers only.
    pub fn set_playback_rates(&self, rates: &[f32]) -> Result<()> {
        let p = self.processor_or_err()?;
        let p = p.borrow();
        let slot = p.table.get(self.index());
        assert_eq!(rates.len(), slot.weights.len(), "one rate is required per concurrent animation");
        for (a, &rate) in rates.iter().enumerate() {
            for b in 0..slot.num_bones {
                slot.composers[a * slot.num_bones + b].set_playback_rate(rate)?;
            }
        }
        Ok(())
    }

    pub fn set_repeat(&self, repeat: bool) -> Result<()> {
        let p = self.processor_or_err()?;
        let p = p.borrow();
        for composer in &p.table.get(self.index()).composers {
            composer.set_repeat(repeat)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn num_bones(&self) -> usize {
        let p = self.processor_or_panic();
        let p = p.borrow();
        p.table.get(self.index()).num_bones
    }

    /// The most recently computed global transform for `bone`.
    #[must_use]
    pub fn global_transform(&self, bone: usize) -> Mat4 {
        let p = self.processor_or_panic();
        let p = p.borrow();
        p.table.get(self.index()).global_transforms[bone]
    }

    #[must_use]
    pub fn global_transforms(&self) -> Vec<Mat4> {
        let p = self.processor_or_panic();
        let p = p.borrow();
        p.table.get(self.index()).global_transforms.clone()
    }

    /// The root-motion bone's local transform, or identity if this rig has
    /// no declared root-motion bone.
    #[must_use]
    pub fn root_motion_transform(&self) -> Mat4 {
        let p = self.processor_or_panic();
        let p = p.borrow();
        p.table.get(self.index()).root_motion_transform
    }

    /// Time remaining until every bone's composer, across every concurrent
    /// animation, has settled (`0` if already settled; [`ENDLESS`] never
    /// returned here since composer ops always resolve in finite time).
    #[must_use]
    pub fn time_remaining(&self) -> MotiveTime {
        let p = self.processor_or_panic();
        let p = p.borrow();
        p.table
            .get(self.index())
            .composers
            .iter()
            .map(|c| c.time_remaining().round() as MotiveTime)
            .max()
            .unwrap_or(0)
    }

    /// Time remaining for just the bones driven by concurrent animation `anim_index`.
    #[must_use]
    pub fn child_time_remaining(&self, anim_index: usize) -> MotiveTime {
        let p = self.processor_or_panic();
        let p = p.borrow();
        let slot = p.table.get(self.index());
        let base = anim_index * slot.num_bones;
        slot.composers[base..base + slot.num_bones]
            .iter()
            .map(|c| c.time_remaining().round() as MotiveTime)
            .max()
            .unwrap_or(0)
    }

    /// CSV header naming one column per `(bone, op id)` pair, matching the
    /// defining animation's op layout for the whole life of this rig (§10.5).
    #[must_use]
    pub fn debug_csv_header(&self) -> String {
        let p = self.processor_or_panic();
        let p = p.borrow();
        let slot = p.table.get(self.index());
        let mut header = String::from("animation name,time");
        for (b, ops) in slot.bone_op_info.iter().enumerate() {
            for (id, _) in ops {
                header.push_str(&format!(",b{b}.op{id}"));
            }
        }
        header
    }

    /// One CSV row of the current frame's op values, in the same column
    /// order as [`Handle::debug_csv_header`]. Rotation ops report in degrees.
    #[must_use]
    pub fn debug_csv_row(&self, current_time: MotiveTime) -> String {
        let p = self.processor_or_panic();
        let p = p.borrow();
        let slot = p.table.get(self.index());
        let anim_time = current_time - slot.end_time + slot.current_anim_duration;
        let mut row = format!("{},{}", slot.current_anim_name, anim_time);
        for b in 0..slot.num_bones {
            for (kind, value) in slot.composers[b].child_values() {
                let degrees = if kind.is_rotate() { value * 180.0 / std::f32::consts::PI } else { value };
                row.push_str(&format!(",{degrees}"));
            }
        }
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::spline::SplineProcessor;
    use crate::registry::FactoryRegistry;

    fn engine_with_rig() -> Engine {
        let mut registry = FactoryRegistry::new();
        registry.register::<SplineProcessor>();
        registry.register::<ComposerProcessor>();
        registry.register::<RigProcessor>();
        Engine::new(Rc::new(registry))
    }

    fn translate_x_anim(name: &str, values: &[f32], parents: Vec<BoneIndex>) -> RigAnimation {
        let bone_ops = values
            .iter()
            .map(|&v| vec![MatrixOpInit::constant(0, MatrixOpKind::TranslateX, v)])
            .collect();
        RigAnimation::new(name, parents, bone_ops, 0)
    }

    #[test]
    fn single_animation_chain_accumulates_translation() {
        let mut eng = engine_with_rig();
        let anim = translate_x_anim("chain", &[1.0, 2.0, 3.0], vec![INVALID_BONE, 0, 1]);
        let rig = Handle::new_rig(&mut eng, &anim, INVALID_BONE, 0).unwrap();
        eng.advance(0);

        let expected = [1.0, 3.0, 6.0];
        for (b, &want) in expected.iter().enumerate() {
            let got = rig.global_transform(b).col(3).x;
            assert!((got - want).abs() < 1e-4, "bone {b}: expected {want}, got {got}");
        }
    }

    #[test]
    fn blend_to_many_averages_translation_by_weight() {
        let mut eng = engine_with_rig();
        let anim_a = translate_x_anim("a", &[10.0], vec![INVALID_BONE]);
        let rig = Handle::new_rig(&mut eng, &anim_a, INVALID_BONE, 0).unwrap();
        eng.advance(0);

        let anim_b = translate_x_anim("b", &[20.0], vec![INVALID_BONE]);
        let anims: Vec<&RigAnimation> = vec![&anim_a, &anim_b];
        let playbacks = vec![Playback::instant(), Playback::instant()];
        rig.blend_to_many(&mut eng, &anims, &playbacks, &[0.5, 0.5], 0).unwrap();
        eng.advance(0);

        let got = rig.global_transform(0).col(3).x;
        assert!((got - 15.0).abs() < 1e-3, "expected weighted translation 15.0, got {got}");
    }

    #[test]
    fn mismatched_hierarchy_is_rejected() {
        let mut eng = engine_with_rig();
        let anim = translate_x_anim("chain", &[1.0, 2.0], vec![INVALID_BONE, 0]);
        let rig = Handle::new_rig(&mut eng, &anim, INVALID_BONE, 0).unwrap();

        let mismatched = translate_x_anim("other", &[1.0, 2.0], vec![INVALID_BONE, INVALID_BONE]);
        let result = rig.blend_to(&mut eng, &mismatched, Playback::instant(), 0);
        assert!(matches!(result, Err(MotiveError::HierarchyMismatch { rig_bones: 2, anim_bones: 2 })));
    }

    #[test]
    fn root_motion_bone_is_extracted_and_replaced_with_identity() {
        let mut eng = engine_with_rig();
        let anim = translate_x_anim("chain", &[5.0, 1.0], vec![INVALID_BONE, 0]);
        let rig = Handle::new_rig(&mut eng, &anim, 0, 0).unwrap();
        eng.advance(0);

        assert!((rig.root_motion_transform().col(3).x - 5.0).abs() < 1e-4);
        // Bone 0's contribution to the hierarchy is identity, so bone 1's
        // global transform reflects only its own local translation.
        let got = rig.global_transform(1).col(3).x;
        assert!((got - 1.0).abs() < 1e-4, "expected root motion substitution, got {got}");
    }

    #[test]
    fn time_remaining_is_zero_once_settled() {
        let mut eng = engine_with_rig();
        let anim = translate_x_anim("chain", &[1.0], vec![INVALID_BONE]);
        let rig = Handle::new_rig(&mut eng, &anim, INVALID_BONE, 0).unwrap();
        eng.advance(0);
        assert_eq!(rig.time_remaining(), 0);
    }

    #[test]
    fn debug_csv_header_names_one_column_per_bone_op() {
        let mut eng = engine_with_rig();
        let anim = translate_x_anim("chain", &[1.0, 2.0], vec![INVALID_BONE, 0]);
        let rig = Handle::new_rig(&mut eng, &anim, INVALID_BONE, 0).unwrap();
        assert_eq!(rig.debug_csv_header(), "animation name,time,b0.op0,b1.op0");
    }
}
