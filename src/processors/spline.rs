//! The spline processor (priority 0): drives a scalar along a curve.
//!
//! Grounded on the data model's spline section and §4.4; the one bundled
//! `Curve` implementation ([`crate::curve::CubicCurve`]) and its
//! cursor/bulk-evaluate style come from the teacher's `animation/tracks.rs`.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::curve::{Curve, CurveNode};
use crate::error::{MotiveError, Result};
use crate::handle::{Handle, Processor, SlotOwner, TypeTag};
use crate::index::{Dimension, Index};
use crate::range::{Direction, Range};
use crate::slot_table::SlotTable;
use crate::target::Target;
use crate::time::{MotiveTime, Playback};

/// Configuration a caller supplies when creating a spline handle: the
/// declared value range and whether it wraps modularly (e.g. an angle).
#[derive(Debug, Clone, Copy)]
pub struct SplineInit {
    pub y_range: Range,
    pub modular: bool,
}

#[derive(Clone, Default)]
enum CurveSource {
    #[default]
    None,
    Borrowed(Rc<dyn Curve>),
    /// Index into the processor's inline-curve pool.
    Inline(usize),
}

#[derive(Clone, Default)]
struct SplineSlot {
    curve: CurveSource,
    x: f32,
    y_range: Range,
    modular: bool,
    playback_rate: f32,
    repeat: bool,
    value: f32,
    dy_dx: f32,
}

/// Drives any number of independent scalar values along curves.
#[derive(Default)]
pub struct SplineProcessor {
    table: SlotTable<SplineSlot>,
    pool: Vec<Option<CubicCurve2>>,
}

// `CubicCurve` from `crate::curve` is re-exported here under a local alias so
// the pool's element type reads clearly as "a pooled inline curve" rather
// than the general-purpose curve type; they are the same type.
type CubicCurve2 = crate::curve::CubicCurve;

impl SplineProcessor {
    fn curve_of<'a>(&'a self, slot: &'a SplineSlot) -> Option<&'a dyn Curve> {
        match &slot.curve {
            CurveSource::None => None,
            CurveSource::Borrowed(rc) => Some(rc.as_ref()),
            CurveSource::Inline(idx) => self.pool[*idx].as_ref().map(|c| c as &dyn Curve),
        }
    }

    fn free_inline_at(&mut self, first: Index) {
        let old = std::mem::replace(&mut self.table.get_mut(first).curve, CurveSource::None);
        if let CurveSource::Inline(idx) = old {
            self.pool[idx] = None;
        }
    }

    fn alloc_inline(&mut self, curve: CubicCurve2) -> usize {
        if let Some(pos) = self.pool.iter().position(Option::is_none) {
            self.pool[pos] = Some(curve);
            pos
        } else {
            self.pool.push(Some(curve));
            self.pool.len() - 1
        }
    }

    /// Allocates `inits.len()` consecutive slots for one packed handle (§4.4
    /// "an N-wide pack of scalars, one per slot"), e.g. width 3 for a vec3.
    fn create_pack(&mut self, inits: &[SplineInit]) -> Index {
        let width = inits.len() as Dimension;
        let first = self.table.create(width);
        for (slot, init) in self.table.slice_mut(first, width).iter_mut().zip(inits) {
            *slot = SplineSlot {
                curve: CurveSource::None,
                x: 0.0,
                y_range: init.y_range,
                modular: init.modular,
                playback_rate: 1.0,
                repeat: false,
                value: 0.0,
                dy_dx: 0.0,
            };
        }
        first
    }

    /// Builds the inline target-following curve described by §4.4's
    /// "Target -> curve synthesis": resolves each waypoint's y-value under
    /// the requested [`Direction`], widens the y-range to cover the
    /// waypoints (plus overshoot headroom), and returns nodes ready for
    /// [`CubicCurve::new`].
    fn synthesize_target_nodes(slot: &SplineSlot, target: &Target) -> (Vec<CurveNode>, Range) {
        let waypoints = target.waypoints();
        let (start_x, start_value, start_velocity, rest) = if waypoints[0].time == 0 {
            (0.0_f32, waypoints[0].value, waypoints[0].velocity, &waypoints[1..])
        } else {
            (0.0_f32, slot.value, slot.dy_dx, waypoints)
        };

        let mut nodes = vec![CurveNode { x: start_x, y: start_value, dy_dx: start_velocity }];
        let mut reference = start_value;
        let mut min_y = start_value;
        let mut max_y = start_value;
        for w in rest {
            let resolved = w.direction.resolve(&slot.y_range, slot.modular, reference, w.value);
            nodes.push(CurveNode { x: w.time as f32, y: resolved, dy_dx: w.velocity });
            reference = resolved;
            min_y = min_y.min(resolved);
            max_y = max_y.max(resolved);
        }

        let range = if slot.modular {
            let widened = slot.y_range.length() * (1.0 + rest.len() as f32);
            Range::new(slot.y_range.start, slot.y_range.start + widened)
        } else {
            let span = (max_y - min_y).max(f32::EPSILON);
            let buffer = span * 0.2;
            Range::new(min_y - buffer, max_y + buffer)
        };

        (nodes, range)
    }
}

impl SlotOwner for SplineProcessor {
    fn destroy_slot(&mut self, first: Index, width: Dimension) {
        for offset in 0..width as Index {
            self.free_inline_at(first + offset);
        }
        self.table.destroy(first, width);
    }
}

impl Processor for SplineProcessor {
    fn priority(&self) -> i32 {
        0
    }

    fn type_tag(&self) -> TypeTag {
        TypeTag::of::<SplineProcessor>()
    }

    fn advance(&mut self, dt: MotiveTime) {
        let moved = self.table.defragment();
        if moved > 0 {
            log::debug!("spline processor defragmented {moved} range(s)");
        }

        let ranges: Vec<(Index, Dimension)> = self.table.active_ranges().to_vec();
        for (first, width) in ranges {
            for offset in 0..width as Index {
                let lane = first + offset;
                let slot = self.table.get(lane).clone();
                let Some(curve) = self.curve_of(&slot) else { continue };

                let mut x = slot.x + dt as f32 * slot.playback_rate;
                let end = curve.end_x();
                let start = curve.start_x();
                if slot.repeat && end > start {
                    let span = end - start;
                    x = start + (x - start).rem_euclid(span);
                } else {
                    x = x.clamp(start, end);
                }

                let mut y = [0.0f32; 1];
                let mut dy = [0.0f32; 1];
                curve.evaluate_range(x, 0.0, 1, &mut y, &mut dy);
                let value = if slot.modular { slot.y_range.normalize(y[0]) } else { y[0] };

                let slot_mut = self.table.get_mut(lane);
                slot_mut.x = x;
                slot_mut.value = value;
                slot_mut.dy_dx = dy[0];
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Handle<SplineProcessor> {
    /// Creates a new spline handle, allocating a slot in the engine's
    /// [`SplineProcessor`] (created on first use).
    pub fn new_spline(engine: &mut crate::engine::Engine, init: SplineInit) -> Result<Self> {
        Handle::new_splines(engine, std::slice::from_ref(&init))
    }

    /// Creates a packed handle occupying `inits.len()` consecutive slots
    /// (§3 "Dimension"; §4.4 "an N-wide pack of scalars, one per slot"),
    /// e.g. three slots for a vec3.
    pub fn new_splines(engine: &mut crate::engine::Engine, inits: &[SplineInit]) -> Result<Self> {
        let dimension = inits.len();
        let processor = engine.processor::<SplineProcessor>()?;
        let first = processor.borrow_mut().create_pack(inits);
        let cell = Rc::new(Cell::new(first));
        processor.borrow_mut().table.bind(first, &cell);
        Ok(Handle::from_parts(Rc::downgrade(&processor), cell, dimension))
    }

    fn processor_or_panic(&self) -> Rc<RefCell<SplineProcessor>> {
        self.processor().expect("accessed a detached spline handle")
    }

    fn processor_or_err(&self) -> Result<Rc<RefCell<SplineProcessor>>> {
        self.processor().ok_or(MotiveError::DetachedHandle)
    }

    fn set_spline_at(p: &mut SplineProcessor, lane: Index, curve: Rc<dyn Curve>, playback: &Playback) {
        p.free_inline_at(lane);
        let slot = p.table.get_mut(lane);
        slot.curve = CurveSource::Borrowed(curve);
        slot.x = playback.start_time as f32;
        slot.playback_rate = playback.playback_rate;
        slot.repeat = playback.repeat;
    }

    /// Binds an explicit, externally owned curve. The caller guarantees the
    /// curve outlives the bind (§5 resource policy).
    pub fn set_spline(&self, curve: Rc<dyn Curve>, playback: Playback) -> Result<()> {
        let processor = self.processor_or_err()?;
        Handle::set_spline_at(&mut processor.borrow_mut(), self.index(), curve, &playback);
        Ok(())
    }

    /// `set_splines(first, curves[], playback)` (§4.4): binds one curve per
    /// lane of a packed handle. `curves.len()` must equal `self.dimension()`.
    pub fn set_splines(&self, curves: &[Rc<dyn Curve>], playback: Playback) -> Result<()> {
        assert_eq!(curves.len(), self.dimension(), "curve count must match packed handle width");
        let processor = self.processor_or_err()?;
        let mut p = processor.borrow_mut();
        for (offset, curve) in curves.iter().enumerate() {
            Handle::set_spline_at(&mut p, self.index() + offset as Index, Rc::clone(curve), &playback);
        }
        Ok(())
    }

    fn set_target_at(p: &mut SplineProcessor, lane: Index, target: &Target) {
        let slot_snapshot = p.table.get(lane).clone();
        let (nodes, range) = SplineProcessor::synthesize_target_nodes(&slot_snapshot, target);
        let modular = slot_snapshot.modular;
        let curve = CubicCurve2::new(nodes, range, modular);

        p.free_inline_at(lane);
        let idx = p.alloc_inline(curve);
        let slot = p.table.get_mut(lane);
        slot.curve = CurveSource::Inline(idx);
        slot.x = 0.0;
    }

    /// Synthesizes and binds an inline curve following `target` (§4.4).
    pub fn set_target(&self, target: Target) -> Result<()> {
        let processor = self.processor_or_err()?;
        Handle::set_target_at(&mut processor.borrow_mut(), self.index(), &target);
        Ok(())
    }

    /// `set_targets(first, targets[])` (§4.4): synthesizes one inline curve
    /// per lane of a packed handle. `targets.len()` must equal `self.dimension()`.
    pub fn set_targets(&self, targets: &[Target]) -> Result<()> {
        assert_eq!(targets.len(), self.dimension(), "target count must match packed handle width");
        let processor = self.processor_or_err()?;
        let mut p = processor.borrow_mut();
        for (offset, target) in targets.iter().enumerate() {
            Handle::set_target_at(&mut p, self.index() + offset as Index, target);
        }
        Ok(())
    }

    pub fn set_spline_time(&self, x: f32) -> Result<()> {
        let processor = self.processor_or_err()?;
        processor.borrow_mut().table.get_mut(self.index()).x = x;
        Ok(())
    }

    pub fn set_playback_rate(&self, rate: f32) -> Result<()> {
        let processor = self.processor_or_err()?;
        processor.borrow_mut().table.get_mut(self.index()).playback_rate = rate;
        Ok(())
    }

    pub fn set_repeat(&self, repeat: bool) -> Result<()> {
        let processor = self.processor_or_err()?;
        processor.borrow_mut().table.get_mut(self.index()).repeat = repeat;
        Ok(())
    }

    #[must_use]
    pub fn value(&self) -> f32 {
        self.value_at(0)
    }

    /// `value` for one lane of a packed handle. `lane` must be `< dimension()`.
    #[must_use]
    pub fn value_at(&self, lane: Dimension) -> f32 {
        let p = self.processor_or_panic();
        let p = p.borrow();
        p.table.get(self.index() + lane as Index).value
    }

    /// Rate of change with respect to wall-clock time (`dy/dx * playback_rate`).
    #[must_use]
    pub fn velocity(&self) -> f32 {
        let p = self.processor_or_panic();
        let p = p.borrow();
        let slot = p.table.get(self.index());
        slot.dy_dx * slot.playback_rate
    }

    /// Rate of change with respect to the spline's own `x`, i.e. velocity as
    /// if `playback_rate == 1`.
    #[must_use]
    pub fn direction(&self) -> f32 {
        let p = self.processor_or_panic();
        let p = p.borrow();
        p.table.get(self.index()).dy_dx
    }

    #[must_use]
    pub fn spline_time(&self) -> f32 {
        let p = self.processor_or_panic();
        let p = p.borrow();
        p.table.get(self.index()).x
    }

    #[must_use]
    pub fn target_value(&self) -> f32 {
        let p = self.processor_or_panic();
        let p = p.borrow();
        let slot = p.table.get(self.index());
        p.curve_of(slot).map_or(slot.value, |c| c.node_at(c.node_count() - 1).y)
    }

    #[must_use]
    pub fn target_velocity(&self) -> f32 {
        let p = self.processor_or_panic();
        let p = p.borrow();
        let slot = p.table.get(self.index());
        p.curve_of(slot).map_or(0.0, |c| c.node_at(c.node_count() - 1).dy_dx)
    }

    /// `target_value - value`, resolved modularly when the slot is modular.
    #[must_use]
    pub fn difference(&self) -> f32 {
        let p = self.processor_or_panic();
        let p = p.borrow();
        let slot = p.table.get(self.index());
        let target = p.curve_of(slot).map_or(slot.value, |c| c.node_at(c.node_count() - 1).y);
        if slot.modular {
            slot.y_range.modular_difference(slot.value, target)
        } else {
            target - slot.value
        }
    }

    /// Spline-x distance remaining to the target, as if `playback_rate == 1`
    /// (§9 resolved open question — not rescaled by the current rate).
    #[must_use]
    pub fn target_time(&self) -> f32 {
        let p = self.processor_or_panic();
        let p = p.borrow();
        let slot = p.table.get(self.index());
        p.curve_of(slot).map_or(0.0, |c| c.end_x() - slot.x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::registry::FactoryRegistry;
    use std::f32::consts::PI;

    fn engine() -> Engine {
        let mut registry = FactoryRegistry::new();
        registry.register::<SplineProcessor>();
        Engine::new(Rc::new(registry))
    }

    #[test]
    fn set_spline_time_round_trips() {
        let mut eng = engine();
        let handle = Handle::new_spline(&mut eng, SplineInit { y_range: Range::new(-1000.0, 1000.0), modular: false }).unwrap();
        handle.set_spline_time(12.5).unwrap();
        assert!((handle.spline_time() - 12.5).abs() < 1e-6);
    }

    #[test]
    fn modular_short_arc_blend_reaches_target() {
        let mut eng = engine();
        let handle = Handle::new_spline(
            &mut eng,
            SplineInit { y_range: Range::new(-PI, PI), modular: true },
        )
        .unwrap();

        // Prime the current value via a time=0 waypoint.
        handle
            .set_target(Target::current(3.041, 0.0).unwrap())
            .unwrap();
        eng.advance(0);

        handle
            .set_target(
                Target::new([
                    crate::target::Waypoint::current(3.041, 0.0),
                    crate::target::Waypoint::new(-3.041, 0.0, 10, Direction::Closest),
                ])
                .unwrap(),
            )
            .unwrap();

        eng.advance(10);
        let value = handle.value();
        assert!((value - (-3.041)).abs() < 1e-2, "got {value}");
    }

    #[test]
    fn repeating_curve_wraps_spline_time() {
        let mut eng = engine();
        let handle = Handle::new_spline(&mut eng, SplineInit { y_range: Range::new(-1000.0, 1000.0), modular: false }).unwrap();
        let curve = Rc::new(CubicCurve2::new(
            vec![
                CurveNode { x: 0.0, y: 0.0, dy_dx: 0.0 },
                CurveNode { x: 1000.0, y: 1.0, dy_dx: 0.0 },
            ],
            Range::new(-1000.0, 1000.0),
            false,
        ));
        handle
            .set_spline(
                curve,
                Playback { start_time: 250, repeat: true, blend_in_duration: 0, playback_rate: 1.0 },
            )
            .unwrap();

        eng.advance(500);
        assert!((handle.spline_time() - 750.0).abs() < 1e-4);
        eng.advance(500);
        assert!((handle.spline_time() - 250.0).abs() < 1e-4);
    }

    #[test]
    fn defragment_preserves_handle_values() {
        let mut eng = engine();
        let init = SplineInit { y_range: Range::new(-1000.0, 1000.0), modular: false };
        let mut handles: Vec<Handle<SplineProcessor>> = (0..4)
            .map(|_| {
                let h = Handle::new_spline(&mut eng, init).unwrap();
                h.set_target(Target::current(7.0, 0.0).unwrap()).unwrap();
                h
            })
            .collect();

        let dropped = handles.remove(1);
        drop(dropped);

        eng.advance(1);

        for h in &handles {
            assert!(h.valid());
            assert!((h.value() - 7.0).abs() < 1e-4);
        }
    }

    #[test]
    fn packed_vec3_lanes_chase_independent_targets() {
        let mut eng = engine();
        let init = SplineInit { y_range: Range::new(-1000.0, 1000.0), modular: false };
        let handle = Handle::new_splines(&mut eng, &[init, init, init]).unwrap();
        assert_eq!(handle.dimension(), 3);

        handle
            .set_targets(&[
                Target::current(1.0, 0.0).unwrap(),
                Target::current(2.0, 0.0).unwrap(),
                Target::current(3.0, 0.0).unwrap(),
            ])
            .unwrap();
        eng.advance(0);

        assert!((handle.value_at(0) - 1.0).abs() < 1e-4);
        assert!((handle.value_at(1) - 2.0).abs() < 1e-4);
        assert!((handle.value_at(2) - 3.0).abs() < 1e-4);
    }
}
