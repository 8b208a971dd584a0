//! The overshoot processor (priority 1, §4.7): a brief, non-spline single
//! float simulation that chases a target value with bounded acceleration and
//! velocity, overshooting before settling — used for simple physical
//! responses (e.g. camera recoil) that don't need a full spline.
//!
//! Grounded on `src/motive/processor/overshoot_processor.cpp` and the
//! `OvershootInit`/`ModularInit`/`Settled1f` declarations in
//! `include/motive/init.h` from the retrieved upstream source.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::engine::Engine;
use crate::error::{MotiveError, Result};
use crate::handle::{Handle, Processor, SlotOwner, TypeTag};
use crate::index::{Dimension, Index};
use crate::range::Range;
use crate::slot_table::SlotTable;
use crate::time::MotiveTime;

/// Cutoff for deciding the simulation has settled on its target: both the
/// remaining distance and the velocity must be within these bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settled {
    pub max_difference: f32,
    pub max_velocity: f32,
}

impl Settled {
    #[must_use]
    pub fn settled(&self, difference: f32, velocity: f32) -> bool {
        difference.abs() <= self.max_difference && velocity.abs() <= self.max_velocity
    }
}

/// Tuning constants for one overshoot slot. Shared by reference across every
/// slot created from the same init record (mirrors the source keeping a copy
/// per slot, but the values never change after creation).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OvershootInit {
    pub y_range: Range,
    pub modular: bool,
    pub max_velocity: f32,
    pub max_delta: f32,
    pub accel_per_difference: f32,
    pub wrong_direction_multiplier: f32,
    pub max_delta_time: MotiveTime,
    pub at_target: Settled,
}

impl OvershootInit {
    fn normalize(&self, diff: f32) -> f32 {
        if self.modular {
            self.y_range.normalize(diff)
        } else {
            diff
        }
    }

    fn clamp_velocity(&self, velocity: f32) -> f32 {
        velocity.clamp(-self.max_velocity, self.max_velocity)
    }

    fn clamp_delta(&self, delta: f32) -> f32 {
        delta.clamp(-self.max_delta, self.max_delta)
    }
}

#[derive(Default)]
struct OvershootSlot {
    value: f32,
    velocity: f32,
    target_value: f32,
    init: Option<OvershootInit>,
}

impl OvershootSlot {
    fn init(&self) -> &OvershootInit {
        self.init.as_ref().expect("overshoot slot used before initialization")
    }

    fn difference(&self) -> f32 {
        self.init().normalize(self.target_value - self.value)
    }

    /// One sub-step of at most `init.max_delta_time`, per
    /// `OvershootMotiveProcessor::CalculateVelocity`/`CalculateValue`.
    fn step(&mut self, dt: MotiveTime) {
        let init = self.init();
        let diff = self.difference();
        let wrong_direction = self.velocity * diff < 0.0;
        let multiplier = if wrong_direction { init.wrong_direction_multiplier } else { 1.0 };
        let acceleration = diff * init.accel_per_difference * multiplier;
        let unclamped_velocity = self.velocity + dt as f32 * acceleration;
        let velocity = init.clamp_velocity(unclamped_velocity);

        self.velocity = if init.at_target.settled(diff, velocity) { 0.0 } else { velocity };

        self.value = if self.velocity == 0.0 {
            self.target_value
        } else {
            let delta = init.clamp_delta(dt as f32 * self.velocity);
            let unclamped_value = init.normalize(self.value + delta);
            self.y_range_clamp(unclamped_value)
        };
    }

    fn y_range_clamp(&self, value: f32) -> f32 {
        let range = self.init().y_range;
        value.clamp(range.start, range.end)
    }
}

/// Drives any number of independent chase-the-target simulations.
#[derive(Default)]
pub struct OvershootProcessor {
    table: SlotTable<OvershootSlot>,
}

impl OvershootProcessor {
    fn create_slot(&mut self, init: OvershootInit, start_value: f32, start_velocity: f32) -> Index {
        let first = self.table.create(1);
        let slot = self.table.get_mut(first);
        slot.value = start_value;
        slot.velocity = start_velocity;
        slot.target_value = start_value;
        slot.init = Some(init);
        first
    }
}

impl SlotOwner for OvershootProcessor {
    fn destroy_slot(&mut self, first: Index, width: Dimension) {
        self.table.destroy(first, width);
    }
}

impl Processor for OvershootProcessor {
    fn priority(&self) -> i32 {
        1
    }

    fn type_tag(&self) -> TypeTag {
        TypeTag::of::<OvershootProcessor>()
    }

    fn advance(&mut self, dt: MotiveTime) {
        let moved = self.table.defragment();
        if moved > 0 {
            log::debug!("overshoot processor defragmented {moved} range(s)");
        }

        for first in self.table.active_firsts().collect::<Vec<_>>() {
            let slot = self.table.get_mut(first);
            let max_step = slot.init().max_delta_time.max(1);
            let mut remaining = dt;
            while remaining > 0 {
                let step = remaining.min(max_step);
                slot.step(step);
                remaining -= step;
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

impl Handle<OvershootProcessor> {
    pub fn new_overshoot(engine: &mut Engine, init: OvershootInit, start_value: f32, start_velocity: f32) -> Result<Self> {
        let processor = engine.processor::<OvershootProcessor>()?;
        let first = processor.borrow_mut().create_slot(init, start_value, start_velocity);
        let cell = Rc::new(Cell::new(first));
        processor.borrow_mut().table.bind(first, &cell);
        Ok(Handle::from_parts(Rc::downgrade(&processor), cell, 1))
    }

    fn processor_or_panic(&self) -> Rc<RefCell<OvershootProcessor>> {
        self.processor().expect("accessed a detached overshoot handle")
    }

    fn processor_or_err(&self) -> Result<Rc<RefCell<OvershootProcessor>>> {
        self.processor().ok_or(MotiveError::DetachedHandle)
    }

    #[must_use]
    pub fn value(&self) -> f32 {
        let p = self.processor_or_panic();
        let p = p.borrow();
        p.table.get(self.index()).value
    }

    #[must_use]
    pub fn velocity(&self) -> f32 {
        let p = self.processor_or_panic();
        let p = p.borrow();
        p.table.get(self.index()).velocity
    }

    #[must_use]
    pub fn target_value(&self) -> f32 {
        let p = self.processor_or_panic();
        let p = p.borrow();
        p.table.get(self.index()).target_value
    }

    #[must_use]
    pub fn difference(&self) -> f32 {
        let p = self.processor_or_panic();
        let p = p.borrow();
        p.table.get(self.index()).difference()
    }

    #[must_use]
    pub fn settled(&self) -> bool {
        let p = self.processor_or_panic();
        let p = p.borrow();
        let slot = p.table.get(self.index());
        slot.init().at_target.settled(slot.difference(), slot.velocity)
    }

    /// Sets the current value/velocity directly (`time == 0` case of
    /// `SetTargets`).
    pub fn set_value(&self, value: f32, velocity: f32) -> Result<()> {
        let p = self.processor_or_err()?;
        let mut p = p.borrow_mut();
        let slot = p.table.get_mut(self.index());
        slot.value = value;
        slot.velocity = velocity;
        Ok(())
    }

    /// Sets the target the simulation chases.
    pub fn set_target_value(&self, target_value: f32) -> Result<()> {
        let p = self.processor_or_err()?;
        let mut p = p.borrow_mut();
        p.table.get_mut(self.index()).target_value = target_value;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FactoryRegistry;

    fn engine_with_overshoot() -> Engine {
        let mut registry = FactoryRegistry::new();
        registry.register::<OvershootProcessor>();
        Engine::new(Rc::new(registry))
    }

    fn basic_init() -> OvershootInit {
        OvershootInit {
            y_range: Range::new(-100.0, 100.0),
            modular: false,
            max_velocity: 10.0,
            max_delta: 10.0,
            accel_per_difference: 0.5,
            wrong_direction_multiplier: 2.0,
            max_delta_time: 1,
            at_target: Settled { max_difference: 0.01, max_velocity: 0.01 },
        }
    }

    #[test]
    fn chases_target_and_eventually_settles() {
        let mut eng = engine_with_overshoot();
        let handle = Handle::new_overshoot(&mut eng, basic_init(), 0.0, 0.0).unwrap();
        handle.set_target_value(5.0).unwrap();

        for _ in 0..500 {
            eng.advance(1);
        }

        assert!(handle.settled(), "expected simulation to settle within 500 ticks");
        assert!((handle.value() - 5.0).abs() < 0.1);
        assert_eq!(handle.velocity(), 0.0);
    }

    #[test]
    fn velocity_never_exceeds_max() {
        let mut eng = engine_with_overshoot();
        let handle = Handle::new_overshoot(&mut eng, basic_init(), 0.0, 0.0).unwrap();
        handle.set_target_value(1000.0).unwrap();

        for _ in 0..50 {
            eng.advance(1);
            assert!(handle.velocity().abs() <= 10.0 + 1e-4);
        }
    }
}
