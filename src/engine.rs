//! The engine: owns the set of processors, dispatches `advance` in
//! dependency order, and brokers lazy processor creation.
//!
//! Grounded on the teacher's `engine.rs` for overall shape (a thin owning
//! struct with an `advance(dt)` entry point and `#[must_use]` accessors) and
//! on `include/motive/engine.h`/`engine.cpp` from the retrieved upstream
//! source for the processor-registry semantics themselves (a type-keyed map
//! plus a priority-sorted dispatch list, `RegisterProcessorFactory` /
//! `ProcessorSet` / `ProcessorMap` there).

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::error::{MotiveError, Result};
use crate::handle::{Processor, TypeTag};
use crate::registry::FactoryRegistry;
use crate::time::MotiveTime;

/// Owns every processor it has lazily created and dispatches `advance` to
/// them in ascending priority order.
///
/// # Architecture
///
/// - [`Engine::processor`] returns the (possibly newly created)
///   `Rc<RefCell<P>>` for a concrete processor type, looking it up by
///   [`TypeTag`] and creating it via the engine's [`FactoryRegistry`] on
///   first use.
/// - [`Engine::advance`] walks processors in priority order (spline=0,
///   overshoot=1, matrix/SQT composer=2, rig=3) so a processor reading
///   another's output always runs after it.
/// - [`Engine::reset`] drops every processor; every handle still held by the
///   caller observes `valid() == false` afterward, since handles only ever
///   hold a `Weak` reference to their processor.
///
/// An `Engine` is intentionally neither `Send` nor `Sync` — it is built
/// entirely from `Rc`/`RefCell`, so the compiler enforces §5's "all calls on
/// an engine must happen from a single thread" instead of merely documenting
/// it. Separate engines on separate threads are unaffected as long as no
/// handle crosses between them.
pub struct Engine {
    registry: Rc<FactoryRegistry>,
    typed: FxHashMap<TypeTag, Box<dyn Any>>,
    dispatch: Vec<Rc<RefCell<dyn Processor>>>,
}

impl Engine {
    #[must_use]
    pub fn new(registry: Rc<FactoryRegistry>) -> Self {
        Engine {
            registry,
            typed: FxHashMap::default(),
            dispatch: Vec::new(),
        }
    }

    /// Returns this engine's processor of type `P`, creating it via the
    /// registered factory on first use. Idempotent: subsequent calls return
    /// the same instance.
    pub fn processor<P: Processor + 'static>(&mut self) -> Result<Rc<RefCell<P>>> {
        let tag = TypeTag::of::<P>();
        if let Some(existing) = self.typed.get(&tag) {
            return Ok(existing
                .downcast_ref::<Rc<RefCell<P>>>()
                .expect("TypeTag uniquely identifies P")
                .clone());
        }

        let boxed = self.registry.create(tag).ok_or(MotiveError::UnknownProcessor(tag))?;
        let rc = *boxed
            .downcast::<Rc<RefCell<P>>>()
            .expect("factory registered under this TypeTag must produce Rc<RefCell<P>>");

        self.typed.insert(tag, Box::new(rc.clone()));
        let dyn_rc: Rc<RefCell<dyn Processor>> = rc.clone();
        let priority = dyn_rc.borrow().priority();
        let pos = self
            .dispatch
            .partition_point(|p| p.borrow().priority() <= priority);
        self.dispatch.insert(pos, dyn_rc);

        Ok(rc)
    }

    /// Advances every processor, in ascending priority order, by `dt`.
    pub fn advance(&mut self, dt: MotiveTime) {
        for processor in &self.dispatch {
            processor.borrow_mut().advance(dt);
        }
    }

    /// Destroys every processor. Every handle created against this engine
    /// becomes detached.
    pub fn reset(&mut self) {
        self.typed.clear();
        self.dispatch.clear();
    }

    #[must_use]
    pub fn registry(&self) -> &Rc<FactoryRegistry> {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::spline::SplineProcessor;

    fn engine_with_splines() -> Engine {
        let mut registry = FactoryRegistry::new();
        registry.register::<SplineProcessor>();
        Engine::new(Rc::new(registry))
    }

    #[test]
    fn processor_is_created_lazily_and_reused() {
        let mut engine = engine_with_splines();
        let a = engine.processor::<SplineProcessor>().unwrap();
        let b = engine.processor::<SplineProcessor>().unwrap();
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn unregistered_processor_is_an_error() {
        let mut engine = Engine::new(Rc::new(FactoryRegistry::new()));
        let result = engine.processor::<SplineProcessor>();
        assert!(matches!(result, Err(MotiveError::UnknownProcessor(_))));
    }

    #[test]
    fn advance_runs_processors_in_priority_order() {
        use crate::processors::composer::ComposerProcessor;
        use crate::processors::rig::RigProcessor;

        let mut registry = FactoryRegistry::new();
        registry.register::<SplineProcessor>();
        registry.register::<ComposerProcessor>();
        registry.register::<RigProcessor>();
        let mut engine = Engine::new(Rc::new(registry));

        // Request out of priority order; dispatch must still sort by priority.
        engine.processor::<RigProcessor>().unwrap();
        engine.processor::<SplineProcessor>().unwrap();
        engine.processor::<ComposerProcessor>().unwrap();

        let priorities: Vec<i32> = engine.dispatch.iter().map(|p| p.borrow().priority()).collect();
        let mut sorted = priorities.clone();
        sorted.sort_unstable();
        assert_eq!(priorities, sorted);
    }

    #[test]
    fn reset_detaches_outstanding_handles() {
        use crate::handle::Handle;

        let mut engine = engine_with_splines();
        let processor = engine.processor::<SplineProcessor>().unwrap();
        let handle: Handle<SplineProcessor> = Handle::default();
        let _ = &handle;
        let weak = Rc::downgrade(&processor);
        drop(processor);
        engine.reset();
        assert!(weak.upgrade().is_none());
    }
}
