//! The factory registry: a process-local table of `(create)` functions
//! keyed by processor type, populated once by explicit registration calls
//! before any engine that needs those types is constructed.
//!
//! Design notes: the C++ source keeps this as implicit global state
//! populated by static initializers. Per the re-architecture notes this
//! crate instead builds the table explicitly and hands it to [`crate::engine::Engine::new`],
//! avoiding both a `static`/`lazy_static` and any order-of-initialization
//! hazard. Multiple engines may share one `Rc<FactoryRegistry>`.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::handle::{Processor, TypeTag};

/// A process-local table of processor factories, built once by the host
/// application before constructing the engines that will use it.
#[derive(Default)]
pub struct FactoryRegistry {
    factories: FxHashMap<TypeTag, Box<dyn Fn() -> Box<dyn Any>>>,
}

impl FactoryRegistry {
    #[must_use]
    pub fn new() -> Self {
        FactoryRegistry::default()
    }

    /// Registers `P` so `Engine::processor::<P>()` can create one on first use.
    pub fn register<P: Processor + Default + 'static>(&mut self) {
        let tag = TypeTag::of::<P>();
        self.factories
            .insert(tag, Box::new(|| Box::new(Rc::new(RefCell::new(P::default()))) as Box<dyn Any>));
    }

    #[must_use]
    pub fn is_registered(&self, tag: TypeTag) -> bool {
        self.factories.contains_key(&tag)
    }

    pub(crate) fn create(&self, tag: TypeTag) -> Option<Box<dyn Any>> {
        self.factories.get(&tag).map(|f| f())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::spline::SplineProcessor;

    #[test]
    fn registers_and_reports_known_type() {
        let mut registry = FactoryRegistry::new();
        assert!(!registry.is_registered(TypeTag::of::<SplineProcessor>()));
        registry.register::<SplineProcessor>();
        assert!(registry.is_registered(TypeTag::of::<SplineProcessor>()));
    }
}
