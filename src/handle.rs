//! The handle abstraction: an exclusive, non-copyable, movable capability to
//! drive one value in one processor, and the minimal trait a processor
//! exposes to the engine so it can be dispatched without knowing its
//! concrete type.
//!
//! Design notes (re-architecture from the virtual-dispatch / raw-back-pointer
//! C++ source, see `DESIGN.md`): rather than a raw `Processor*` back-pointer
//! into handle memory, a handle's index lives in a heap-allocated `Cell`
//! shared (`Rc`) with the handle and weakly referenced (`Weak`) by the
//! processor's [`crate::slot_table::SlotTable`]. Moving a `Handle` is then an
//! ordinary Rust move of its fields — the `Cell` never relocates, so there is
//! no "inform the processor of the new address" step to get wrong. The
//! processor is referenced the same way: a `Weak<RefCell<P>>` that fails to
//! upgrade once the engine drops its `Rc<RefCell<P>>` (on `reset()`), which
//! is exactly "detached" per the data model.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::index::{Dimension, Index, INVALID_INDEX};
use crate::time::MotiveTime;

/// A processor's stable identity. Built from `TypeId` (an address-stable,
/// process-wide identifier) plus the type's name for diagnostics — the two
/// things the data model says "serve equivalently" as a type tag.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeTag {
    id: std::any::TypeId,
    name: &'static str,
}

impl TypeTag {
    #[must_use]
    pub fn of<P: 'static>() -> Self {
        TypeTag {
            id: std::any::TypeId::of::<P>(),
            name: std::any::type_name::<P>(),
        }
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// The capability set the engine needs to dispatch a processor without
/// knowing its concrete type: advance it, sort it by priority, and identify
/// it. Allocation bookkeeping (`init_indices`/`remove_indices`/`move_indices`/
/// `set_num_indices` from the design notes) is handled internally by each
/// concrete processor's own `create`/`destroy` methods built on
/// [`crate::slot_table::SlotTable`], rather than surfaced here — the engine
/// never needs to trigger them directly.
pub trait Processor: Any {
    /// Lower runs first. Current priorities: spline=0, overshoot=1, matrix/SQT=2, rig=3.
    fn priority(&self) -> i32;
    fn type_tag(&self) -> TypeTag;
    /// Compacts this processor's storage, then advances every active slot by `dt`.
    fn advance(&mut self, dt: MotiveTime);

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Lets a generic [`Handle<P>`] free its slot on drop without the `Handle`
/// type needing to know `P`'s slot data layout.
pub trait SlotOwner {
    fn destroy_slot(&mut self, first: Index, width: Dimension);
}

/// An exclusive, non-copyable, movable reference to one slot in one
/// processor.
///
/// A default-constructed `Handle` is detached: [`Handle::valid`] is `false`
/// and every other accessor on it is a caller error (the processor-specific
/// accessor methods on each concrete `Handle<P>` document this per §7).
pub struct Handle<P: SlotOwner> {
    processor: Weak<RefCell<P>>,
    slot: Rc<Cell<Index>>,
    dimension: Dimension,
}

impl<P: SlotOwner> Default for Handle<P> {
    fn default() -> Self {
        Handle {
            processor: Weak::new(),
            slot: Rc::new(Cell::new(INVALID_INDEX)),
            dimension: 0,
        }
    }
}

impl<P: SlotOwner> fmt::Debug for Handle<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("index", &self.slot.get())
            .field("dimension", &self.dimension)
            .field("valid", &self.valid())
            .finish()
    }
}

impl<P: SlotOwner> Handle<P> {
    /// Wraps an already-allocated slot. Used by each processor's own typed
    /// constructor after it calls its `create` method and registers the
    /// back-pointer cell with its `SlotTable`.
    pub(crate) fn from_parts(processor: Weak<RefCell<P>>, slot: Rc<Cell<Index>>, dimension: Dimension) -> Self {
        Handle { processor, slot, dimension }
    }

    /// `true` if the owning processor is still alive and this handle has not
    /// been default-constructed or moved out of via [`std::mem::take`].
    #[must_use]
    pub fn valid(&self) -> bool {
        self.slot.get() != INVALID_INDEX && self.processor.strong_count() > 0
    }

    #[must_use]
    pub fn index(&self) -> Index {
        self.slot.get()
    }

    #[must_use]
    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    pub(crate) fn processor(&self) -> Option<Rc<RefCell<P>>> {
        self.processor.upgrade()
    }
}

impl<P: SlotOwner + 'static> Drop for Handle<P> {
    fn drop(&mut self) {
        let index = self.slot.get();
        if index == INVALID_INDEX {
            return;
        }
        if let Some(processor) = self.processor.upgrade() {
            processor.borrow_mut().destroy_slot(index, self.dimension);
        }
    }
}
