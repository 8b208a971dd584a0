//! Shared storage helper embedded by every concrete processor: pairs an
//! [`IndexAllocator`] with the processor's own parallel data array and the
//! handle back-pointer array, and implements the bijection invariant
//! (`processor.back_pointer[i].handle.index == i` for every live `i`) once
//! instead of once per processor.

use std::cell::Cell;
use std::rc::{Rc, Weak};

use crate::index::{Dimension, Index, IndexAllocator, INVALID_INDEX};

/// `T` is one processor's per-slot data (e.g. a spline's curve/x/range, or a
/// composer's op list). Stored as an ordinary `Vec<T>` (array-of-structs);
/// the rig processor additionally keeps its composer handles in an explicit
/// struct-of-arrays layout on top of this (see `processors/rig.rs`) since
/// that layout is named directly by the specification.
#[derive(Debug, Default)]
pub struct SlotTable<T> {
    allocator: IndexAllocator,
    data: Vec<T>,
    back_pointers: Vec<Option<Weak<Cell<Index>>>>,
}

impl<T: Default> SlotTable<T> {
    #[must_use]
    pub fn new() -> Self {
        SlotTable {
            allocator: IndexAllocator::new(),
            data: Vec::new(),
            back_pointers: Vec::new(),
        }
    }

    #[must_use]
    pub fn active_len(&self) -> usize {
        self.allocator.active_len()
    }

    #[must_use]
    pub fn valid_index(&self, first: Index) -> bool {
        self.allocator.valid_index(first)
    }

    /// First index of every currently active range, in ascending order.
    pub fn active_firsts(&self) -> impl Iterator<Item = Index> + '_ {
        self.allocator.active_ranges().iter().map(|(f, _)| *f)
    }

    /// `(first, width)` of every currently active range, in ascending order.
    /// Needed by processors that pack more than one slot per handle (§3
    /// "Dimension") to visit every lane, not just a range's first slot.
    pub fn active_ranges(&self) -> &[(Index, Dimension)] {
        self.allocator.active_ranges()
    }

    /// Allocates `width` slots, growing the backing arrays with `T::default()`
    /// if the allocator had to grow capacity, and resets the newly active
    /// range to `T::default()` (the allocator's `init_indices` callback).
    pub fn create(&mut self, width: Dimension) -> Index {
        let (first, grew) = self.allocator.alloc(width);
        if let Some(new_capacity) = grew {
            self.data.resize(new_capacity, T::default());
            self.back_pointers.resize_with(new_capacity, || None);
        }
        for offset in 0..width {
            self.data[first as usize + offset] = T::default();
        }
        first
    }

    /// Registers the handle's shared index cell as this slot's back-pointer.
    pub fn bind(&mut self, first: Index, cell: &Rc<Cell<Index>>) {
        self.back_pointers[first as usize] = Some(Rc::downgrade(cell));
    }

    pub fn get(&self, first: Index) -> &T {
        &self.data[first as usize]
    }

    pub fn get_mut(&mut self, first: Index) -> &mut T {
        &mut self.data[first as usize]
    }

    pub fn slice(&self, first: Index, width: Dimension) -> &[T] {
        &self.data[first as usize..first as usize + width]
    }

    pub fn slice_mut(&mut self, first: Index, width: Dimension) -> &mut [T] {
        &mut self.data[first as usize..first as usize + width]
    }

    /// Frees `[first, first + width)`. Callers that need to release
    /// processor-owned resources held by the slot (e.g. returning an inline
    /// curve to a pool) must do so before calling this, since it resets the
    /// slot to `T::default()` immediately.
    pub fn destroy(&mut self, first: Index, width: Dimension) {
        self.allocator.free(first);
        for offset in 0..width {
            self.data[first as usize + offset] = T::default();
            self.back_pointers[first as usize + offset] = None;
        }
    }

    /// Compacts active ranges toward index zero, copying slot data and
    /// repointing every still-live handle's index cell to match. Returns the
    /// number of ranges moved (for logging).
    pub fn defragment(&mut self) -> usize {
        let moves = self.allocator.defragment();
        for mv in &moves {
            let (src, dst, width) = (mv.src_first as usize, mv.dst_first as usize, mv.width);
            for offset in 0..width {
                self.data[dst + offset] = std::mem::take(&mut self.data[src + offset]);
                self.back_pointers[dst + offset] = self.back_pointers[src + offset].take();
            }
            if let Some(weak) = &self.back_pointers[dst] {
                if let Some(cell) = weak.upgrade() {
                    cell.set(mv.dst_first);
                }
            }
        }
        moves.len()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.allocator.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_bind_and_defragment_keep_back_pointer_in_sync() {
        let mut table: SlotTable<i32> = SlotTable::new();
        let mut cells = Vec::new();
        for v in 0..4 {
            let first = table.create(1);
            *table.get_mut(first) = v;
            let cell = Rc::new(Cell::new(first));
            table.bind(first, &cell);
            cells.push(cell);
        }

        table.destroy(cells[1].get(), 1);
        let moved = table.defragment();
        assert_eq!(moved, 1);

        // Handle 3's cell should now reflect its new index, and reading
        // through that new index returns its original data (3).
        let new_index = cells[3].get();
        assert_eq!(*table.get(new_index), 3);
        assert_eq!(table.active_len(), 3);
    }
}
