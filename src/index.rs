//! Dense, defragmenting index allocation.
//!
//! Hands out variable-width ranges to processors so per-type state can live
//! in flat parallel arrays. Recycles freed ranges; `defragment` compacts
//! active ranges toward index zero, reporting the moves it made so the owner
//! can keep its own arrays (and handle back-pointers) in step.

/// A slot index into a processor's parallel arrays. Dense, reused on free,
/// and may be relocated by [`IndexAllocator::defragment`].
pub type Index = i32;

/// Sentinel meaning "no slot" — a detached handle's index.
pub const INVALID_INDEX: Index = -1;

/// Number of consecutive slots one handle occupies.
pub type Dimension = usize;

/// One relocation reported by [`IndexAllocator::defragment`]. The owner must
/// copy its per-slot data from `[src_first, src_first + width)` to
/// `[dst_first, dst_first + width)` and update any back-pointer registered at
/// `src_first` to point at `dst_first`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    pub src_first: Index,
    pub width: Dimension,
    pub dst_first: Index,
}

/// Allocates and recycles dense index ranges for one processor.
///
/// Maintains two sorted, non-overlapping range lists — `active` and `free`
/// — that together partition `[0, capacity)`.
#[derive(Debug, Default, Clone)]
pub struct IndexAllocator {
    capacity: usize,
    active: Vec<(Index, Dimension)>,
    free: Vec<(Index, Dimension)>,
}

impl IndexAllocator {
    #[must_use]
    pub fn new() -> Self {
        IndexAllocator::default()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn active_len(&self) -> usize {
        self.active.iter().map(|(_, w)| *w).sum()
    }

    /// Allocates `width` consecutive indices. Returns the first index and,
    /// if the backing capacity had to grow, the new total capacity (the
    /// `set_num_indices` callback of the data model).
    pub fn alloc(&mut self, width: Dimension) -> (Index, Option<usize>) {
        assert!(width > 0, "dimension must be positive");

        if let Some(pos) = self.free.iter().position(|(_, w)| *w >= width) {
            let (start, free_width) = self.free[pos];
            let remaining = free_width - width;
            if remaining == 0 {
                self.free.remove(pos);
            } else {
                self.free[pos] = (start + width as Index, remaining);
            }
            self.insert_active(start, width);
            return (start, None);
        }

        let start = self.capacity as Index;
        self.capacity += width;
        self.insert_active(start, width);
        (start, Some(self.capacity))
    }

    /// Marks the range starting at `first` inactive and returns its width.
    /// Panics if `first` is not the start of a currently active range.
    pub fn free(&mut self, first: Index) -> Dimension {
        let pos = self
            .active
            .binary_search_by_key(&first, |(f, _)| *f)
            .expect("free() called on an index that is not an active range start");
        let (_, width) = self.active.remove(pos);
        self.release_to_free_list(first, width);
        width
    }

    #[must_use]
    pub fn valid_index(&self, first: Index) -> bool {
        self.active.binary_search_by_key(&first, |(f, _)| *f).is_ok()
    }

    #[must_use]
    pub fn active_ranges(&self) -> &[(Index, Dimension)] {
        &self.active
    }

    /// Compacts active ranges toward index zero. Processes ranges from the
    /// highest `first` down; each range moves into the lowest free gap that
    /// both precedes it and fits it. Returns the moves performed, in the
    /// order they must be applied (the caller may apply them directly since
    /// source and destination ranges never overlap).
    pub fn defragment(&mut self) -> Vec<Move> {
        let mut moves = Vec::new();
        let mut order: Vec<usize> = (0..self.active.len()).collect();
        order.sort_by_key(|&i| std::cmp::Reverse(self.active[i].0));

        for idx in order {
            let (first, width) = self.active[idx];
            let Some(pos) = self
                .free
                .iter()
                .position(|&(start, w)| start < first && w >= width)
            else {
                continue;
            };
            let (start, free_width) = self.free[pos];
            let remaining = free_width - width;
            if remaining == 0 {
                self.free.remove(pos);
            } else {
                self.free[pos] = (start + width as Index, remaining);
            }
            self.active[idx] = (start, width);
            self.release_to_free_list(first, width);
            moves.push(Move {
                src_first: first,
                width,
                dst_first: start,
            });
        }

        self.active.sort_by_key(|(f, _)| *f);
        moves
    }

    fn insert_active(&mut self, first: Index, width: Dimension) {
        let pos = self
            .active
            .binary_search_by_key(&first, |(f, _)| *f)
            .unwrap_or_else(|e| e);
        self.active.insert(pos, (first, width));
    }

    fn release_to_free_list(&mut self, first: Index, width: Dimension) {
        let pos = self
            .free
            .binary_search_by_key(&first, |(f, _)| *f)
            .unwrap_or_else(|e| e);
        self.free.insert(pos, (first, width));

        // Coalesce with the following neighbor first so the index of `pos`
        // stays valid, then with the preceding one.
        if pos + 1 < self.free.len() {
            let (next_first, next_width) = self.free[pos + 1];
            let (cur_first, cur_width) = self.free[pos];
            if cur_first + cur_width as Index == next_first {
                self.free[pos] = (cur_first, cur_width + next_width);
                self.free.remove(pos + 1);
            }
        }
        if pos > 0 {
            let (prev_first, prev_width) = self.free[pos - 1];
            let (cur_first, cur_width) = self.free[pos];
            if prev_first + prev_width as Index == cur_first {
                self.free[pos - 1] = (prev_first, prev_width + cur_width);
                self.free.remove(pos);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_grows_capacity_when_no_free_space() {
        let mut a = IndexAllocator::new();
        let (first, grew) = a.alloc(1);
        assert_eq!(first, 0);
        assert_eq!(grew, Some(1));
        let (first2, grew2) = a.alloc(1);
        assert_eq!(first2, 1);
        assert_eq!(grew2, Some(2));
    }

    #[test]
    fn free_then_alloc_reuses_slot() {
        let mut a = IndexAllocator::new();
        let (f0, _) = a.alloc(1);
        let (_f1, _) = a.alloc(1);
        a.free(f0);
        let (reused, grew) = a.alloc(1);
        assert_eq!(reused, f0);
        assert_eq!(grew, None);
    }

    #[test]
    fn defragment_compacts_after_middle_free() {
        let mut a = IndexAllocator::new();
        let indices: Vec<Index> = (0..4).map(|_| a.alloc(1).0).collect();
        a.free(indices[1]);
        assert_eq!(a.active_len(), 3);

        let moves = a.defragment();
        // The highest active index (3) should have moved into the gap left by index 1.
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0], Move { src_first: 3, width: 1, dst_first: 1 });
        assert_eq!(a.active_len(), 3);
        assert!(a.valid_index(0));
        assert!(a.valid_index(1));
        assert!(a.valid_index(2));
        assert!(!a.valid_index(3));
    }

    #[test]
    fn valid_index_reflects_active_ranges_only() {
        let mut a = IndexAllocator::new();
        let (first, _) = a.alloc(3);
        assert!(a.valid_index(first));
        assert!(!a.valid_index(first + 1), "siblings are not range starts");
        a.free(first);
        assert!(!a.valid_index(first));
    }
}
