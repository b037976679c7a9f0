#![forbid(unsafe_code)]

//! Index of currently attached items, sorted by list index.
//!
//! The engine owns this array outright: insertion slots come from binary
//! search here, never from scanning the host's child list. Slot `k` for a
//! new mount of list index `i` is the number of attached entries with a
//! smaller index, so attached children always read in ascending list
//! order.
//!
//! # Invariants
//!
//! 1. Entries are strictly ascending by `index` (one entry per index).
//! 2. Every entry's handle refers to a live host widget.
//! 3. List edits go through [`PositionIndex::apply_insert`],
//!    [`PositionIndex::apply_remove`], [`PositionIndex::apply_move`], which
//!    preserve (1) without a full rebuild.

use std::fmt;

/// An attached item: its current list index and the host handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountedEntry<H> {
    pub index: usize,
    pub handle: H,
}

/// Sorted index of attached items.
#[derive(Debug, Clone, Default)]
pub struct PositionIndex<H> {
    entries: Vec<MountedEntry<H>>,
}

impl<H: Copy + Eq + fmt::Debug> PositionIndex<H> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Slot among attached children where list index `index` belongs:
    /// the count of attached entries with a smaller index. O(log m).
    #[must_use]
    pub fn insertion_point(&self, index: usize) -> usize {
        self.entries.partition_point(|e| e.index < index)
    }

    /// Handle of the attached item at `index`, if any. O(log m).
    #[must_use]
    pub fn handle_of(&self, index: usize) -> Option<H> {
        let at = self.insertion_point(index);
        self.entries
            .get(at)
            .filter(|e| e.index == index)
            .map(|e| e.handle)
    }

    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        self.handle_of(index).is_some()
    }

    /// Record a new mount. O(m) worst case for the shift.
    ///
    /// # Panics
    /// Panics if `index` already has an entry.
    pub fn insert(&mut self, index: usize, handle: H) {
        let at = self.insertion_point(index);
        assert!(
            self.entries.get(at).is_none_or(|e| e.index != index),
            "index {index} already attached"
        );
        self.entries.insert(at, MountedEntry { index, handle });
        self.debug_check_sorted();
    }

    /// Drop the entry for an unmounted item, returning its handle.
    pub fn remove(&mut self, index: usize) -> Option<H> {
        let at = self.insertion_point(index);
        if self.entries.get(at).is_some_and(|e| e.index == index) {
            let entry = self.entries.remove(at);
            Some(entry.handle)
        } else {
            None
        }
    }

    /// Attached entries in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = MountedEntry<H>> + '_ {
        self.entries.iter().copied()
    }

    /// Shift entries for `count` items inserted before `at`.
    pub fn apply_insert(&mut self, at: usize, count: usize) {
        for e in &mut self.entries {
            if e.index >= at {
                e.index += count;
            }
        }
        self.debug_check_sorted();
    }

    /// Shift entries for `count` items removed starting at `at`.
    ///
    /// Entries inside the removed range leave the index; their handles are
    /// returned so the caller can unmount them.
    pub fn apply_remove(&mut self, at: usize, count: usize) -> Vec<H> {
        let mut dropped = Vec::new();
        self.entries.retain_mut(|e| {
            if e.index < at {
                true
            } else if e.index < at + count {
                dropped.push(e.handle);
                false
            } else {
                e.index -= count;
                true
            }
        });
        self.debug_check_sorted();
        dropped
    }

    /// Renumber entries for one item moved from `from` to `to`.
    ///
    /// The affected span is adjusted in place and the moved entry (when
    /// attached) is rotated to its new slot, so ordering never transiently
    /// breaks and nothing outside `[min(from,to), max(from,to)]` is
    /// touched.
    pub fn apply_move(&mut self, from: usize, to: usize) {
        if from == to {
            return;
        }
        let lo = from.min(to);
        let hi = from.max(to);
        let start = self.entries.partition_point(|e| e.index < lo);
        let end = self.entries.partition_point(|e| e.index <= hi);
        let span = &mut self.entries[start..end];
        if span.is_empty() {
            return;
        }

        if from < to {
            // Moved entry, when present, holds the smallest index in the
            // span; everything after it shifts down one.
            let moved = span.first().is_some_and(|e| e.index == from);
            for e in span.iter_mut() {
                if e.index > from {
                    e.index -= 1;
                }
            }
            if moved {
                span[0].index = to;
                span.rotate_left(1);
            }
        } else {
            let moved = span.last().is_some_and(|e| e.index == from);
            for e in span.iter_mut() {
                if e.index < from {
                    e.index += 1;
                }
            }
            if moved {
                let last = span.len() - 1;
                span[last].index = to;
                span.rotate_right(1);
            }
        }
        self.debug_check_sorted();
    }

    /// Drop every entry, returning the handles for unmounting.
    pub fn take_all(&mut self) -> Vec<H> {
        self.entries.drain(..).map(|e| e.handle).collect()
    }

    fn debug_check_sorted(&self) {
        debug_assert!(
            self.entries.windows(2).all(|w| w[0].index < w[1].index),
            "position index lost strict ordering: {:?}",
            self.entries
        );
    }
}
