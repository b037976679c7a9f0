#![forbid(unsafe_code)]

//! The windowed list model: item records, offsets, and window math.
//!
//! One record per item carries its stable id, an explicit lifecycle state,
//! and per-item flags; lifecycle state lives here and only here, never
//! inferred from what the host happens to have attached. The offset tree
//! mirrors the current best-known height of every item (estimate until
//! measured), so total height and window bounds stay correct no matter
//! which items are real widgets right now.
//!
//! # Invariants
//!
//! 1. `records.len() == offsets.len()` at every public-method boundary.
//! 2. A window satisfies
//!    `overscan_start <= start <= end <= overscan_end < len`.
//! 3. Placeholders reserve exactly their cached/estimated size: mounting or
//!    unmounting an item never changes `total_height`.
//! 4. At most one record carries the active designation.

use tracing::debug;

use crate::estimate::ItemId;
use crate::fenwick::OffsetTree;
use crate::lifecycle::{ItemFlags, LifecycleState};

/// Mounting policy for the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowingMode {
    /// Mount every item eagerly. For short lists.
    None,
    /// Mount the viewport now, the rest progressively in idle time; never
    /// unmount.
    Defer,
    /// Strict windowing: only the window (plus lifecycle exceptions) stays
    /// attached.
    #[default]
    Full,
}

/// The mounted window around the viewport, all indices inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportWindow {
    /// First index kept attached (visible start widened by overscan).
    pub overscan_start: usize,
    /// First index intersecting the viewport.
    pub start: usize,
    /// Last index intersecting the viewport.
    pub end: usize,
    /// Last index kept attached.
    pub overscan_end: usize,
}

impl ViewportWindow {
    /// Whether `index` falls inside the attached (overscan-widened) range.
    #[inline]
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        index >= self.overscan_start && index <= self.overscan_end
    }
}

/// Per-item bookkeeping.
#[derive(Debug, Clone)]
pub(crate) struct ItemRecord {
    pub id: ItemId,
    pub state: LifecycleState,
    pub flags: ItemFlags,
}

/// List model: records, offsets, windowing configuration.
#[derive(Debug)]
pub struct ListModel {
    records: Vec<ItemRecord>,
    offsets: OffsetTree,
    mode: WindowingMode,
    overscan: usize,
    /// Index of the active item, kept in step with sequence edits.
    active: Option<usize>,
}

impl ListModel {
    #[must_use]
    pub fn new(mode: WindowingMode, overscan: usize) -> Self {
        Self {
            records: Vec::new(),
            offsets: OffsetTree::new(0),
            mode,
            overscan,
            active: None,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn mode(&self) -> WindowingMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: WindowingMode) {
        self.mode = mode;
    }

    #[must_use]
    pub fn overscan(&self) -> usize {
        self.overscan
    }

    pub fn set_overscan(&mut self, overscan: usize) {
        self.overscan = overscan;
    }

    /// Total pixel height of all items, mounted or not.
    #[must_use]
    pub fn total_height(&self) -> f64 {
        self.offsets.total()
    }

    /// Top edge of item `index`.
    #[must_use]
    pub fn offset_of(&self, index: usize) -> f64 {
        self.offsets.offset_of(index)
    }

    /// Current height of item `index` (estimate or measurement).
    #[must_use]
    pub fn height_of(&self, index: usize) -> f64 {
        self.offsets.get(index)
    }

    #[must_use]
    pub fn id_of(&self, index: usize) -> ItemId {
        self.records[index].id
    }

    #[must_use]
    pub fn state_of(&self, index: usize) -> LifecycleState {
        self.records[index].state
    }

    pub fn set_state(&mut self, index: usize, state: LifecycleState) {
        self.records[index].state = state;
    }

    #[must_use]
    pub fn flags_of(&self, index: usize) -> ItemFlags {
        self.records[index].flags
    }

    pub fn flags_mut(&mut self, index: usize) -> &mut ItemFlags {
        &mut self.records[index].flags
    }

    #[must_use]
    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    /// Designate `index` as the active item (or clear with `None`).
    ///
    /// The previous active record loses its flag; window membership decides
    /// its fate on the next reconcile pass.
    pub fn set_active(&mut self, index: Option<usize>) {
        if let Some(i) = index {
            assert!(i < self.records.len(), "active index {i} out of bounds");
        }
        if self.active == index {
            return;
        }
        if let Some(prev) = self.active
            && let Some(rec) = self.records.get_mut(prev)
        {
            rec.flags.remove(ItemFlags::ACTIVE);
        }
        self.active = index;
        if let Some(i) = index {
            self.records[i].flags.insert(ItemFlags::ACTIVE);
        }
    }

    /// Index of the item covering y-offset `y`, if the list is nonempty.
    #[must_use]
    pub fn index_at(&self, y: f64) -> Option<usize> {
        self.offsets.index_at(y)
    }

    /// Current index of the item with identity `id`. Linear; callers are
    /// batched paths (observer replay), not per-frame loops.
    #[must_use]
    pub fn index_of(&self, id: ItemId) -> Option<usize> {
        self.records.iter().position(|r| r.id == id)
    }

    /// First and last indices intersecting `[scroll_top, scroll_top +
    /// viewport_h)`, regardless of mode. `None` iff the list is empty.
    ///
    /// An item whose top edge sits exactly at the viewport bottom has zero
    /// overlap and is excluded.
    #[must_use]
    pub fn visible_range(&self, scroll_top: f64, viewport_h: f64) -> Option<(usize, usize)> {
        if self.records.is_empty() {
            return None;
        }
        let top = scroll_top.max(0.0);
        let first = self.offsets.index_at(top)?;
        let bottom = top + viewport_h.max(0.0);
        let mut last = self.offsets.index_at(bottom)?;
        while last > first && self.offsets.offset_of(last) >= bottom {
            last -= 1;
        }
        Some((first, last.max(first)))
    }

    /// The window for the given scroll position, `None` iff the list is
    /// empty.
    ///
    /// With windowing inactive (`None`/`Defer` modes) this is always the
    /// full range: nothing counts as outside.
    #[must_use]
    pub fn compute_window(&self, scroll_top: f64, viewport_h: f64) -> Option<ViewportWindow> {
        let len = self.records.len();
        if len == 0 {
            return None;
        }
        if self.mode != WindowingMode::Full {
            return Some(ViewportWindow {
                overscan_start: 0,
                start: 0,
                end: len - 1,
                overscan_end: len - 1,
            });
        }
        let (start, end) = self.visible_range(scroll_top, viewport_h)?;
        Some(ViewportWindow {
            overscan_start: start.saturating_sub(self.overscan),
            start,
            end,
            overscan_end: (end + self.overscan).min(len - 1),
        })
    }

    /// Append `items` in one pass, rebuilding offsets once.
    ///
    /// Bulk seeding path: appending n items this way costs one tree
    /// rebuild instead of n incremental inserts. Per-edit notifications
    /// still go through [`insert_item`](Self::insert_item).
    pub fn extend_items(&mut self, items: impl IntoIterator<Item = (ItemId, f64)>) {
        let mut heights: Vec<f64> = (0..self.records.len())
            .map(|i| self.offsets.get(i))
            .collect();
        for (id, px) in items {
            self.records.push(ItemRecord {
                id,
                state: LifecycleState::Unmounted,
                flags: ItemFlags::empty(),
            });
            heights.push(px);
        }
        self.offsets = OffsetTree::from_values(&heights);
    }

    /// Insert one item of height `px` before `index`.
    pub fn insert_item(&mut self, index: usize, id: ItemId, px: f64) {
        assert!(index <= self.records.len(), "insert index out of bounds");
        self.records.insert(
            index,
            ItemRecord {
                id,
                state: LifecycleState::Unmounted,
                flags: ItemFlags::empty(),
            },
        );
        self.offsets.insert(index, px);
        if let Some(a) = self.active
            && a >= index
        {
            self.active = Some(a + 1);
        }
    }

    /// Remove `count` items starting at `index`, returning their ids for
    /// cache cleanup.
    ///
    /// Clears the active designation when it pointed into the removed
    /// range.
    pub fn remove_items(&mut self, index: usize, count: usize) -> Vec<ItemId> {
        let end = index + count;
        assert!(end <= self.records.len(), "remove range out of bounds");
        let ids: Vec<ItemId> = self.records.drain(index..end).map(|r| r.id).collect();
        for _ in 0..count {
            self.offsets.remove(index);
        }
        match self.active {
            Some(a) if a >= index && a < end => {
                debug!(index = a, "active item removed");
                self.active = None;
            }
            Some(a) if a >= end => self.active = Some(a - count),
            _ => {}
        }
        ids
    }

    /// Move the item at `from` so it lands at `to`.
    pub fn move_item(&mut self, from: usize, to: usize) {
        let len = self.records.len();
        assert!(from < len && to < len, "move index out of bounds");
        if from == to {
            return;
        }
        let record = self.records.remove(from);
        self.records.insert(to, record);
        let px = self.offsets.get(from);
        self.offsets.remove(from);
        self.offsets.insert(to, px);
        self.active = self.active.map(|a| {
            if a == from {
                to
            } else if from < to && a > from && a <= to {
                a - 1
            } else if to < from && a >= to && a < from {
                a + 1
            } else {
                a
            }
        });
    }

    /// Swap the identity at `index` for a fresh one, resetting lifecycle.
    ///
    /// The position keeps its slot; the old id's cache entry is the
    /// caller's to evict. Height `px` is the new item's estimate.
    pub fn replace_item(&mut self, index: usize, id: ItemId, px: f64) {
        assert!(index < self.records.len(), "replace index out of bounds");
        let rec = &mut self.records[index];
        rec.id = id;
        rec.state = LifecycleState::Unmounted;
        rec.flags = ItemFlags::empty();
        if self.active == Some(index) {
            self.active = None;
        }
        self.offsets.set(index, px);
    }

    /// Write a new height for `index`; returns the scroll adjustment that
    /// keeps on-screen content still when the resized item sat entirely
    /// above the viewport top.
    pub fn resize_item(&mut self, index: usize, px: f64, scroll_top: f64) -> f64 {
        let old_bottom = self.offsets.prefix(index);
        let old = self.offsets.get(index);
        self.offsets.set(index, px);
        if old_bottom <= scroll_top {
            px - old
        } else {
            0.0
        }
    }

    /// First index at or after `from` whose record matches `pred`, for
    /// cursor-style walks.
    pub(crate) fn next_matching<F>(&self, from: usize, pred: F) -> Option<usize>
    where
        F: Fn(&ItemRecord) -> bool,
    {
        self.records
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, r)| pred(r))
            .map(|(i, _)| i)
    }
}
