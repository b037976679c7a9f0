//! In-crate mock host for unit tests.
//!
//! Tracks every host call so tests can assert attach order, visibility
//! toggles, placement, and exactly-once mount/measure discipline. The
//! richer simulated host with editable item state lives in the harness
//! crate and backs the integration tests.

use std::collections::{HashMap, HashSet};

use crate::estimate::{ContentShape, ItemId};
use crate::host::{AttachError, AttachErrorKind, ListHost};

pub(crate) struct TestHost {
    ids: Vec<ItemId>,
    shapes: Vec<Option<ContentShape>>,
    heights: Vec<f64>,
    next_handle: u64,
    /// Attached handles in slot order.
    children: Vec<u64>,
    index_by_handle: HashMap<u64, usize>,
    height_by_handle: HashMap<u64, f64>,
    placements: HashMap<u64, f64>,
    hidden: HashSet<u64>,
    suppressed: HashSet<u64>,
    /// index -> remaining forced failures.
    fail_at: HashMap<usize, u32>,
    fresh_rows: u64,
    pub mount_log: Vec<usize>,
    pub measure_log: Vec<usize>,
    pub unmount_count: usize,
}

impl TestHost {
    /// `n` one-line items measuring `px` each.
    pub fn uniform(n: usize, px: f64) -> Self {
        Self {
            ids: (0..n).map(|i| ItemId(1000 + i as u64)).collect(),
            shapes: vec![Some(ContentShape::single_line()); n],
            heights: vec![px; n],
            next_handle: 1,
            children: Vec::new(),
            index_by_handle: HashMap::new(),
            height_by_handle: HashMap::new(),
            placements: HashMap::new(),
            hidden: HashSet::new(),
            suppressed: HashSet::new(),
            fail_at: HashMap::new(),
            fresh_rows: 0,
            mount_log: Vec::new(),
            measure_log: Vec::new(),
            unmount_count: 0,
        }
    }

    /// Insert `count` fresh one-line rows of height `px` before `index`.
    /// Ids start at 9000, clear of any constructor-assigned range.
    /// `fail_mount_at` indices are not shifted.
    pub fn insert_items(&mut self, index: usize, count: usize, px: f64) {
        for k in 0..count {
            let id = ItemId(9000 + self.fresh_rows);
            self.fresh_rows += 1;
            self.ids.insert(index + k, id);
            self.shapes.insert(index + k, Some(ContentShape::single_line()));
            self.heights.insert(index + k, px);
        }
        for idx in self.index_by_handle.values_mut() {
            if *idx >= index {
                *idx += count;
            }
        }
    }

    pub fn id_of(&self, index: usize) -> ItemId {
        self.ids[index]
    }

    pub fn set_item_height(&mut self, index: usize, px: f64) {
        self.heights[index] = px;
    }

    pub fn set_shape(&mut self, index: usize, shape: Option<ContentShape>) {
        self.shapes[index] = shape;
    }

    /// Force the next `times` mount attempts for `index` to fail.
    pub fn fail_mount_at(&mut self, index: usize, times: u32) {
        self.fail_at.insert(index, times);
    }

    pub fn attached_count(&self) -> usize {
        self.children.len()
    }

    pub fn is_soft_hidden(&self, handle: u64) -> bool {
        self.hidden.contains(&handle)
    }

    pub fn is_suppressed(&self, handle: u64) -> bool {
        self.suppressed.contains(&handle)
    }

    pub fn placement_of(&self, handle: u64) -> Option<f64> {
        self.placements.get(&handle).copied()
    }

    /// Attached children must read in ascending mount-time index order.
    /// Only meaningful while the test performs no sequence edits.
    pub fn assert_children_sorted(&self) {
        let order: Vec<usize> = self
            .children
            .iter()
            .map(|h| self.index_by_handle[h])
            .collect();
        assert!(
            order.windows(2).all(|w| w[0] < w[1]),
            "attach order broken: {order:?}"
        );
    }
}

impl ListHost for TestHost {
    type Handle = u64;

    fn item_count(&self) -> usize {
        self.ids.len()
    }

    fn item_id(&self, index: usize) -> ItemId {
        self.ids[index]
    }

    fn content_shape(&self, index: usize) -> Option<ContentShape> {
        self.shapes[index]
    }

    fn mount(&mut self, index: usize, slot: usize) -> Result<u64, AttachError> {
        if let Some(remaining) = self.fail_at.get_mut(&index)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(AttachError {
                index,
                id: self.ids[index],
                kind: AttachErrorKind::WidgetConstruction,
            });
        }
        assert!(slot <= self.children.len(), "slot {slot} beyond child list");
        let handle = self.next_handle;
        self.next_handle += 1;
        self.children.insert(slot, handle);
        self.index_by_handle.insert(handle, index);
        self.height_by_handle.insert(handle, self.heights[index]);
        self.mount_log.push(index);
        Ok(handle)
    }

    fn unmount(&mut self, handle: u64) {
        let had = self.index_by_handle.remove(&handle).is_some();
        assert!(had, "unmount of unknown handle {handle}");
        self.children.retain(|&h| h != handle);
        self.height_by_handle.remove(&handle);
        self.placements.remove(&handle);
        self.hidden.remove(&handle);
        self.suppressed.remove(&handle);
        self.unmount_count += 1;
    }

    fn place(&mut self, handle: u64, offset_px: f64) {
        assert!(
            self.index_by_handle.contains_key(&handle),
            "place on unknown handle {handle}"
        );
        self.placements.insert(handle, offset_px);
    }

    fn set_soft_hidden(&mut self, handle: u64, hidden: bool) {
        if hidden {
            self.hidden.insert(handle);
        } else {
            self.hidden.remove(&handle);
        }
    }

    fn set_suppressed(&mut self, handle: u64, suppressed: bool) {
        if suppressed {
            self.suppressed.insert(handle);
        } else {
            self.suppressed.remove(&handle);
        }
    }

    fn measure(&mut self, handle: u64) -> f64 {
        self.measure_log.push(self.index_by_handle[&handle]);
        self.height_by_handle[&handle]
    }
}
