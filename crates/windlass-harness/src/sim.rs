#![forbid(unsafe_code)]

//! The simulated list surface.
//!
//! Rows are text entries measured by wrapping at a fixed column width,
//! so heights are a pure function of content and every expected pixel
//! value in a test can be computed by hand. Widgets are plain records:
//! mounting creates one with fresh editing state, unmounting destroys
//! it, soft-hiding and suppressing only toggle flags. That makes the
//! difference the engine's lifecycle exceptions exist for directly
//! observable: a soft-hidden row still holds its cursor and its typed
//! keys, an unmounted row has lost them.

use std::collections::HashMap;

use unicode_width::UnicodeWidthStr;

use windlass::{AttachError, AttachErrorKind, ContentShape, ItemId, ListHost};

/// Pixel height of one rendered text line.
pub const SIM_LINE_HEIGHT: f64 = 17.0;
/// Fixed vertical padding added to every row.
pub const SIM_ROW_MARGIN: f64 = 22.0;
/// Wrap width in display columns.
pub const SIM_WRAP_COLS: usize = 80;

/// Editing state carried by a live widget.
///
/// Survives soft-hiding (the widget stays alive) and is lost on unmount
/// (the widget is destroyed). A remount starts from defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditState {
    /// Cursor position within the row's text, in characters.
    pub cursor: usize,
    /// Keys the widget consumed while attached.
    pub keys_seen: Vec<char>,
}

/// One backing row.
#[derive(Debug, Clone)]
pub struct SimItem {
    pub id: ItemId,
    pub text: String,
    /// Line-equivalents contributed by non-text content.
    pub embed_lines: u32,
}

impl SimItem {
    /// Wrapped line count of `text` at [`SIM_WRAP_COLS`]. Empty text
    /// still renders one line; paragraphs wrap independently.
    #[must_use]
    pub fn wrapped_lines(&self) -> u32 {
        self.text
            .split('\n')
            .map(|para| {
                let cols = UnicodeWidthStr::width(para);
                (cols.div_ceil(SIM_WRAP_COLS)).max(1) as u32
            })
            .sum()
    }

    #[must_use]
    pub fn shape(&self) -> ContentShape {
        ContentShape {
            text_lines: self.wrapped_lines(),
            embed_lines: self.embed_lines,
        }
    }

    /// Rendered height: total lines at the line height plus the margin.
    #[must_use]
    pub fn height_px(&self) -> f64 {
        f64::from(self.wrapped_lines() + self.embed_lines) * SIM_LINE_HEIGHT + SIM_ROW_MARGIN
    }
}

/// A live simulated widget.
#[derive(Debug, Clone)]
struct Widget {
    /// Identity of the backing row; stable across index shifts.
    row: ItemId,
    edit: EditState,
    hidden: bool,
    suppressed: bool,
    placement: Option<f64>,
}

/// The simulated embedding list.
///
/// Tests edit rows first (the embedder owns its sequence), then notify
/// the engine, matching the synchronous-notification contract of
/// [`ListHost`].
#[derive(Debug, Default)]
pub struct SimHost {
    rows: Vec<SimItem>,
    next_id: u64,
    next_handle: u64,
    /// Attached widget handles in slot order.
    slots: Vec<u64>,
    widgets: HashMap<u64, Widget>,
    /// index -> remaining forced mount failures.
    fail_at: HashMap<usize, u32>,
    pub mounts: usize,
    pub unmounts: usize,
    pub failed_mounts: usize,
}

impl SimHost {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: 1,
            next_handle: 1,
            ..Self::default()
        }
    }

    /// `n` single-line rows ("row 0", "row 1", ...).
    #[must_use]
    pub fn with_uniform_rows(n: usize) -> Self {
        let mut host = Self::new();
        for i in 0..n {
            host.push_row(&format!("row {i}"), 0);
        }
        host
    }

    pub fn push_row(&mut self, text: &str, embed_lines: u32) -> ItemId {
        self.insert_row(self.rows.len(), text, embed_lines)
    }

    pub fn insert_row(&mut self, at: usize, text: &str, embed_lines: u32) -> ItemId {
        let id = ItemId(self.next_id);
        self.next_id += 1;
        self.rows.insert(
            at,
            SimItem {
                id,
                text: text.to_owned(),
                embed_lines,
            },
        );
        id
    }

    /// Drop rows from the backing sequence. Any widgets for them stay
    /// attached until the engine is notified and unmounts them.
    pub fn remove_rows(&mut self, at: usize, count: usize) {
        self.rows.drain(at..at + count);
    }

    pub fn move_row(&mut self, from: usize, to: usize) {
        let row = self.rows.remove(from);
        self.rows.insert(to, row);
    }

    /// Swap the row at `at` for a fresh one with a new identity.
    pub fn replace_row(&mut self, at: usize, text: &str, embed_lines: u32) -> ItemId {
        let id = ItemId(self.next_id);
        self.next_id += 1;
        self.rows[at] = SimItem {
            id,
            text: text.to_owned(),
            embed_lines,
        };
        id
    }

    /// Change a row's content in place, keeping its identity. The new
    /// height shows up in the next `measure` or resize observation.
    pub fn set_text(&mut self, at: usize, text: &str) {
        self.rows[at].text = text.to_owned();
    }

    /// Force the next `times` mount attempts for `index` to fail.
    pub fn fail_mount_at(&mut self, index: usize, times: u32) {
        self.fail_at.insert(index, times);
    }

    /// Deliver a key to the row's live widget, if any. Returns whether a
    /// widget consumed it; keys sent to placeholder rows are lost.
    pub fn send_key(&mut self, index: usize, key: char) -> bool {
        let id = self.rows[index].id;
        let Some(widget) = self.widgets.values_mut().find(|w| w.row == id) else {
            return false;
        };
        widget.edit.keys_seen.push(key);
        widget.edit.cursor += 1;
        true
    }

    #[must_use]
    pub fn row_id(&self, at: usize) -> ItemId {
        self.rows[at].id
    }

    /// Current rendered height of a row; what a resize observation for
    /// it would report.
    #[must_use]
    pub fn row_height(&self, at: usize) -> f64 {
        self.rows[at].height_px()
    }

    #[must_use]
    pub fn attached_count(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_attached(&self, index: usize) -> bool {
        self.widget_for(index).is_some()
    }

    #[must_use]
    pub fn is_soft_hidden(&self, index: usize) -> bool {
        self.widget_for(index).is_some_and(|w| w.hidden)
    }

    #[must_use]
    pub fn is_suppressed(&self, index: usize) -> bool {
        self.widget_for(index).is_some_and(|w| w.suppressed)
    }

    /// Editing state of the row's live widget, if it has one.
    #[must_use]
    pub fn edit_state(&self, index: usize) -> Option<&EditState> {
        self.widget_for(index).map(|w| &w.edit)
    }

    /// Y-offset the engine last placed the row's widget at.
    #[must_use]
    pub fn placement(&self, index: usize) -> Option<f64> {
        self.widget_for(index).and_then(|w| w.placement)
    }

    /// Attached rows in slot order, as current row indices.
    #[must_use]
    pub fn slot_rows(&self) -> Vec<usize> {
        self.slots
            .iter()
            .map(|h| {
                let id = self.widgets[h].row;
                self.rows
                    .iter()
                    .position(|r| r.id == id)
                    .expect("attached widget for a removed row")
            })
            .collect()
    }

    /// Slot order must match row order. Meaningful only between
    /// sequence edits and the reconcile pass that absorbs them.
    pub fn assert_slots_sorted(&self) {
        let order = self.slot_rows();
        assert!(
            order.windows(2).all(|w| w[0] < w[1]),
            "slot order broken: {order:?}"
        );
    }

    fn widget_for(&self, index: usize) -> Option<&Widget> {
        let id = self.rows[index].id;
        self.widgets.values().find(|w| w.row == id)
    }
}

impl ListHost for SimHost {
    type Handle = u64;

    fn item_count(&self) -> usize {
        self.rows.len()
    }

    fn item_id(&self, index: usize) -> ItemId {
        self.rows[index].id
    }

    fn content_shape(&self, index: usize) -> Option<ContentShape> {
        self.rows.get(index).map(SimItem::shape)
    }

    fn mount(&mut self, index: usize, slot: usize) -> Result<u64, AttachError> {
        if let Some(remaining) = self.fail_at.get_mut(&index)
            && *remaining > 0
        {
            *remaining -= 1;
            self.failed_mounts += 1;
            return Err(AttachError {
                index,
                id: self.rows[index].id,
                kind: AttachErrorKind::WidgetConstruction,
            });
        }
        assert!(slot <= self.slots.len(), "slot {slot} beyond slot list");
        let handle = self.next_handle;
        self.next_handle += 1;
        self.slots.insert(slot, handle);
        self.widgets.insert(
            handle,
            Widget {
                row: self.rows[index].id,
                edit: EditState::default(),
                hidden: false,
                suppressed: false,
                placement: None,
            },
        );
        self.mounts += 1;
        Ok(handle)
    }

    fn unmount(&mut self, handle: u64) {
        let widget = self.widgets.remove(&handle);
        assert!(widget.is_some(), "unmount of unknown handle {handle}");
        self.slots.retain(|&h| h != handle);
        self.unmounts += 1;
    }

    fn place(&mut self, handle: u64, offset_px: f64) {
        let widget = self
            .widgets
            .get_mut(&handle)
            .expect("place on unknown handle");
        widget.placement = Some(offset_px);
    }

    fn set_soft_hidden(&mut self, handle: u64, hidden: bool) {
        let widget = self
            .widgets
            .get_mut(&handle)
            .expect("soft-hide on unknown handle");
        widget.hidden = hidden;
    }

    fn set_suppressed(&mut self, handle: u64, suppressed: bool) {
        let widget = self
            .widgets
            .get_mut(&handle)
            .expect("suppress on unknown handle");
        widget.suppressed = suppressed;
    }

    fn measure(&mut self, handle: u64) -> f64 {
        let id = self.widgets[&handle].row;
        self.rows
            .iter()
            .find(|r| r.id == id)
            .expect("measure of a removed row")
            .height_px()
    }
}
