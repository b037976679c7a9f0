#![forbid(unsafe_code)]

//! The seam between the engine and the embedding UI.
//!
//! The engine is headless: it decides *which* items exist as real widgets
//! and *where* they sit, and issues those decisions through [`ListHost`].
//! Hosts own widget construction, actual positioning/visibility toggles,
//! and pixel measurement. Handles are opaque to the engine; it only stores
//! and returns them.
//!
//! All calls are synchronous and run on the host's UI thread. The engine
//! never retains a handle after issuing `unmount` for it.

use std::fmt;

use crate::estimate::{ContentShape, ItemId};

/// Why a mount attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachErrorKind {
    /// The host could not build a widget for this item (bad content,
    /// missing renderer).
    WidgetConstruction,
    /// The host rejected the insertion slot.
    InvalidSlot,
    /// The backing item disappeared between the window computation and the
    /// mount call.
    ItemGone,
}

/// A failed attach. The item stays a placeholder and is retried on the
/// next window pass; the failure never propagates past the update call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachError {
    /// List index the mount targeted.
    pub index: usize,
    /// Identity of the item that failed to attach.
    pub id: ItemId,
    pub kind: AttachErrorKind,
}

impl fmt::Display for AttachError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            AttachErrorKind::WidgetConstruction => "widget construction failed",
            AttachErrorKind::InvalidSlot => "invalid insertion slot",
            AttachErrorKind::ItemGone => "item gone before mount",
        };
        write!(f, "attach of item {} at index {}: {what}", self.id.0, self.index)
    }
}

impl std::error::Error for AttachError {}

/// Operations the engine needs from the embedding list surface.
///
/// # Contract
///
/// - `item_id` is only called with indices that are in range at call time;
///   sequence notifications must reach the engine synchronously with the
///   edit, so the engine's view of the length never lags the host's.
/// - `content_shape` may be called while an item is mid-removal and is
///   allowed to answer `None`; the engine logs and treats the size as 0.
/// - `slot` in [`ListHost::mount`] is the insertion position among the
///   host's currently attached children, which the engine keeps sorted by
///   list index.
/// - `measure` is only called on handles from successful `mount` calls
///   that have not been unmounted.
pub trait ListHost {
    /// Opaque reference to an attached widget.
    type Handle: Copy + Eq + fmt::Debug;

    /// Current number of items in the backing sequence.
    fn item_count(&self) -> usize;

    /// Stable identity of the item at `index`.
    fn item_id(&self, index: usize) -> ItemId;

    /// Content shape for the size heuristic, or `None` when the item is
    /// vanishing (removal racing a size query).
    fn content_shape(&self, index: usize) -> Option<ContentShape>;

    /// Build and attach the widget for `index`, inserting it at `slot`
    /// among attached children.
    fn mount(&mut self, index: usize, slot: usize) -> Result<Self::Handle, AttachError>;

    /// Detach and destroy the widget behind `handle`. Its item reverts to
    /// a placeholder; internal widget state is gone.
    fn unmount(&mut self, handle: Self::Handle);

    /// Position an attached widget at an absolute y-offset inside the
    /// scroll content.
    fn place(&mut self, handle: Self::Handle, offset_px: f64);

    /// Collapse an attached widget to zero visual footprint (or restore
    /// it). The widget stays alive; its state must survive.
    fn set_soft_hidden(&mut self, handle: Self::Handle, hidden: bool);

    /// Suppress display of an attached widget without collapsing its
    /// internal state, for content that breaks under soft-hiding.
    fn set_suppressed(&mut self, handle: Self::Handle, suppressed: bool);

    /// Real pixel height of an attached widget.
    fn measure(&mut self, handle: Self::Handle) -> f64;
}
