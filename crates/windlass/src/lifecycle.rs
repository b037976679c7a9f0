#![forbid(unsafe_code)]

//! The attach/detach state machine and its reconciler.
//!
//! Every item is in exactly one lifecycle state, stored on its record in
//! the model. A reconcile pass compares each candidate item's state against
//! the current window and applies at most one transition per item, in a
//! fixed order (detaches before attaches), so transitions never interleave
//! within a pass.
//!
//! # Transitions
//!
//! | From | Condition | To |
//! |------|-----------|----|
//! | unmounted | enters mount set | mounted |
//! | mounted | leaves window (full mode) | unmounted |
//! | mounted | leaves window, active | soft-hidden |
//! | mounted | leaves window, sticky | suppressed |
//! | mounted | leaves window, drag in flight | mounted (kept) |
//! | soft-hidden | re-enters window | mounted |
//! | suppressed | re-enters window | mounted |
//! | either hidden | flags change outside | re-planned from the full flag set |
//! | any attached | windowing deactivated | mounted (re-shown) |
//!
//! The hidden states re-run the same drag > active > sticky policy the
//! mounted exit runs, so losing one exemption while another remains
//! converts between hidden forms instead of destroying the widget.
//!
//! # Failure modes
//!
//! | Condition | Behavior |
//! |-----------|----------|
//! | host `mount` fails | logged, item stays a placeholder, retried next pass |
//! | repeated mount failures | retried each pass, attempt count logged |
//!
//! A mount failure never unwinds the pass: the remaining items still
//! reconcile.

use std::collections::HashMap;

use bitflags::bitflags;
use tracing::{trace, warn};

use crate::estimate::{ItemId, SizeCache};
use crate::host::ListHost;
use crate::model::{ListModel, ViewportWindow, WindowingMode};
use crate::position::PositionIndex;

/// Where an item is in its attach/detach lifecycle.
///
/// `Unmounted` items exist only as placeholders reserving their estimated
/// size. The two hidden states keep the widget attached: `SoftHidden`
/// collapses it to zero footprint (active item outside the window),
/// `Suppressed` merely suppresses display for content that breaks under
/// collapsing. Destruction is the removal of the record itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Unmounted,
    Mounted,
    SoftHidden,
    Suppressed,
}

bitflags! {
    /// Per-item lifecycle modifiers.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ItemFlags: u8 {
        /// Holds focus; soft-hidden instead of unmounted outside the
        /// window.
        const ACTIVE      = 0b0001;
        /// Requires suppression instead of soft-hiding (content that
        /// mishandles collapsing, e.g. shared defs other items render
        /// from).
        const STICKY      = 0b0010;
        /// A drag is in flight; detaching now would break the drag.
        const DRAG_LOCKED = 0b0100;
    }
}

/// One decided transition for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Keep,
    Mount,
    Unmount,
    SoftHide,
    Suppress,
    /// Re-show a soft-hidden or suppressed item.
    Restore,
}

/// Decide the transition for one item.
///
/// Pure policy over (state, flags, mode, window membership); the
/// reconciler applies whatever this returns. `in_mount_set` is the
/// mode-dependent eager-mount range: the window itself in full mode, the
/// viewport in defer mode, everything in none mode.
#[must_use]
pub fn plan(
    state: LifecycleState,
    flags: ItemFlags,
    mode: WindowingMode,
    in_window: bool,
    in_mount_set: bool,
) -> Transition {
    if state == LifecycleState::Unmounted {
        return if in_mount_set {
            Transition::Mount
        } else {
            Transition::Keep
        };
    }
    if in_window || mode != WindowingMode::Full {
        return match state {
            LifecycleState::Mounted => Transition::Keep,
            _ => Transition::Restore,
        };
    }
    // Attached outside the window in full mode: the full flag set picks
    // the surviving form, whatever form the item holds today. Drag beats
    // active beats sticky; a dragged item must stay fully visible no
    // matter what else it is.
    let target = if flags.contains(ItemFlags::DRAG_LOCKED) {
        LifecycleState::Mounted
    } else if flags.contains(ItemFlags::ACTIVE) {
        LifecycleState::SoftHidden
    } else if flags.contains(ItemFlags::STICKY) {
        LifecycleState::Suppressed
    } else {
        LifecycleState::Unmounted
    };
    if target == state {
        return Transition::Keep;
    }
    match target {
        LifecycleState::Unmounted => Transition::Unmount,
        LifecycleState::Mounted => Transition::Restore,
        LifecycleState::SoftHidden => Transition::SoftHide,
        LifecycleState::Suppressed => Transition::Suppress,
    }
}

/// Counters for one reconcile pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReconcilePass {
    pub mounted: usize,
    pub unmounted: usize,
    pub soft_hidden: usize,
    pub suppressed: usize,
    pub restored: usize,
    pub attach_failures: usize,
    /// Scroll delta owed to measurements of items above the viewport top.
    pub scroll_adjust: f64,
}

/// Applies lifecycle transitions against the host.
#[derive(Debug, Default)]
pub struct LifecycleController {
    /// Consecutive failed mount attempts per item, cleared on success.
    attach_attempts: HashMap<ItemId, u32>,
}

impl LifecycleController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consecutive failed attach attempts recorded for `id`.
    #[must_use]
    pub fn attach_attempts(&self, id: ItemId) -> u32 {
        self.attach_attempts.get(&id).copied().unwrap_or(0)
    }

    /// Reconcile the attached set against `window`.
    ///
    /// `mount_range` is the inclusive index range to attach eagerly this
    /// pass. Detaches and hides run first so freed slots are real before
    /// new insertion points are computed.
    #[allow(clippy::too_many_arguments)]
    pub fn reconcile<H: ListHost>(
        &mut self,
        model: &mut ListModel,
        positions: &mut PositionIndex<H::Handle>,
        cache: &mut SizeCache,
        host: &mut H,
        window: ViewportWindow,
        mount_range: (usize, usize),
        scroll_top: f64,
    ) -> ReconcilePass {
        let mut pass = ReconcilePass::default();
        if model.is_empty() {
            return pass;
        }
        let mode = model.mode();
        let in_mount_set =
            |i: usize| i >= mount_range.0 && i <= mount_range.1;

        // Phase 1: resolve everything currently attached.
        let attached: Vec<_> = positions.iter().collect();
        for entry in attached {
            let index = entry.index;
            let state = model.state_of(index);
            let flags = model.flags_of(index);
            let transition = plan(state, flags, mode, window.contains(index), in_mount_set(index));
            match transition {
                Transition::Keep | Transition::Mount => {}
                Transition::Unmount => {
                    trace!(index, "unmount");
                    if state == LifecycleState::SoftHidden {
                        host.set_soft_hidden(entry.handle, false);
                    } else if state == LifecycleState::Suppressed {
                        host.set_suppressed(entry.handle, false);
                    }
                    host.unmount(entry.handle);
                    positions.remove(index);
                    model.set_state(index, LifecycleState::Unmounted);
                    pass.unmounted += 1;
                }
                Transition::SoftHide => {
                    trace!(index, "soft-hide");
                    if state == LifecycleState::Suppressed {
                        host.set_suppressed(entry.handle, false);
                    }
                    host.set_soft_hidden(entry.handle, true);
                    model.set_state(index, LifecycleState::SoftHidden);
                    pass.soft_hidden += 1;
                }
                Transition::Suppress => {
                    trace!(index, "suppress");
                    if state == LifecycleState::SoftHidden {
                        host.set_soft_hidden(entry.handle, false);
                    }
                    host.set_suppressed(entry.handle, true);
                    model.set_state(index, LifecycleState::Suppressed);
                    pass.suppressed += 1;
                }
                Transition::Restore => {
                    trace!(index, "restore");
                    if state == LifecycleState::SoftHidden {
                        host.set_soft_hidden(entry.handle, false);
                    } else {
                        host.set_suppressed(entry.handle, false);
                    }
                    model.set_state(index, LifecycleState::Mounted);
                    pass.restored += 1;
                }
            }
        }

        // Phase 2: attach placeholders in the mount range.
        for index in mount_range.0..=mount_range.1.min(model.len().saturating_sub(1)) {
            let state = model.state_of(index);
            let flags = model.flags_of(index);
            if plan(state, flags, mode, window.contains(index), true) != Transition::Mount {
                continue;
            }
            let result = self.mount_one(model, positions, cache, host, index, scroll_top);
            match result {
                Ok((_, adjust)) => {
                    pass.mounted += 1;
                    pass.scroll_adjust += adjust;
                }
                Err(()) => pass.attach_failures += 1,
            }
        }

        pass
    }

    /// Mount, measure and record one item. Returns the new handle and the
    /// scroll adjustment from its measurement; `Err` means the failure was
    /// logged and the item stays a placeholder.
    pub(crate) fn mount_one<H: ListHost>(
        &mut self,
        model: &mut ListModel,
        positions: &mut PositionIndex<H::Handle>,
        cache: &mut SizeCache,
        host: &mut H,
        index: usize,
        scroll_top: f64,
    ) -> Result<(H::Handle, f64), ()> {
        let id = model.id_of(index);
        let slot = positions.insertion_point(index);
        match host.mount(index, slot) {
            Ok(handle) => {
                self.attach_attempts.remove(&id);
                positions.insert(index, handle);
                model.set_state(index, LifecycleState::Mounted);
                let px = host.measure(handle);
                cache.set_measured(id, px);
                Ok((handle, model.resize_item(index, px, scroll_top)))
            }
            Err(err) => {
                let attempts = self.attach_attempts.entry(id).or_insert(0);
                *attempts += 1;
                warn!(
                    id = id.0,
                    index,
                    attempts = *attempts,
                    error = %err,
                    "attach failed, keeping placeholder"
                );
                Err(())
            }
        }
    }
}
