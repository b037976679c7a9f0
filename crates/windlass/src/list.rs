#![forbid(unsafe_code)]

//! The engine facade: one object owning the model, caches and
//! controllers.
//!
//! [`WindowedList`] ties the pieces together behind the API an embedding
//! list widget drives:
//!
//! 1. [`populate`](WindowedList::populate) seeds the model from the
//!    host's backing sequence, estimating every height.
//! 2. [`update`](WindowedList::update) runs one synchronous pass for the
//!    current scroll state: flush externally cached sizes, compute the
//!    window, reconcile attachments, position attached widgets.
//! 3. Sequence edits arrive through the `on_items_*` notifications, size
//!    observations through
//!    [`handle_observer_event`](WindowedList::handle_observer_event) and
//!    [`poll_observers`](WindowedList::poll_observers), and background
//!    mounting/measuring runs in
//!    [`run_idle_fill`](WindowedList::run_idle_fill) slices driven by
//!    the injected scheduler.
//!
//! Everything is synchronous on the host's UI thread; "idle" means the
//! host invokes the fill callback when it has spare time, not another
//! thread.
//!
//! # Scroll compensation
//!
//! Measuring or resizing an item above the viewport top moves everything
//! below it. Each pass reports the accumulated delta in
//! [`UpdateSummary::scroll_adjust`] (or
//! [`FillRun::scroll_adjust`](crate::filler::FillRun) for idle slices);
//! the embedder applies that delta to its scroll position to keep the
//! visible content anchored.

use std::fmt;
use std::time::Instant;

use tracing::{debug, trace};

use crate::coalesce::{
    CoalescerConfig, ObserverAction, ObserverCoalescer, ObserverEvent, ObserverKind,
    ObserverStats, ReplayReport,
};
use crate::estimate::{CacheStats, EstimatorConfig, ItemId, SizeCache, SizeEstimator};
use crate::filler::{FillOutcome, FillRun, FillStats, FillerConfig, IdleFiller};
use crate::host::ListHost;
use crate::lifecycle::{ItemFlags, LifecycleController, LifecycleState};
use crate::model::{ListModel, ViewportWindow, WindowingMode};
use crate::position::PositionIndex;
use crate::sched::{IdleDeadline, IdleScheduler, ScheduleToken};
use crate::scroll::{scroll_target, Align, SmartThresholds};

/// Default number of items kept attached beyond each edge of the visible
/// range.
pub const DEFAULT_OVERSCAN: usize = 1;

/// Engine tunables, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ListConfig {
    pub mode: WindowingMode,
    pub overscan: usize,
    pub estimator: EstimatorConfig,
    pub filler: FillerConfig,
    pub coalescer: CoalescerConfig,
    pub smart: SmartThresholds,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            mode: WindowingMode::Full,
            overscan: DEFAULT_OVERSCAN,
            estimator: EstimatorConfig::default(),
            filler: FillerConfig::default(),
            coalescer: CoalescerConfig::default(),
            smart: SmartThresholds::default(),
        }
    }
}

impl ListConfig {
    /// `Default` with the given mounting policy; the remaining fields are
    /// public for struct-update construction.
    #[must_use]
    pub fn with_mode(mut self, mode: WindowingMode) -> Self {
        self.mode = mode;
        self
    }
}

/// What one [`WindowedList::update`] pass did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateSummary {
    /// The window this pass reconciled against.
    pub window: ViewportWindow,
    /// Items newly attached.
    pub mounted: usize,
    /// Items detached.
    pub unmounted: usize,
    /// Total content height after the pass.
    pub total_height: f64,
    /// Whether `total_height` differs from the previous summary, i.e. the
    /// embedder must resize its content element.
    pub total_height_changed: bool,
    /// Scroll delta the embedder owes its scroll position, including
    /// observer-driven resizes applied since the previous pass.
    pub scroll_adjust: f64,
}

/// A size observation for an item that has since left the list.
///
/// Produced by the observer application seams; the coalescer logs it and
/// carries on with the rest of the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaleObserver {
    pub id: ItemId,
}

impl fmt::Display for StaleObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observation for item {} which is no longer listed", self.id.0)
    }
}

impl std::error::Error for StaleObserver {}

fn empty_run(outcome: FillOutcome) -> FillRun {
    FillRun {
        outcome,
        processed: 0,
        scroll_adjust: 0.0,
    }
}

/// Windowing engine for one embedded list.
///
/// Generic over the host's handle type; owns no widgets itself.
pub struct WindowedList<H: ListHost> {
    model: ListModel,
    positions: PositionIndex<H::Handle>,
    cache: SizeCache,
    estimator: SizeEstimator,
    controller: LifecycleController,
    filler: IdleFiller,
    filler_config: FillerConfig,
    coalescer: ObserverCoalescer,
    scheduler: Box<dyn IdleScheduler>,
    /// Token of the one outstanding idle request, if any.
    pending_fill: Option<ScheduleToken>,
    smart: SmartThresholds,
    scroll_top: f64,
    viewport_h: f64,
    /// Scroll compensation accumulated outside `update` (observer-driven
    /// resizes), reported in the next summary.
    pending_adjust: f64,
    /// Total height as of the last summary, for change detection.
    last_total: f64,
    disposed: bool,
}

impl<H: ListHost> WindowedList<H> {
    #[must_use]
    pub fn new(config: ListConfig, scheduler: Box<dyn IdleScheduler>) -> Self {
        Self {
            model: ListModel::new(config.mode, config.overscan),
            positions: PositionIndex::new(),
            cache: SizeCache::new(),
            estimator: SizeEstimator::new(config.estimator),
            controller: LifecycleController::new(),
            filler: IdleFiller::new(),
            filler_config: config.filler,
            coalescer: ObserverCoalescer::new(config.coalescer),
            scheduler,
            pending_fill: None,
            smart: config.smart,
            scroll_top: 0.0,
            viewport_h: 0.0,
            pending_adjust: 0.0,
            last_total: 0.0,
            disposed: false,
        }
    }

    /// Seed the model from the host's current sequence, estimating every
    /// height. Call once on an empty engine; later edits go through the
    /// `on_items_*` notifications.
    pub fn populate(&mut self, host: &H) {
        debug_assert!(self.model.is_empty(), "populate on a non-empty engine");
        let Self {
            model,
            cache,
            estimator,
            ..
        } = self;
        model.extend_items((0..host.item_count()).map(|index| {
            let id = host.item_id(index);
            let px = estimator.estimate(cache, id, host.content_shape(index));
            (id, px)
        }));
        debug!(items = self.model.len(), "populated");
    }

    /// Run one windowing pass for the given scroll state.
    ///
    /// Returns `None` when the list is empty or the engine is disposed.
    /// On a nonzero [`UpdateSummary::scroll_adjust`] the embedder should
    /// shift its scroll position and run another pass with the corrected
    /// offset.
    pub fn update(
        &mut self,
        host: &mut H,
        scroll_top: f64,
        viewport_h: f64,
    ) -> Option<UpdateSummary> {
        if self.disposed {
            return None;
        }
        self.scroll_top = scroll_top;
        self.viewport_h = viewport_h;
        let mut adjust = std::mem::take(&mut self.pending_adjust);
        adjust += self.flush_size_cache();

        let window = self.model.compute_window(scroll_top, viewport_h)?;
        let mount_range = self.mount_range(window);
        let pass = self.controller.reconcile(
            &mut self.model,
            &mut self.positions,
            &mut self.cache,
            host,
            window,
            mount_range,
            scroll_top,
        );
        adjust += pass.scroll_adjust;
        // Position attached widgets; soft-hidden and suppressed ones have
        // no footprint and are skipped.
        for entry in self.positions.iter() {
            if self.model.state_of(entry.index) == LifecycleState::Mounted {
                host.place(entry.handle, self.model.offset_of(entry.index));
            }
        }
        // Reconcile measurements went straight into the tree; drop the
        // dirty flag they raised so the next flush walk is skipped.
        let _ = self.cache.take_dirty();

        let total = self.model.total_height();
        let changed = total != self.last_total;
        self.last_total = total;
        self.maybe_schedule_fill();
        Some(UpdateSummary {
            window,
            mounted: pass.mounted,
            unmounted: pass.unmounted,
            total_height: total,
            total_height_changed: changed,
            scroll_adjust: adjust,
        })
    }

    /// Run one idle fill slice for `token`.
    ///
    /// `token` must be the engine's outstanding request; callbacks with
    /// superseded tokens are ignored. While the list is scrolling at
    /// `now` the slice yields untouched and re-arms, keeping idle work
    /// off the scroll path. A `MoreWork` outcome re-arms as well; the
    /// scheduler decides when the next slice runs.
    pub fn run_idle_fill(
        &mut self,
        host: &mut H,
        token: ScheduleToken,
        deadline: &IdleDeadline,
        now: Instant,
    ) -> FillRun {
        if self.pending_fill != Some(token) {
            trace!(token = token.0, "stale idle callback ignored");
            return empty_run(FillOutcome::MoreWork);
        }
        self.pending_fill = None;
        if self.disposed {
            return empty_run(FillOutcome::Complete);
        }
        if self.coalescer.is_scrolling(now) {
            trace!("scrolling, yielding idle slice");
            self.maybe_schedule_fill();
            return empty_run(FillOutcome::MoreWork);
        }

        self.pending_adjust += self.flush_size_cache();
        let run = self.filler.run(
            &mut self.model,
            &mut self.positions,
            &mut self.cache,
            &mut self.controller,
            host,
            deadline,
            self.scroll_top,
        );
        let _ = self.cache.take_dirty();
        if run.outcome == FillOutcome::MoreWork {
            self.maybe_schedule_fill();
        }
        run
    }

    /// Deadline for the next fill slice per the configured budgets.
    #[must_use]
    pub fn fill_deadline(&self, did_timeout: bool) -> IdleDeadline {
        self.filler_config.slice(did_timeout)
    }

    /// Notify: `count` items inserted before `at`, already present in the
    /// host's sequence.
    pub fn on_items_inserted(&mut self, host: &H, at: usize, count: usize) {
        for offset in 0..count {
            let index = at + offset;
            let id = host.item_id(index);
            let px = self
                .estimator
                .estimate(&mut self.cache, id, host.content_shape(index));
            self.model.insert_item(index, id, px);
        }
        self.positions.apply_insert(at, count);
        self.filler.on_items_inserted(at, count);
        debug!(at, count, "items inserted");
        self.maybe_schedule_fill();
    }

    /// Notify: `count` items removed starting at `at`. Attached widgets
    /// in the range are unmounted and their cache entries evicted.
    pub fn on_items_removed(&mut self, host: &mut H, at: usize, count: usize) {
        for id in self.model.remove_items(at, count) {
            self.cache.remove(id);
        }
        for handle in self.positions.apply_remove(at, count) {
            host.unmount(handle);
        }
        self.filler.on_items_removed(at, count);
        debug!(at, count, "items removed");
    }

    /// Notify: the item at `from` now sits at `to`. Attachment and
    /// measured size travel with it; offsets shift on the next pass.
    pub fn on_item_moved(&mut self, from: usize, to: usize) {
        self.model.move_item(from, to);
        self.positions.apply_move(from, to);
    }

    /// Notify: the item at `index` was replaced by a different one.
    ///
    /// The old widget is destroyed and its cached size evicted; the new
    /// item starts as a placeholder at its estimated height.
    pub fn on_item_replaced(&mut self, host: &mut H, index: usize) {
        self.cache.remove(self.model.id_of(index));
        if let Some(handle) = self.positions.remove(index) {
            host.unmount(handle);
        }
        let id = host.item_id(index);
        let px = self
            .estimator
            .estimate(&mut self.cache, id, host.content_shape(index));
        self.model.replace_item(index, id, px);
        self.filler.re_arm();
        self.maybe_schedule_fill();
    }

    /// Designate the active (focused) item, or clear it with `None`.
    /// Takes effect on the next pass.
    pub fn set_active_item(&mut self, index: Option<usize>) {
        self.model.set_active(index);
    }

    /// Pin or unpin `index` as sticky: suppressed instead of unmounted
    /// outside the window.
    pub fn set_item_sticky(&mut self, index: usize, sticky: bool) {
        self.model.flags_mut(index).set(ItemFlags::STICKY, sticky);
    }

    /// Lock or release `index` for a drag interaction; locked items are
    /// never detached.
    pub fn set_item_dragging(&mut self, index: usize, dragging: bool) {
        self.model.flags_mut(index).set(ItemFlags::DRAG_LOCKED, dragging);
    }

    /// Record an externally computed estimate for `id`, or evict with
    /// `None`. Folded into the layout on the next pass; never downgrades
    /// a real measurement.
    pub fn set_estimated_size(&mut self, id: ItemId, px: Option<f64>) {
        self.cache.set(id, px);
    }

    /// Scroll offset that brings `index` into view per `align`, or
    /// `None` when no scrolling is needed (or the index is out of
    /// range). Pure; the embedder performs the actual scroll.
    #[must_use]
    pub fn scroll_to_item(&self, index: usize, align: Align) -> Option<f64> {
        scroll_target(
            &self.model,
            index,
            align,
            self.scroll_top,
            self.viewport_h,
            &self.smart,
        )
    }

    /// Feed one size observation through the coalescer.
    ///
    /// Urgent events and events arriving while idle apply immediately;
    /// the rest buffer latest-wins until
    /// [`poll_observers`](Self::poll_observers) replays them.
    pub fn handle_observer_event(&mut self, event: ObserverEvent, now: Instant) -> ObserverAction {
        let Self {
            coalescer,
            model,
            cache,
            scroll_top,
            viewport_h,
            pending_adjust,
            ..
        } = self;
        coalescer.handle_event(event, now, |ev| {
            Self::apply_observer(model, cache, viewport_h, *scroll_top, pending_adjust, ev)
        })
    }

    /// Replay buffered observations if their trailing edge is due.
    pub fn poll_observers(&mut self, now: Instant) -> ReplayReport {
        let Self {
            coalescer,
            model,
            cache,
            scroll_top,
            viewport_h,
            pending_adjust,
            ..
        } = self;
        coalescer.poll(now, |ev| {
            Self::apply_observer(model, cache, viewport_h, *scroll_top, pending_adjust, ev)
        })
    }

    fn apply_observer(
        model: &mut ListModel,
        cache: &mut SizeCache,
        viewport_h: &mut f64,
        scroll_top: f64,
        pending_adjust: &mut f64,
        event: &ObserverEvent,
    ) -> Result<(), StaleObserver> {
        match event.kind {
            ObserverKind::ItemResized { id, px } => {
                let Some(index) = model.index_of(id) else {
                    return Err(StaleObserver { id });
                };
                *pending_adjust += model.resize_item(index, px, scroll_top);
                cache.set_measured(id, px);
                Ok(())
            }
            ObserverKind::ViewportResized { px } => {
                *viewport_h = px;
                Ok(())
            }
        }
    }

    /// Explicit host scrolling signal; see
    /// [`ObserverCoalescer::set_scrolling`].
    pub fn set_scrolling(&mut self, scrolling: bool) {
        self.coalescer.set_scrolling(scrolling);
    }

    /// Record a scroll event at `now`; the list counts as scrolling
    /// until the configured idle delay passes without another.
    pub fn note_scroll(&mut self, now: Instant) {
        self.coalescer.note_scroll(now);
    }

    /// Switch mounting policies.
    ///
    /// The filler re-arms: a switch to `Defer` wants everything mounted
    /// eventually, a switch to `Full` wants everything measured.
    /// Switching to `None` cancels pending idle work; the next pass
    /// mounts the full range synchronously.
    pub fn set_windowing_mode(&mut self, mode: WindowingMode) {
        if self.model.mode() == mode {
            return;
        }
        self.model.set_mode(mode);
        self.filler.re_arm();
        if mode == WindowingMode::None {
            self.cancel_fill();
        } else {
            self.maybe_schedule_fill();
        }
        debug!(?mode, "windowing mode switched");
    }

    pub fn set_overscan(&mut self, overscan: usize) {
        self.model.set_overscan(overscan);
    }

    /// Tear down: cancel scheduled work, drop buffered observations and
    /// unmount every attached widget. Every later call is a no-op.
    pub fn dispose(&mut self, host: &mut H) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.cancel_fill();
        self.coalescer.cancel();
        for handle in self.positions.take_all() {
            host.unmount(handle);
        }
        for index in 0..self.model.len() {
            self.model.set_state(index, LifecycleState::Unmounted);
        }
        debug!("disposed");
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.model.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.model.is_empty()
    }

    #[must_use]
    pub fn mode(&self) -> WindowingMode {
        self.model.mode()
    }

    #[must_use]
    pub fn total_height(&self) -> f64 {
        self.model.total_height()
    }

    /// Window for the current scroll state, `None` when empty. Reflects
    /// observer-applied viewport resizes since the last pass.
    #[must_use]
    pub fn window(&self) -> Option<ViewportWindow> {
        self.model.compute_window(self.scroll_top, self.viewport_h)
    }

    #[must_use]
    pub fn item_state(&self, index: usize) -> LifecycleState {
        self.model.state_of(index)
    }

    #[must_use]
    pub fn active_item(&self) -> Option<usize> {
        self.model.active_index()
    }

    #[must_use]
    pub fn item_flags(&self, index: usize) -> ItemFlags {
        self.model.flags_of(index)
    }

    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    #[must_use]
    pub fn fill_stats(&self) -> FillStats {
        self.filler.stats()
    }

    #[must_use]
    pub fn observer_stats(&self) -> ObserverStats {
        self.coalescer.stats()
    }

    /// Fold externally written cache entries into the height tree.
    ///
    /// The cache raises one dirty flag for any number of writes; this
    /// walk reconciles every divergence in one pass and returns the
    /// scroll delta owed to rows above the viewport top.
    fn flush_size_cache(&mut self) -> f64 {
        if !self.cache.take_dirty() {
            return 0.0;
        }
        let mut adjust = 0.0;
        for index in 0..self.model.len() {
            let id = self.model.id_of(index);
            if let Some(entry) = self.cache.get(id)
                && entry.px != self.model.height_of(index)
            {
                adjust += self.model.resize_item(index, entry.px, self.scroll_top);
            }
        }
        if adjust != 0.0 {
            trace!(adjust, "size flush moved content above the viewport");
        }
        adjust
    }

    /// Inclusive index range reconcile attaches eagerly this pass.
    fn mount_range(&self, window: ViewportWindow) -> (usize, usize) {
        match self.model.mode() {
            WindowingMode::Full => (window.overscan_start, window.overscan_end),
            WindowingMode::None => (0, self.model.len().saturating_sub(1)),
            WindowingMode::Defer => {
                let Some((first, last)) =
                    self.model.visible_range(self.scroll_top, self.viewport_h)
                else {
                    return (window.overscan_start, window.overscan_end);
                };
                let overscan = self.model.overscan();
                (
                    first.saturating_sub(overscan),
                    (last + overscan).min(self.model.len().saturating_sub(1)),
                )
            }
        }
    }

    /// Request an idle callback when fill work may remain.
    fn maybe_schedule_fill(&mut self) {
        if self.disposed
            || self.pending_fill.is_some()
            || self.filler.is_complete()
            || self.model.mode() == WindowingMode::None
        {
            return;
        }
        let token = self.scheduler.request();
        trace!(token = token.0, "idle fill scheduled");
        self.pending_fill = Some(token);
    }

    fn cancel_fill(&mut self) {
        if let Some(token) = self.pending_fill.take() {
            self.scheduler.cancel(token);
        }
    }
}
