#![forbid(unsafe_code)]

//! Observer storm suppression during active scrolling.
//!
//! Size observers fire on every relayout, which during a scroll burst
//! means a callback flood that each wants a full reposition pass. The
//! coalescer sits between the host's observer plumbing and the engine:
//! while the host reports active scrolling, non-urgent observations are
//! buffered latest-wins and replayed in one batch at the trailing edge
//! of a fixed interval. Observations for the editing surface itself are
//! marked urgent and never delayed, since deferring them breaks editor
//! auto-sizing.
//!
//! # Decision rules
//!
//! | Situation | Behavior |
//! |-----------|----------|
//! | not scrolling | apply immediately |
//! | scrolling, urgent event | apply immediately, bypass buffer |
//! | scrolling, non-urgent | buffer latest-wins per source |
//! | interval elapsed since batch start | replay whole buffer |
//! | scrolling stopped | replay on next poll, no interval wait |
//! | one replayed event fails | log, continue with the rest |
//! | buffer at capacity | drop oldest-by-arrival |
//!
//! Scrolling is detected two ways: an explicit host flag
//! ([`set_scrolling`](ObserverCoalescer::set_scrolling)) and a
//! per-scroll-event timestamp ([`note_scroll`](ObserverCoalescer::note_scroll))
//! that keeps the coalescer in scrolling state until a reset delay
//! passes without further events.

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::estimate::ItemId;

/// Default trailing-edge replay interval while scrolling.
pub const DEFAULT_REPLAY_INTERVAL_MS: u64 = 1000;
/// Default time after the last scroll event before the list counts as
/// idle again.
pub const DEFAULT_SCROLL_IDLE_MS: u64 = 150;
/// Default cap on buffered observations.
pub const DEFAULT_MAX_BUFFERED: usize = 1024;

#[inline]
fn duration_since_or_zero(now: Instant, earlier: Instant) -> Duration {
    now.checked_duration_since(earlier)
        .unwrap_or(Duration::ZERO)
}

/// What a size observation reported.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObserverKind {
    /// One item's rendered height changed.
    ItemResized { id: ItemId, px: f64 },
    /// The scroll viewport itself changed height.
    ViewportResized { px: f64 },
}

/// Key for latest-wins dedup: one slot per item, one for the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKey {
    Item(ItemId),
    Viewport,
}

impl ObserverKind {
    fn key(self) -> SourceKey {
        match self {
            Self::ItemResized { id, .. } => SourceKey::Item(id),
            Self::ViewportResized { .. } => SourceKey::Viewport,
        }
    }
}

/// One observation routed through the coalescer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObserverEvent {
    pub kind: ObserverKind,
    /// Never-delay category: editing-surface geometry.
    pub urgent: bool,
}

impl ObserverEvent {
    #[must_use]
    pub fn item_resized(id: ItemId, px: f64) -> Self {
        Self {
            kind: ObserverKind::ItemResized { id, px },
            urgent: false,
        }
    }

    #[must_use]
    pub fn viewport_resized(px: f64) -> Self {
        Self {
            kind: ObserverKind::ViewportResized { px },
            urgent: false,
        }
    }

    /// Mark as never-delay.
    #[must_use]
    pub fn as_urgent(mut self) -> Self {
        self.urgent = true;
        self
    }
}

/// Coalescer tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoalescerConfig {
    /// Trailing-edge replay interval while scrolling.
    pub replay_interval: Duration,
    /// Idle threshold after the last `note_scroll`.
    pub scroll_idle_delay: Duration,
    /// Buffer capacity; oldest entries drop beyond it.
    pub max_buffered: usize,
}

impl Default for CoalescerConfig {
    fn default() -> Self {
        Self {
            replay_interval: Duration::from_millis(DEFAULT_REPLAY_INTERVAL_MS),
            scroll_idle_delay: Duration::from_millis(DEFAULT_SCROLL_IDLE_MS),
            max_buffered: DEFAULT_MAX_BUFFERED,
        }
    }
}

/// What the coalescer did with an incoming event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverAction {
    /// Applied synchronously (urgent, or the list is not scrolling).
    Applied,
    /// Held for trailing-edge replay.
    Buffered,
}

/// Result of one replay batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Events applied successfully.
    pub replayed: usize,
    /// Events whose application failed (logged, batch continued).
    pub failures: usize,
}

/// Lifetime counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObserverStats {
    pub seen: u64,
    pub applied_immediate: u64,
    pub buffered: u64,
    pub replayed: u64,
    pub dropped: u64,
    pub failures: u64,
}

/// Buffers non-urgent observer callbacks while the list scrolls.
#[derive(Debug)]
pub struct ObserverCoalescer {
    config: CoalescerConfig,
    /// Pending observations in arrival order, deduped per source.
    buffer: VecDeque<ObserverEvent>,
    /// Explicit host flag.
    scrolling: bool,
    /// Timestamp of the last scroll event seen via `note_scroll`.
    last_scroll: Option<Instant>,
    /// When the current batch started buffering.
    window_start: Option<Instant>,
    stats: ObserverStats,
}

impl Default for ObserverCoalescer {
    fn default() -> Self {
        Self::new(CoalescerConfig::default())
    }
}

impl ObserverCoalescer {
    #[must_use]
    pub fn new(config: CoalescerConfig) -> Self {
        Self {
            config,
            buffer: VecDeque::new(),
            scrolling: false,
            last_scroll: None,
            window_start: None,
            stats: ObserverStats::default(),
        }
    }

    /// Explicit host scrolling signal. Turning it off also clears the
    /// implicit scroll-event timer.
    pub fn set_scrolling(&mut self, scrolling: bool) {
        self.scrolling = scrolling;
        if !scrolling {
            self.last_scroll = None;
        }
    }

    /// Record a scroll event; the list counts as scrolling until the
    /// idle delay passes without another.
    pub fn note_scroll(&mut self, now: Instant) {
        self.last_scroll = Some(now);
    }

    #[must_use]
    pub fn is_scrolling(&self, now: Instant) -> bool {
        self.scrolling
            || self
                .last_scroll
                .is_some_and(|t| duration_since_or_zero(now, t) < self.config.scroll_idle_delay)
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub fn stats(&self) -> ObserverStats {
        self.stats
    }

    /// Time until the pending batch is due, zero when it can replay now.
    /// `None` when nothing is buffered.
    #[must_use]
    pub fn time_until_replay(&self, now: Instant) -> Option<Duration> {
        let start = self.window_start?;
        if !self.is_scrolling(now) {
            return Some(Duration::ZERO);
        }
        let elapsed = duration_since_or_zero(now, start);
        Some(self.config.replay_interval.saturating_sub(elapsed))
    }

    /// Route one observation.
    ///
    /// Urgent events and events arriving while idle are applied through
    /// `apply` right away; the rest buffer for [`poll`](Self::poll). A
    /// failing `apply` is logged and swallowed, matching the per-event
    /// isolation of replay batches.
    pub fn handle_event<F, E>(
        &mut self,
        event: ObserverEvent,
        now: Instant,
        apply: F,
    ) -> ObserverAction
    where
        F: FnOnce(&ObserverEvent) -> Result<(), E>,
        E: fmt::Display,
    {
        self.stats.seen += 1;
        let key = event.kind.key();

        if event.urgent || !self.is_scrolling(now) {
            // A stale buffered observation for the same source would
            // replay later and clobber this fresher value.
            self.buffer.retain(|e| e.kind.key() != key);
            if self.buffer.is_empty() {
                self.window_start = None;
            }
            if let Err(err) = apply(&event) {
                self.stats.failures += 1;
                warn!(error = %err, "observer application failed");
            }
            self.stats.applied_immediate += 1;
            return ObserverAction::Applied;
        }

        if let Some(slot) = self.buffer.iter_mut().find(|e| e.kind.key() == key) {
            *slot = event;
            trace!("observer event superseded in buffer");
        } else {
            if self.window_start.is_none() {
                self.window_start = Some(now);
            }
            self.buffer.push_back(event);
            if self.buffer.len() > self.config.max_buffered {
                self.buffer.pop_front();
                self.stats.dropped += 1;
                debug!(cap = self.config.max_buffered, "observer buffer full, dropped oldest");
            }
        }
        self.stats.buffered += 1;
        ObserverAction::Buffered
    }

    /// Replay the buffered batch if it is due.
    ///
    /// The batch is due once the replay interval has elapsed since it
    /// started buffering, or immediately once scrolling has stopped. A
    /// failing `apply` is logged and the rest of the batch still runs;
    /// failures never cancel future replays.
    pub fn poll<F, E>(&mut self, now: Instant, mut apply: F) -> ReplayReport
    where
        F: FnMut(&ObserverEvent) -> Result<(), E>,
        E: fmt::Display,
    {
        let mut report = ReplayReport::default();
        let Some(start) = self.window_start else {
            return report;
        };
        if self.is_scrolling(now)
            && duration_since_or_zero(now, start) < self.config.replay_interval
        {
            return report;
        }

        self.window_start = None;
        while let Some(event) = self.buffer.pop_front() {
            self.stats.replayed += 1;
            match apply(&event) {
                Ok(()) => report.replayed += 1,
                Err(err) => {
                    report.failures += 1;
                    self.stats.failures += 1;
                    warn!(error = %err, "observer replay failed, continuing batch");
                }
            }
        }
        debug!(
            replayed = report.replayed,
            failures = report.failures,
            "observer batch replayed"
        );
        report
    }

    /// Drop all pending observations. Disposal path: nothing replays
    /// afterwards until new events arrive.
    pub fn cancel(&mut self) {
        let dropped = self.buffer.len();
        self.buffer.clear();
        self.window_start = None;
        if dropped > 0 {
            debug!(dropped, "pending observer replay cancelled");
        }
    }
}
