#![forbid(unsafe_code)]

//! Idle-time filler: background mounting and measuring.
//!
//! Estimated heights make scroll geometry approximate until items have
//! been measured once. The filler burns idle time to close that gap,
//! walking the list from a persistent cursor in budgeted slices that fit
//! inside a frame:
//!
//! - **Defer mode**: every unmounted item is mounted and kept, so the
//!   whole list becomes real widgets over time without a long blocking
//!   pass.
//! - **Full mode**: every unmeasured item is mounted just long enough to
//!   measure, then detached again; only the measurement is kept.
//! - **None mode**: nothing to do, the synchronous pass mounts everything.
//!
//! # Decision rules
//!
//! | Situation | Behavior |
//! |-----------|----------|
//! | budget exhausted mid-pass | stop after current item, report more work |
//! | zero-budget slice | still process one item, so progress is guaranteed |
//! | slice fired by timeout | same walk, caller grants the larger budget |
//! | end of list reached | wrap once to cover items before the cursor |
//! | nothing eligible all the way around | report complete (self-cancel) |
//! | mount fails | logged, skipped, item stays eligible for the next pass |
//! | every eligible item failed | report complete, avoids a hot retry loop |
//!
//! Each eligible item is processed at most once per pass: processing flips
//! its eligibility (mounted or measured), so the cursor can wrap without
//! revisiting. The facade owns rescheduling; the filler only reports
//! whether work remains.

use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::estimate::SizeCache;
use crate::host::ListHost;
use crate::lifecycle::{LifecycleController, LifecycleState};
use crate::model::{ListModel, WindowingMode};
use crate::position::PositionIndex;
use crate::sched::IdleDeadline;

/// Default budget for a slice granted by real idle time, well under a
/// frame.
pub const DEFAULT_IDLE_BUDGET_MS: u64 = 16;
/// Default budget for the larger final slice when the fallback timeout
/// fires instead of real idleness.
pub const DEFAULT_TIMEOUT_BUDGET_MS: u64 = 50;

/// Filler tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillerConfig {
    /// Slice budget when invoked from real idle time.
    pub idle_budget: Duration,
    /// Slice budget when invoked by the fallback timeout.
    pub timeout_budget: Duration,
}

impl Default for FillerConfig {
    fn default() -> Self {
        Self {
            idle_budget: Duration::from_millis(DEFAULT_IDLE_BUDGET_MS),
            timeout_budget: Duration::from_millis(DEFAULT_TIMEOUT_BUDGET_MS),
        }
    }
}

impl FillerConfig {
    /// Deadline for one slice, honoring the timeout/idle budget split.
    #[must_use]
    pub fn slice(&self, did_timeout: bool) -> IdleDeadline {
        if did_timeout {
            IdleDeadline::timed_out(self.timeout_budget)
        } else {
            IdleDeadline::idle(self.idle_budget)
        }
    }
}

/// Whether a fill slice left work behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    /// Eligible items remain; the caller should reschedule.
    MoreWork,
    /// Nothing eligible anywhere; the filler went idle.
    Complete,
}

/// Result of one fill slice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillRun {
    pub outcome: FillOutcome,
    /// Items successfully mounted/measured in this slice.
    pub processed: usize,
    /// Scroll delta owed to measurements above the viewport top.
    pub scroll_adjust: f64,
}

/// Lifetime counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FillStats {
    /// Items mounted and kept (defer mode).
    pub filled: u64,
    /// Items measured and detached again (full mode).
    pub measured: u64,
    /// Completed passes over the whole list.
    pub passes: u64,
    /// Fill slices run.
    pub slices: u64,
}

/// Cursor-based background filler.
#[derive(Debug, Default)]
pub struct IdleFiller {
    cursor: usize,
    /// Set once a pass found nothing eligible; cleared by re-arming.
    complete: bool,
    stats: FillStats,
}

impl IdleFiller {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    #[must_use]
    pub fn stats(&self) -> FillStats {
        self.stats
    }

    /// Make the filler eligible to run again (new items, mode switch,
    /// viewport growth).
    pub fn re_arm(&mut self) {
        self.complete = false;
    }

    /// Keep the cursor pointing at the same item across an insertion.
    pub fn on_items_inserted(&mut self, at: usize, count: usize) {
        if self.cursor > at {
            self.cursor += count;
        }
        self.complete = false;
    }

    /// Keep the cursor coherent across a removal; a cursor inside the
    /// removed range clamps to its start and never revisits removed items.
    pub fn on_items_removed(&mut self, at: usize, count: usize) {
        if self.cursor >= at + count {
            self.cursor -= count;
        } else if self.cursor > at {
            self.cursor = at;
        }
    }

    /// Run one budgeted slice.
    ///
    /// Processes eligible items from the cursor until the deadline runs
    /// out, wrapping past the end of the list to cover items before the
    /// cursor. At least one item is processed per slice regardless of
    /// budget, so zero-budget deadlines still make progress.
    pub fn run<H: ListHost>(
        &mut self,
        model: &mut ListModel,
        positions: &mut PositionIndex<H::Handle>,
        cache: &mut SizeCache,
        controller: &mut LifecycleController,
        host: &mut H,
        deadline: &IdleDeadline,
        scroll_top: f64,
    ) -> FillRun {
        self.stats.slices += 1;
        let mut run = FillRun {
            outcome: FillOutcome::Complete,
            processed: 0,
            scroll_adjust: 0.0,
        };

        let mode = model.mode();
        if model.is_empty() || mode == WindowingMode::None {
            self.complete = true;
            return run;
        }
        if self.cursor >= model.len() {
            self.cursor = 0;
        }

        // Items that failed to mount in this slice; encountering one again
        // means the scan has lapped and only failures remain.
        let mut failed: Vec<usize> = Vec::new();
        loop {
            if deadline.expired() && run.processed > 0 {
                run.outcome = FillOutcome::MoreWork;
                trace!(
                    cursor = self.cursor,
                    processed = run.processed,
                    "fill slice budget exhausted"
                );
                return run;
            }

            let eligible = |rec: &crate::model::ItemRecord| match mode {
                WindowingMode::Defer => rec.state == LifecycleState::Unmounted,
                WindowingMode::Full => {
                    rec.state == LifecycleState::Unmounted && !cache.is_measured(rec.id)
                }
                WindowingMode::None => false,
            };
            let next = model
                .next_matching(self.cursor, &eligible)
                .or_else(|| model.next_matching(0, &eligible));
            let Some(index) = next else {
                self.finish_pass(run.processed, failed.len());
                return run;
            };
            if failed.contains(&index) {
                self.finish_pass(run.processed, failed.len());
                return run;
            }

            self.cursor = index;
            match controller.mount_one(model, positions, cache, host, index, scroll_top) {
                Ok((handle, adjust)) => {
                    run.processed += 1;
                    run.scroll_adjust += adjust;
                    if mode == WindowingMode::Full {
                        // Measured; the widget itself is not needed.
                        positions.remove(index);
                        host.unmount(handle);
                        model.set_state(index, LifecycleState::Unmounted);
                        self.stats.measured += 1;
                    } else {
                        host.place(handle, model.offset_of(index));
                        self.stats.filled += 1;
                    }
                }
                Err(()) => failed.push(index),
            }
            self.cursor += 1;
            if self.cursor >= model.len() {
                self.cursor = 0;
            }
        }
    }

    fn finish_pass(&mut self, processed: usize, failures: usize) {
        self.complete = true;
        self.stats.passes += 1;
        if failures > 0 {
            warn!(failures, "fill pass ended with unmountable items");
        } else {
            debug!(processed, "fill pass complete");
        }
    }
}
