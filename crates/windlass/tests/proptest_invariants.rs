//! Property-based invariant tests for the windowing engine.
//!
//! These verify structural invariants that must hold for **any** input:
//!
//! 1. Window indices are ordered and in bounds for arbitrary geometry.
//! 2. Offsets stay exact prefix sums of heights through arbitrary
//!    resizes.
//! 3. Total height tracks content exactly: estimates reserve space, and
//!    mounting rows whose content never changed moves nothing.
//! 4. Attached widgets stay in ascending row order through arbitrary
//!    edit sequences, and the attached set matches the window.
//! 5. Idle fill terminates under arbitrary slice budgets, touching each
//!    row exactly once.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use proptest::prelude::*;
use windlass::{
    FillOutcome, IdleDeadline, ItemId, ListConfig, ListHost, ListModel, ScheduleToken,
    WindowedList, WindowingMode,
};
use windlass_harness::{ManualScheduler, ScheduleLog, SimHost};

// ── Helpers ─────────────────────────────────────────────────────────────

/// Heights in exact half-pixel steps, so prefix sums carry no float
/// error and boundary lookups can be asserted exactly.
fn half_px() -> impl Strategy<Value = f64> {
    (2u32..600).prop_map(|n| f64::from(n) / 2.0)
}

fn model_with(mode: WindowingMode, overscan: usize, heights: &[f64]) -> ListModel {
    let mut model = ListModel::new(mode, overscan);
    for (i, &px) in heights.iter().enumerate() {
        model.insert_item(i, ItemId(i as u64 + 1), px);
    }
    model
}

fn sim_engine(
    mode: WindowingMode,
    host: &SimHost,
) -> (WindowedList<SimHost>, Rc<RefCell<ScheduleLog>>) {
    let (sched, log) = ManualScheduler::new();
    let mut list = WindowedList::new(ListConfig::default().with_mode(mode), Box::new(sched));
    list.populate(host);
    (list, log)
}

/// One random host edit, applied to the host first and the engine
/// second, the order the notification contract requires.
#[derive(Debug, Clone)]
enum EditOp {
    Insert { at: usize, chars: usize },
    Remove { at: usize },
    MoveRow { from: usize, to: usize },
    Scroll { top: f64 },
}

fn edit_ops() -> impl Strategy<Value = Vec<EditOp>> {
    let op = prop_oneof![
        (any::<usize>(), 0usize..200).prop_map(|(at, chars)| EditOp::Insert { at, chars }),
        any::<usize>().prop_map(|at| EditOp::Remove { at }),
        (any::<usize>(), any::<usize>()).prop_map(|(from, to)| EditOp::MoveRow { from, to }),
        (0.0f64..10_000.0).prop_map(|top| EditOp::Scroll { top }),
    ];
    proptest::collection::vec(op, 0..20)
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Window indices are ordered and in bounds
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    /// The window never dangles: all four indices are ordered and inside
    /// the list, for any scroll position including negative and far past
    /// the content. An empty list is the only case with no window.
    #[test]
    fn window_indices_are_ordered_and_in_bounds(
        heights in proptest::collection::vec(1.0f64..500.0, 0..60),
        scroll in -1000.0f64..100_000.0,
        viewport in 0.0f64..2000.0,
        overscan in 0usize..4,
    ) {
        let model = model_with(WindowingMode::Full, overscan, &heights);
        match model.compute_window(scroll, viewport) {
            None => prop_assert!(heights.is_empty()),
            Some(w) => {
                prop_assert!(!heights.is_empty());
                prop_assert!(w.overscan_start <= w.start);
                prop_assert!(w.start <= w.end);
                prop_assert!(w.end <= w.overscan_end);
                prop_assert!(w.overscan_end < heights.len());
            }
        }
    }

    /// The visible range actually overlaps the viewport: the first
    /// visible item ends below the viewport top, and the last starts
    /// above its bottom (when the viewport is inside the content).
    #[test]
    fn visible_range_overlaps_the_viewport(
        heights in proptest::collection::vec(half_px(), 1..60),
        scroll_frac in 0.0f64..1.0,
        viewport in 1.0f64..2000.0,
    ) {
        let model = model_with(WindowingMode::Full, 1, &heights);
        let total = model.total_height();
        let scroll = (total - viewport).max(0.0) * scroll_frac;
        let (first, last) = model.visible_range(scroll, viewport).unwrap();
        prop_assert!(model.offset_of(first) + model.height_of(first) > scroll);
        prop_assert!(model.offset_of(last) < scroll + viewport);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Offsets stay exact prefix sums through resizes
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    /// After any sequence of resizes, every offset equals the sum of the
    /// heights above it, the total equals the sum of all heights, and a
    /// lookup at an item's top edge finds that item.
    #[test]
    fn offsets_stay_prefix_sums_after_resizes(
        heights in proptest::collection::vec(half_px(), 1..50),
        edits in proptest::collection::vec((any::<usize>(), half_px()), 0..30),
    ) {
        let mut model = model_with(WindowingMode::Full, 1, &heights);
        for (seed, px) in edits {
            let index = seed % model.len();
            model.resize_item(index, px, 0.0);
        }

        let mut acc = 0.0;
        for i in 0..model.len() {
            prop_assert_eq!(model.offset_of(i), acc);
            prop_assert_eq!(model.index_at(acc), Some(i));
            acc += model.height_of(i);
        }
        prop_assert_eq!(model.total_height(), acc);
    }

    /// Resize compensation fires exactly when the resized item sits at
    /// or above the viewport top, and reports exactly the size delta.
    #[test]
    fn resize_reports_the_delta_iff_above_the_viewport(
        heights in proptest::collection::vec(half_px(), 1..50),
        seed in any::<usize>(),
        new_px in half_px(),
        scroll in 0.0f64..5000.0,
    ) {
        let mut model = model_with(WindowingMode::Full, 1, &heights);
        let index = seed % model.len();
        let bottom = model.offset_of(index) + model.height_of(index);
        let old_px = model.height_of(index);

        let adjust = model.resize_item(index, new_px, scroll);
        if bottom <= scroll {
            prop_assert_eq!(adjust, new_px - old_px);
        } else {
            prop_assert_eq!(adjust, 0.0);
        }
        prop_assert_eq!(model.height_of(index), new_px);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Total height tracks content exactly
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    /// Shape-derived estimates reserve exactly the rendered height for
    /// the simulated host, so the total matches the sum of row heights
    /// from population on, and mounting (measuring) rows whose content
    /// never changed moves nothing.
    #[test]
    fn total_height_is_the_sum_of_row_heights(
        lens in proptest::collection::vec(0usize..240, 1..40),
        scroll in 0.0f64..50_000.0,
    ) {
        let mut host = SimHost::new();
        for &n in &lens {
            host.push_row(&"x".repeat(n), 0);
        }
        let expected: f64 = (0..host.item_count()).map(|i| host.row_height(i)).sum();

        let (mut list, _log) = sim_engine(WindowingMode::Full, &host);
        prop_assert_eq!(list.total_height(), expected);

        list.update(&mut host, scroll, 390.0);
        prop_assert_eq!(list.total_height(), expected);
    }

    /// Inserting rows grows the total by exactly the sum of their
    /// heights, regardless of where they land.
    #[test]
    fn insertion_adds_exactly_the_new_heights(
        lens in proptest::collection::vec(0usize..240, 1..30),
        extra in proptest::collection::vec(0usize..240, 1..10),
        at_seed in any::<usize>(),
    ) {
        let mut host = SimHost::new();
        for &n in &lens {
            host.push_row(&"x".repeat(n), 0);
        }
        let (mut list, _log) = sim_engine(WindowingMode::Full, &host);
        let before = list.total_height();

        let at = at_seed % (host.item_count() + 1);
        let mut added = 0.0;
        for (k, &n) in extra.iter().enumerate() {
            host.insert_row(at + k, &"x".repeat(n), 0);
            added += host.row_height(at + k);
        }
        list.on_items_inserted(&host, at, extra.len());
        prop_assert_eq!(list.total_height(), before + added);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Slot order survives arbitrary edit sequences
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    /// Through any interleaving of inserts, removes, moves and scrolls,
    /// attached widgets stay in ascending row order and the attached set
    /// is exactly the overscan window.
    #[test]
    fn attached_set_tracks_the_window_through_edits(
        start_rows in 1usize..30,
        ops in edit_ops(),
    ) {
        let mut host = SimHost::with_uniform_rows(start_rows);
        let (mut list, _log) = sim_engine(WindowingMode::Full, &host);
        let mut scroll = 0.0;
        list.update(&mut host, scroll, 390.0);

        for op in ops {
            match op {
                EditOp::Insert { at, chars } => {
                    let at = at % (host.item_count() + 1);
                    host.insert_row(at, &"x".repeat(chars), 0);
                    list.on_items_inserted(&host, at, 1);
                }
                EditOp::Remove { at } => {
                    if host.item_count() == 0 {
                        continue;
                    }
                    let at = at % host.item_count();
                    host.remove_rows(at, 1);
                    list.on_items_removed(&mut host, at, 1);
                }
                EditOp::MoveRow { from, to } => {
                    if host.item_count() < 2 {
                        continue;
                    }
                    let from = from % host.item_count();
                    let to = to % host.item_count();
                    if from == to {
                        continue;
                    }
                    host.move_row(from, to);
                    list.on_item_moved(from, to);
                }
                EditOp::Scroll { top } => scroll = top,
            }

            if let Some(summary) = list.update(&mut host, scroll, 390.0) {
                host.assert_slots_sorted();
                let w = summary.window;
                for index in w.overscan_start..=w.overscan_end {
                    prop_assert!(host.is_attached(index));
                }
                prop_assert_eq!(
                    host.attached_count(),
                    w.overscan_end - w.overscan_start + 1
                );
            } else {
                prop_assert_eq!(host.item_count(), 0);
            }
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Idle fill terminates under arbitrary budgets
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    /// Whatever mix of starved and generous slices the scheduler grants,
    /// the filler reaches quiescence in bounded slices and every row is
    /// mounted exactly once along the way.
    #[test]
    fn idle_fill_terminates_with_each_row_touched_once(
        n in 1usize..50,
        defer in any::<bool>(),
        budgets in proptest::collection::vec(any::<bool>(), 0..8),
    ) {
        let mode = if defer {
            WindowingMode::Defer
        } else {
            WindowingMode::Full
        };
        let mut host = SimHost::with_uniform_rows(n);
        let (mut list, log) = sim_engine(mode, &host);
        list.update(&mut host, 0.0, 390.0);
        let attached_after_reconcile = host.attached_count();

        let now = Instant::now();
        let mut fired = 0usize;
        let mut cursor = 0usize;
        let mut last = None;
        loop {
            let next = log.borrow().issued.get(cursor).copied();
            let Some(raw) = next else { break };
            cursor += 1;
            if log.borrow().cancelled.contains(&raw) {
                continue;
            }
            let starved = budgets.get(fired % budgets.len().max(1)).copied().unwrap_or(false);
            let deadline = if starved {
                IdleDeadline::idle(Duration::ZERO)
            } else {
                IdleDeadline::idle(Duration::from_secs(5))
            };
            last = Some(list.run_idle_fill(&mut host, ScheduleToken(raw), &deadline, now));
            fired += 1;
            prop_assert!(fired <= 3 * n + 20, "fill did not reach quiescence");
        }

        if let Some(run) = last {
            prop_assert_eq!(run.outcome, FillOutcome::Complete);
        }
        prop_assert_eq!(host.mounts, n, "every row mounted exactly once");
        if defer {
            prop_assert_eq!(host.attached_count(), n);
        } else {
            prop_assert_eq!(host.attached_count(), attached_after_reconcile);
        }
    }
}
