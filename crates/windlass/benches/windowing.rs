//! Benchmarks for the windowing hot paths.
//!
//! Covers the per-frame work (window compute, a one-row scroll step)
//! and the background paths (resize writes, one idle fill slice). The
//! host is a no-op fixture so the numbers isolate engine cost.
//!
//! Run with: cargo bench -p windlass --bench windowing

use std::hint::black_box;
use std::time::{Duration, Instant};

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use windlass::{
    AttachError, ContentShape, IdleDeadline, IdleScheduler, ItemId, ListConfig, ListHost,
    ListModel, ScheduleToken, WindowedList, WindowingMode,
};

// =============================================================================
// Fixtures
// =============================================================================

/// Uniform 39 px rows with O(1) host operations.
struct BenchHost {
    rows: usize,
}

impl ListHost for BenchHost {
    type Handle = u64;

    fn item_count(&self) -> usize {
        self.rows
    }

    fn item_id(&self, index: usize) -> ItemId {
        ItemId(index as u64 + 1)
    }

    fn content_shape(&self, _index: usize) -> Option<ContentShape> {
        Some(ContentShape::single_line())
    }

    fn mount(&mut self, index: usize, _slot: usize) -> Result<u64, AttachError> {
        Ok(index as u64 + 1)
    }

    fn unmount(&mut self, _handle: u64) {}

    fn place(&mut self, _handle: u64, _offset_px: f64) {}

    fn set_soft_hidden(&mut self, _handle: u64, _hidden: bool) {}

    fn set_suppressed(&mut self, _handle: u64, _suppressed: bool) {}

    fn measure(&mut self, _handle: u64) -> f64 {
        39.0
    }
}

/// Hands out sequential tokens and forgets them.
struct CountingScheduler {
    next: u64,
}

impl IdleScheduler for CountingScheduler {
    fn request(&mut self) -> ScheduleToken {
        let token = ScheduleToken(self.next);
        self.next += 1;
        token
    }

    fn cancel(&mut self, _token: ScheduleToken) {}
}

fn model_of(n: usize) -> ListModel {
    let mut model = ListModel::new(WindowingMode::Full, 1);
    model.extend_items((0..n).map(|i| (ItemId(i as u64 + 1), 39.0)));
    model
}

fn engine_of(mode: WindowingMode, n: usize) -> (WindowedList<BenchHost>, BenchHost) {
    let host = BenchHost { rows: n };
    let mut list = WindowedList::new(
        ListConfig::default().with_mode(mode),
        Box::new(CountingScheduler { next: 1 }),
    );
    list.populate(&host);
    (list, host)
}

// =============================================================================
// Window math
// =============================================================================

fn bench_window_compute(c: &mut Criterion) {
    let mut group = c.benchmark_group("windowing/window_compute");
    for n in [1_000usize, 10_000, 100_000] {
        let model = model_of(n);
        let mid = model.total_height() / 2.0;
        group.bench_with_input(BenchmarkId::from_parameter(n), &model, |b, model| {
            b.iter(|| black_box(model.compute_window(black_box(mid), 390.0)))
        });
    }
    group.finish();
}

fn bench_resize(c: &mut Criterion) {
    let mut group = c.benchmark_group("windowing/resize");
    for n in [10_000usize, 100_000] {
        group.bench_function(BenchmarkId::from_parameter(n), |b| {
            let mut model = model_of(n);
            let mut i = 0usize;
            let mut grow = false;
            b.iter(|| {
                i = i.wrapping_mul(7919).wrapping_add(1) % n;
                grow = !grow;
                let px = if grow { 40.0 } else { 39.0 };
                black_box(model.resize_item(i, px, 0.0));
                black_box(model.total_height())
            })
        });
    }
    group.finish();
}

// =============================================================================
// Full engine passes
// =============================================================================

fn bench_scroll_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("windowing/scroll_step");
    for n in [10_000usize, 100_000] {
        group.bench_function(BenchmarkId::from_parameter(n), |b| {
            let (mut list, mut host) = engine_of(WindowingMode::Full, n);
            let max_scroll = list.total_height() - 390.0;
            let mut scroll = 0.0;
            list.update(&mut host, scroll, 390.0);
            b.iter(|| {
                // One-row advance: window shifts by one index per pass.
                scroll += 39.0;
                if scroll > max_scroll {
                    scroll = 0.0;
                }
                black_box(list.update(&mut host, scroll, 390.0))
            })
        });
    }
    group.finish();
}

fn bench_idle_fill(c: &mut Criterion) {
    let mut group = c.benchmark_group("windowing/idle_fill");
    group.throughput(Throughput::Elements(1_000));
    group.bench_function("defer_slice_1k", |b| {
        b.iter_batched(
            || {
                let (mut list, mut host) = engine_of(WindowingMode::Defer, 1_000);
                list.update(&mut host, 0.0, 390.0);
                (list, host)
            },
            |(mut list, mut host)| {
                let deadline = IdleDeadline::idle(Duration::from_secs(1));
                black_box(list.run_idle_fill(
                    &mut host,
                    ScheduleToken(1),
                    &deadline,
                    Instant::now(),
                ))
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_window_compute,
    bench_resize,
    bench_scroll_step,
    bench_idle_fill,
);
criterion_main!(benches);
