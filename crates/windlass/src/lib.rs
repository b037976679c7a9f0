#![forbid(unsafe_code)]

//! Windlass
//!
//! A headless windowing engine for long scrolling lists: only the items
//! near the viewport exist as real widgets, everything else is a sized
//! placeholder. The engine owns the arithmetic and the lifecycle
//! decisions; the embedding UI implements [`ListHost`] and keeps
//! ownership of actual widget construction, positioning and measurement.
//!
//! # Key Components
//!
//! - [`WindowedList`] - The facade an embedding list widget drives
//! - [`ListHost`] - The seam to the embedder: mount, place, measure
//! - [`ListModel`] - Item records plus the height/offset tree
//! - [`SizeEstimator`] / [`SizeCache`] - Heuristic sizes until real
//!   measurements arrive
//! - [`LifecycleController`] - Mount/unmount/soft-hide/suppress planning
//! - [`IdleFiller`] - Budgeted background mounting and measuring
//! - [`ObserverCoalescer`] - Resize-observer storm suppression while
//!   scrolling
//! - [`IdleScheduler`] - Injected source of idle callbacks
//!
//! # How a frame flows
//!
//! The embedder calls [`WindowedList::update`] with its scroll offset and
//! viewport height. The engine folds any pending size information into
//! the offset tree, computes the visible window, reconciles which items
//! are attached, and positions every attached widget through the host.
//! Between frames, idle slices ([`WindowedList::run_idle_fill`]) mount or
//! measure the rest of the list so scroll geometry converges from
//! estimated to exact.

pub mod coalesce;
pub mod estimate;
pub mod fenwick;
pub mod filler;
pub mod host;
pub mod lifecycle;
pub mod list;
pub mod model;
pub mod position;
pub mod sched;
pub mod scroll;

#[cfg(test)]
pub(crate) mod test_host;

pub use coalesce::{
    CoalescerConfig, ObserverAction, ObserverCoalescer, ObserverEvent, ObserverKind,
    ObserverStats, ReplayReport,
};
pub use estimate::{
    CacheStats, CachedSize, ContentShape, EstimatorConfig, ItemId, SizeCache, SizeEstimator,
};
#[cfg(feature = "persist")]
pub use estimate::MeasurementSnapshot;
pub use fenwick::OffsetTree;
pub use filler::{FillOutcome, FillRun, FillStats, FillerConfig, IdleFiller};
pub use host::{AttachError, AttachErrorKind, ListHost};
pub use lifecycle::{
    ItemFlags, LifecycleController, LifecycleState, ReconcilePass, Transition,
};
pub use list::{ListConfig, StaleObserver, UpdateSummary, WindowedList, DEFAULT_OVERSCAN};
pub use model::{ListModel, ViewportWindow, WindowingMode};
pub use position::{MountedEntry, PositionIndex};
pub use sched::{IdleDeadline, IdleScheduler, ScheduleToken, TimerScheduler};
pub use scroll::{scroll_target, Align, SmartThresholds};
