#![forbid(unsafe_code)]

//! Simulated embedding for windlass integration tests.
//!
//! Nothing here renders. The harness models exactly the host behaviors
//! the engine contracts on:
//!
//! - **[`SimHost`]**: a list of editable text rows with deterministic
//!   wrap-based measurement, widget construction that can be made to
//!   fail, and editing state that survives soft-hiding but not
//!   unmounting.
//! - **[`ManualScheduler`]**: an idle scheduler that never fires on its
//!   own; tests read its log and invoke the engine's fill callback by
//!   hand, making idle-time behavior fully deterministic.
//!
//! # Quick Start
//!
//! ```ignore
//! use windlass::{ListConfig, WindowedList};
//! use windlass_harness::{ManualScheduler, SimHost};
//!
//! let (sched, log) = ManualScheduler::new();
//! let mut list = WindowedList::new(ListConfig::default(), Box::new(sched));
//! let mut host = SimHost::new();
//! for i in 0..1000 {
//!     host.push_row(&format!("row {i}"), 0);
//! }
//! list.populate(&host);
//! list.update(&mut host, 0.0, 390.0);
//! ```

pub mod sched;
pub mod sim;

pub use sched::{ManualScheduler, ScheduleLog};
pub use sim::{EditState, SimHost, SimItem, SIM_LINE_HEIGHT, SIM_ROW_MARGIN, SIM_WRAP_COLS};
