#![forbid(unsafe_code)]

//! Hand-cranked idle scheduling.
//!
//! Real embeddings get idle callbacks from their toolkit's event loop;
//! tests cannot wait on one. [`ManualScheduler`] only records requests
//! and hands out tokens. The test inspects the shared [`ScheduleLog`],
//! decides when "idle time" happens, and invokes the engine's fill
//! callback itself with whatever deadline the scenario calls for.

use std::cell::RefCell;
use std::rc::Rc;

use windlass::{IdleScheduler, ScheduleToken};

/// Shared request log of a [`ManualScheduler`].
#[derive(Debug, Default)]
pub struct ScheduleLog {
    /// Tokens issued, in order.
    pub issued: Vec<u64>,
    /// Tokens cancelled, in order.
    pub cancelled: Vec<u64>,
}

impl ScheduleLog {
    /// The most recently issued token, unless it was cancelled.
    #[must_use]
    pub fn outstanding(&self) -> Option<ScheduleToken> {
        let last = *self.issued.last()?;
        if self.cancelled.contains(&last) {
            None
        } else {
            Some(ScheduleToken(last))
        }
    }
}

/// Scheduler that never fires on its own.
#[derive(Debug)]
pub struct ManualScheduler {
    log: Rc<RefCell<ScheduleLog>>,
    next: u64,
}

impl ManualScheduler {
    /// The scheduler and a shared handle to its log.
    #[must_use]
    pub fn new() -> (Self, Rc<RefCell<ScheduleLog>>) {
        let log = Rc::new(RefCell::new(ScheduleLog::default()));
        (
            Self {
                log: Rc::clone(&log),
                next: 1,
            },
            log,
        )
    }
}

impl IdleScheduler for ManualScheduler {
    fn request(&mut self) -> ScheduleToken {
        let token = ScheduleToken(self.next);
        self.next += 1;
        self.log.borrow_mut().issued.push(token.0);
        token
    }

    fn cancel(&mut self, token: ScheduleToken) {
        self.log.borrow_mut().cancelled.push(token.0);
    }
}
