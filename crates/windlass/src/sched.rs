#![forbid(unsafe_code)]

//! Injected idle scheduling.
//!
//! The engine never talks to a platform idle API directly. It asks an
//! [`IdleScheduler`] for a callback and remembers the returned token; the
//! embedder, on receiving the callback, hands the token back together with
//! an [`IdleDeadline`] describing how much time the slice may take. Stale
//! tokens (superseded or cancelled) are ignored by the engine, so late
//! timer fires cannot double-run a fill pass.
//!
//! # Invariants
//!
//! 1. At most one token is live per scheduler: `request` supersedes any
//!    outstanding request.
//! 2. A cancelled or superseded token never fires work, even if its timer
//!    was already in flight.
//! 3. Deadlines are pull-based: work loops call
//!    [`IdleDeadline::time_remaining`] between items and stop on zero.
//!
//! [`TimerScheduler`] is the fallback for embedders without a native idle
//! callback: a plain delay timer on a background thread, delivering tokens
//! over a channel to the embedder's event loop.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::trace;

/// Identifies one scheduled idle callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScheduleToken(pub u64);

/// Source of idle callbacks.
///
/// Implementations decide *when* the callback runs; the engine only keeps
/// the token bookkeeping. Object-safe on purpose: the list owns a
/// `Box<dyn IdleScheduler>`.
pub trait IdleScheduler {
    /// Schedule one callback, superseding any outstanding request.
    fn request(&mut self) -> ScheduleToken;

    /// Best-effort cancellation of an outstanding request.
    fn cancel(&mut self, token: ScheduleToken);
}

/// Time budget for one idle slice.
///
/// Mirrors platform idle deadlines: `time_remaining` shrinks as the slice
/// runs, and `did_timeout` marks slices forced by a timeout rather than
/// real idleness (those get a larger budget so the backlog still drains on
/// busy pages).
#[derive(Debug, Clone, Copy)]
pub struct IdleDeadline {
    started: Instant,
    budget: Duration,
    did_timeout: bool,
}

impl IdleDeadline {
    /// A slice granted by real idle time.
    #[must_use]
    pub fn idle(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
            did_timeout: false,
        }
    }

    /// A slice forced by the fallback timeout.
    #[must_use]
    pub fn timed_out(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
            did_timeout: true,
        }
    }

    /// Time left in this slice, zero once exhausted.
    #[must_use]
    pub fn time_remaining(&self) -> Duration {
        self.budget.saturating_sub(self.started.elapsed())
    }

    #[must_use]
    pub fn expired(&self) -> bool {
        self.time_remaining().is_zero()
    }

    /// Whether this slice fired via timeout instead of real idleness.
    #[must_use]
    pub fn did_timeout(&self) -> bool {
        self.did_timeout
    }
}

/// Fallback scheduler: a delay timer on a background thread.
///
/// Fired tokens arrive on the channel given at construction; the embedder
/// routes them back into the engine with a deadline of its choosing.
/// Threads are short-lived (one per request, exiting after the delay) and
/// check superseding before sending, so a stale timer fire delivers
/// nothing.
pub struct TimerScheduler {
    delay: Duration,
    sender: mpsc::Sender<ScheduleToken>,
    next: u64,
    /// Token id currently allowed to fire; 0 means none.
    live: Arc<Mutex<u64>>,
}

impl TimerScheduler {
    #[must_use]
    pub fn new(delay: Duration, sender: mpsc::Sender<ScheduleToken>) -> Self {
        Self {
            delay,
            sender,
            next: 1,
            live: Arc::new(Mutex::new(0)),
        }
    }
}

impl IdleScheduler for TimerScheduler {
    fn request(&mut self) -> ScheduleToken {
        let token = ScheduleToken(self.next);
        self.next += 1;
        *self.live.lock().unwrap_or_else(|e| e.into_inner()) = token.0;

        let live = Arc::clone(&self.live);
        let sender = self.sender.clone();
        let delay = self.delay;
        thread::spawn(move || {
            thread::sleep(delay);
            let still_live =
                *live.lock().unwrap_or_else(|e| e.into_inner()) == token.0;
            if still_live {
                let _ = sender.send(token);
            }
        });
        trace!(token = token.0, "idle callback requested");
        token
    }

    fn cancel(&mut self, token: ScheduleToken) {
        let mut live = self.live.lock().unwrap_or_else(|e| e.into_inner());
        if *live == token.0 {
            *live = 0;
            trace!(token = token.0, "idle callback cancelled");
        }
    }
}

impl Drop for TimerScheduler {
    fn drop(&mut self) {
        *self.live.lock().unwrap_or_else(|e| e.into_inner()) = 0;
    }
}
