//! Cooperative progress timer
//!
//! Not a thread: the owner asks [`ProgressMonitor::poll`] whether a tick is due
//! and runs the progress callback itself, on its own context. The service loop
//! uses [`ProgressMonitor::time_until_due`] as its receive timeout.

use std::time::{Duration, Instant};
use tracing::trace;

/// Repeating tick schedule with idempotent start/stop
#[derive(Debug, Clone)]
pub struct ProgressMonitor {
    interval: Duration,

    /// Instant of the next tick; `None` while stopped
    next_due: Option<Instant>,
}

impl ProgressMonitor {
    /// Create a stopped monitor ticking every `interval`
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
        }
    }

    /// Start ticking; the first tick is due immediately
    ///
    /// Returns false if already running (the schedule is left untouched).
    pub fn start(&mut self, now: Instant) -> bool {
        if self.next_due.is_some() {
            return false;
        }
        trace!("progress monitor started");
        self.next_due = Some(now);
        true
    }

    /// Stop ticking
    ///
    /// Returns false if already stopped.
    pub fn stop(&mut self) -> bool {
        if self.next_due.take().is_some() {
            trace!("progress monitor stopped");
            true
        } else {
            false
        }
    }

    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Consume a due tick
    ///
    /// Returns true at most once per call. A late poll does not replay missed
    /// ticks; the next one is scheduled one interval after `now`.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.next_due {
            Some(due) if due <= now => {
                self.next_due = Some(now + self.interval);
                true
            }
            _ => false,
        }
    }

    /// Time left until the next tick, `None` while stopped
    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.next_due.map(|due| due.saturating_duration_since(now))
    }
}
