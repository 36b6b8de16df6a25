//! Runtime counters for the server and proxy.
//!
//! Lock-free `AtomicU64` counters incremented on the hot path and read as a
//! [`CounterSnapshot`] for logging and tests.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters shared by every connection task of one process.
#[derive(Debug)]
pub struct ServiceCounters {
    /// Connections accepted since startup.
    pub connections_accepted: AtomicU64,
    /// Frames answered (success or failure).
    pub frames_handled: AtomicU64,
    /// Frames answered with `ok: false`.
    pub failures: AtomicU64,
    /// Requests forwarded to an upstream server (proxy only).
    pub forwarded: AtomicU64,
}

impl ServiceCounters {
    /// Create a new set of zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            connections_accepted: AtomicU64::new(0),
            frames_handled: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            forwarded: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_connection(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_frame(&self, ok: bool) {
        self.frames_handled.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_forward(&self) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot all counters.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            frames_handled: self.frames_handled.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
        }
    }
}

impl Default for ServiceCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// A snapshot of counter values at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Connections accepted.
    pub connections_accepted: u64,
    /// Frames answered.
    pub frames_handled: u64,
    /// Failure envelopes sent.
    pub failures: u64,
    /// Upstream forwards.
    pub forwarded: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        assert_eq!(ServiceCounters::new().snapshot(), CounterSnapshot::default());
    }

    #[test]
    fn failures_are_a_subset_of_frames() {
        let counters = ServiceCounters::new();
        counters.record_frame(true);
        counters.record_frame(false);
        counters.record_forward();
        counters.record_connection();

        let snap = counters.snapshot();
        assert_eq!(snap.frames_handled, 2);
        assert_eq!(snap.failures, 1);
        assert_eq!(snap.forwarded, 1);
        assert_eq!(snap.connections_accepted, 1);
    }
}
