//! Lightweight loop timing statistics.
//!
//! The control loop records how long each fast tick and each publish step
//! takes so that a shutdown summary can show whether the cadences held.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Accumulating timer for tracking total time across multiple calls.
#[derive(Debug)]
pub struct AccumulatingTimer {
    total_ns: AtomicU64,
    max_ns: AtomicU64,
    count: AtomicU64,
}

impl Default for AccumulatingTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl AccumulatingTimer {
    pub const fn new() -> Self {
        Self {
            total_ns: AtomicU64::new(0),
            max_ns: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Record a timing measurement.
    pub fn record(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.total_ns.fetch_add(nanos, Ordering::Relaxed);
        self.max_ns.fetch_max(nanos, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total time spent (in seconds).
    pub fn total_seconds(&self) -> f64 {
        self.total_ns.load(Ordering::Relaxed) as f64 / 1e9
    }

    /// Longest single measurement (in seconds).
    pub fn max_seconds(&self) -> f64 {
        self.max_ns.load(Ordering::Relaxed) as f64 / 1e9
    }

    /// Get number of calls.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Get average time per call (in seconds).
    pub fn average_seconds(&self) -> f64 {
        let count = self.count();
        if count > 0 {
            self.total_seconds() / count as f64
        } else {
            0.0
        }
    }

    pub fn reset(&self) {
        self.total_ns.store(0, Ordering::Relaxed);
        self.max_ns.store(0, Ordering::Relaxed);
        self.count.store(0, Ordering::Relaxed);
    }
}

/// Timers shared by the fast tick and the publish step.
#[derive(Debug, Default)]
pub struct LoopTimings {
    /// Plant update + controller compute, per fast tick.
    pub tick: AccumulatingTimer,
    /// Field-device writes and alarm evaluation, per publish.
    pub publish: AccumulatingTimer,
    /// Publish steps whose write or alarm delivery failed.
    pub publish_failures: AtomicU64,
    /// Parameter changes applied to the running controller.
    pub applied_changes: AtomicU64,
    /// Parameter changes dropped as malformed or out of range.
    pub dropped_changes: AtomicU64,
    /// Alarms handed to the field device.
    pub alarms_raised: AtomicU64,
}

impl LoopTimings {
    pub fn record_publish_failure(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_applied_change(&self) {
        self.applied_changes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped_change(&self) {
        self.dropped_changes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_alarm(&self) {
        self.alarms_raised.fetch_add(1, Ordering::Relaxed);
    }

    pub fn publish_failures(&self) -> u64 {
        self.publish_failures.load(Ordering::Relaxed)
    }

    pub fn applied_changes(&self) -> u64 {
        self.applied_changes.load(Ordering::Relaxed)
    }

    pub fn dropped_changes(&self) -> u64 {
        self.dropped_changes.load(Ordering::Relaxed)
    }

    pub fn alarms_raised(&self) -> u64 {
        self.alarms_raised.load(Ordering::Relaxed)
    }
}
