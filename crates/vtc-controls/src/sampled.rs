//! Deadline scheduling for the publish cadence.
//!
//! The clock fires when `now >= next_deadline` and then schedules the next
//! deadline relative to the time it actually fired (`now + period`), not to
//! the missed deadline. A late publish therefore shifts later deadlines
//! instead of accumulating drift, and missed windows are never caught up.
//!
//! Generic over the time type so the same clock drives simulated time
//! (`f64` seconds) and wall-clock time (`Instant` + `Duration`).

use std::ops::Add;

/// Absolute-deadline clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeadlineClock<T, D> {
    period: D,
    next_deadline: T,
}

impl<T, D> DeadlineClock<T, D>
where
    T: Copy + PartialOrd + Add<D, Output = T>,
    D: Copy,
{
    /// A clock whose first deadline is `start`, so the first check fires.
    pub fn new(period: D, start: T) -> Self {
        Self {
            period,
            next_deadline: start,
        }
    }

    pub fn period(&self) -> D {
        self.period
    }

    pub fn next_deadline(&self) -> T {
        self.next_deadline
    }

    pub fn is_due(&self, now: T) -> bool {
        now >= self.next_deadline
    }

    /// Record a firing at `now`.
    pub fn fire(&mut self, now: T) {
        self.next_deadline = now + self.period;
    }

    /// Fire if due; returns whether it fired.
    pub fn poll(&mut self, now: T) -> bool {
        if self.is_due(now) {
            self.fire(now);
            true
        } else {
            false
        }
    }
}
