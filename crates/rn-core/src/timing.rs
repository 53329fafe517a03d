//! On-delay period timer.
//!
//! The timer is driven by explicit `Instant`s handed in by the control loop,
//! the same way sampled controllers take the current time as an argument,
//! so it can be stepped deterministically in tests.

use std::time::{Duration, Instant};

/// Fires once every `interval`, measured from the last arm or fire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodTimer {
    interval: Duration,
    started: Option<Instant>,
}

impl PeriodTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            started: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    /// Start counting from `now`.
    pub fn arm(&mut self, now: Instant) {
        self.started = Some(now);
    }

    pub fn is_armed(&self) -> bool {
        self.started.is_some()
    }

    /// Returns `true` when the interval has elapsed and re-arms from `now`.
    ///
    /// An unarmed timer arms itself and reports no expiry.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.started {
            None => {
                self.started = Some(now);
                false
            }
            Some(start) => {
                if now.saturating_duration_since(start) >= self.interval {
                    self.started = Some(now);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Time left until the next expiry, zero when unarmed or overdue.
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.started {
            None => Duration::ZERO,
            Some(start) => self
                .interval
                .saturating_sub(now.saturating_duration_since(start)),
        }
    }
}
