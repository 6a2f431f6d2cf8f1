//! Due-ness tracking for polling-mode sampling.
//!
//! Each time a sample is taken the next-due timestamp advances by exactly
//! one period from where it was, never from "now". A late poll therefore
//! does not push every later sample back, and the long-run rate stays at
//! the configured frequency.
//!
//! The due check compares signed differences of a 32-bit microsecond
//! counter, so it is only meaningful while polls arrive within 2^31 µs
//! (about 35.8 minutes) of the deadline. A longer gap while active reads
//! as "not yet due" until the counter comes round again. Pausing does not
//! have this problem because resume re-anchors.

use pulse_common::time::Micros;

/// Next-due timestamp plus the fixed period it advances by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleClock {
    period_us: u32,
    next_due: Micros,
}

impl SampleClock {
    /// First sample falls due one period after `now`.
    #[must_use]
    pub fn new(period_us: u32, now: Micros) -> Self {
        Self {
            period_us,
            next_due: now.wrapping_add(period_us),
        }
    }

    /// Re-anchor so the next sample is one period after `now`.
    ///
    /// Used on start and resume; a pause must not leave a backlog of
    /// overdue samples behind.
    pub fn anchor(&mut self, now: Micros) {
        self.next_due = now.wrapping_add(self.period_us);
    }

    /// Has `now` reached the next-due timestamp? Wraparound-safe.
    #[inline]
    #[must_use]
    pub fn is_due(&self, now: Micros) -> bool {
        now.is_reached(self.next_due)
    }

    /// If due, consume the slot and advance by one period.
    pub fn poll(&mut self, now: Micros) -> bool {
        if !self.is_due(now) {
            return false;
        }
        self.next_due = self.next_due.wrapping_add(self.period_us);
        true
    }

    /// Timestamp at which the next sample falls due.
    #[must_use]
    pub fn next_due(&self) -> Micros {
        self.next_due
    }

    /// Sample period in microseconds.
    #[must_use]
    pub fn period_us(&self) -> u32 {
        self.period_us
    }
}
