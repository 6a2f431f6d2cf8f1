//! Sample-interval statistics for timing analysis.
//!
//! Records the spacing between consecutive acquisition cycles over a fixed
//! window so that jitter and overruns of the sampling loop can be surfaced.
//! The sampler itself never detects overruns; this collector is where they
//! become visible.

use crate::time::{period_micros, Micros};
use std::time::Duration;

/// Sample-interval statistics over a fixed-size reporting window.
#[derive(Debug)]
pub struct SampleTimingStats {
    /// Intervals per report.
    window: usize,
    /// Number of intervals collected (saturates at `window`).
    interval_count: usize,
    /// Total intervals recorded since the last reset.
    total_intervals: u64,
    min_us: u32,
    max_us: u32,
    sum_us: u64,
    /// Intervals farther than `tolerance_us` from the expected period.
    out_of_tolerance: u64,
    expected_us: u32,
    tolerance_us: u32,
    /// Timestamp of the previous sample, if any.
    last_sample_at: Option<Micros>,
}

impl SampleTimingStats {
    /// Create a collector.
    ///
    /// # Arguments
    ///
    /// * `window` - Number of intervals per report.
    /// * `expected` - The nominal sample period.
    /// * `tolerance` - Allowed deviation from `expected` before an interval counts as off-period.
    #[must_use]
    pub fn new(window: usize, expected: Duration, tolerance: Duration) -> Self {
        Self {
            window: window.max(1),
            interval_count: 0,
            total_intervals: 0,
            min_us: u32::MAX,
            max_us: 0,
            sum_us: 0,
            out_of_tolerance: 0,
            expected_us: period_micros(expected),
            tolerance_us: period_micros(tolerance),
            last_sample_at: None,
        }
    }

    /// Note that a sample was taken at `now`.
    ///
    /// The first call after construction or [`restart`](Self::restart) only
    /// stores the timestamp. Returns the recorded interval otherwise.
    /// Allocation-free; safe to call from the urgent context.
    pub fn record_sample_time(&mut self, now: Micros) -> Option<u32> {
        let previous = self.last_sample_at.replace(now);
        let interval = now.as_u32().wrapping_sub(previous?.as_u32());
        self.record_interval_us(interval);
        Some(interval)
    }

    /// Record an interval in microseconds directly.
    pub fn record_interval_us(&mut self, us: u32) {
        self.interval_count = self.interval_count.saturating_add(1).min(self.window);

        self.total_intervals += 1;
        self.min_us = self.min_us.min(us);
        self.max_us = self.max_us.max(us);
        self.sum_us = self.sum_us.wrapping_add(u64::from(us));

        if us.abs_diff(self.expected_us) > self.tolerance_us {
            self.out_of_tolerance += 1;
        }
    }

    /// Forget the previous timestamp so the next sample starts a new series.
    ///
    /// Used after a pause so the gap is not counted as jitter.
    pub fn restart(&mut self) {
        self.last_sample_at = None;
    }

    /// True once `window` intervals have been collected.
    #[must_use]
    pub fn is_window_full(&self) -> bool {
        self.interval_count == self.window
    }

    /// Total intervals recorded.
    #[must_use]
    pub fn total_intervals(&self) -> u64 {
        self.total_intervals
    }

    /// Minimum observed interval.
    #[must_use]
    pub fn min(&self) -> Option<Duration> {
        (self.total_intervals > 0).then(|| Duration::from_micros(u64::from(self.min_us)))
    }

    /// Maximum observed interval.
    #[must_use]
    pub fn max(&self) -> Option<Duration> {
        (self.total_intervals > 0).then(|| Duration::from_micros(u64::from(self.max_us)))
    }

    /// Mean interval.
    #[must_use]
    pub fn mean(&self) -> Option<Duration> {
        (self.total_intervals > 0)
            .then(|| Duration::from_micros(self.sum_us / self.total_intervals))
    }

    /// Number of intervals outside the tolerance band.
    #[must_use]
    pub fn out_of_tolerance_count(&self) -> u64 {
        self.out_of_tolerance
    }

    /// Get a snapshot of current statistics.
    #[must_use]
    pub fn snapshot(&self) -> TimingSnapshot {
        let any = self.total_intervals > 0;
        TimingSnapshot {
            total_intervals: self.total_intervals,
            expected_us: self.expected_us,
            min_us: any.then_some(self.min_us),
            max_us: any.then_some(self.max_us),
            mean_us: any.then(|| self.sum_us / self.total_intervals),
            out_of_tolerance: self.out_of_tolerance,
            window_fill: self.interval_count,
        }
    }

    /// Reset all statistics, keeping the window size and expectations.
    pub fn reset(&mut self) {
        self.interval_count = 0;
        self.total_intervals = 0;
        self.min_us = u32::MAX;
        self.max_us = 0;
        self.sum_us = 0;
        self.out_of_tolerance = 0;
        self.last_sample_at = None;
    }
}

/// Immutable snapshot of timing statistics for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct TimingSnapshot {
    /// Total intervals recorded.
    pub total_intervals: u64,
    /// Nominal sample period in microseconds.
    pub expected_us: u32,
    /// Minimum interval.
    pub min_us: Option<u32>,
    /// Maximum interval.
    pub max_us: Option<u32>,
    /// Mean interval.
    pub mean_us: Option<u64>,
    /// Intervals outside the tolerance band.
    pub out_of_tolerance: u64,
    /// Intervals currently held in the window.
    pub window_fill: usize,
}

impl TimingSnapshot {
    /// Get jitter (max - min) in microseconds.
    #[must_use]
    pub fn jitter_us(&self) -> Option<u32> {
        match (self.min_us, self.max_us) {
            (Some(min), Some(max)) => Some(max - min),
            _ => None,
        }
    }
}
