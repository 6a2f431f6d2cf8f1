//! Acquisition fan-out across all channels.
//!
//! One cycle is two passes:
//! 1. Read: one raw value per channel from the sample source
//! 2. Process: each channel's detection step, then its indicator outputs
//!
//! Reading everything first keeps the skew between the first and last
//! channel's sample instant to N raw reads, independent of how long
//! processing takes.

use crate::channel::Channel;
use crate::clock::MonotonicClock;
use crate::dispatch::TickTarget;
use crate::handoff::NewSampleFlag;
use crate::source::SampleSource;
use pulse_common::state::RunControl;
use pulse_common::time::Micros;
use pulse_common::timing::{SampleTimingStats, TimingSnapshot};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{info, trace};

/// Channels, their sample source, and optional timing statistics.
#[derive(Debug)]
pub(crate) struct Acquisition<C, S> {
    channels: Box<[C]>,
    source: S,
    timing: Option<SampleTimingStats>,
    cycles: u64,
}

impl<C: Channel, S: SampleSource> Acquisition<C, S> {
    pub(crate) fn new(channels: Vec<C>, source: S, timing: Option<SampleTimingStats>) -> Self {
        Self {
            channels: channels.into_boxed_slice(),
            source,
            timing,
            cycles: 0,
        }
    }

    /// Run one full read-then-process cycle stamped at `now`.
    pub(crate) fn run_cycle(&mut self, now: Micros) {
        for channel in self.channels.iter_mut() {
            let raw = self.source.read(channel.analog_input());
            channel.ingest_sample(raw);
        }

        for channel in self.channels.iter_mut() {
            channel.process();
            channel.update_indicators();
        }

        self.cycles += 1;

        if let Some(timing) = self.timing.as_mut() {
            timing.record_sample_time(now);
            if timing.is_window_full() {
                let snap = timing.snapshot();
                info!(
                    intervals = snap.total_intervals,
                    expected_us = snap.expected_us,
                    min_us = snap.min_us,
                    max_us = snap.max_us,
                    mean_us = snap.mean_us,
                    jitter_us = snap.jitter_us(),
                    out_of_tolerance = snap.out_of_tolerance,
                    "Sample timing report"
                );
                timing.reset();
                timing.record_sample_time(now);
            }
        }

        trace!(cycle = self.cycles, at = %now, "Acquisition cycle complete");
    }

    /// Reset every channel's transient detection state.
    pub(crate) fn reset_channels(&mut self) {
        for channel in self.channels.iter_mut() {
            channel.reset_transient_state();
        }
    }

    /// Start a new timing series; the next sample only anchors.
    pub(crate) fn restart_timing(&mut self) {
        if let Some(timing) = self.timing.as_mut() {
            timing.restart();
        }
    }

    pub(crate) fn timing_snapshot(&self) -> Option<TimingSnapshot> {
        self.timing.as_ref().map(SampleTimingStats::snapshot)
    }

    pub(crate) fn channel(&self, index: usize) -> Option<&C> {
        self.channels.get(index)
    }

    pub(crate) fn channel_mut(&mut self, index: usize) -> Option<&mut C> {
        self.channels.get_mut(index)
    }

    pub(crate) fn cycles(&self) -> u64 {
        self.cycles
    }

    pub(crate) fn source(&self) -> &S {
        &self.source
    }
}

/// State reachable from both execution contexts.
///
/// The run state and new-sample flag are atomics. Channel data sits behind
/// a mutex that the urgent context holds for the length of one cycle and
/// the normal context holds only while it touches a channel.
#[derive(Debug)]
pub(crate) struct Shared<C, S, K> {
    core: Mutex<Acquisition<C, S>>,
    pub(crate) flag: NewSampleFlag,
    pub(crate) run: RunControl,
    pub(crate) clock: K,
}

impl<C: Channel, S: SampleSource, K: MonotonicClock> Shared<C, S, K> {
    pub(crate) fn new(core: Acquisition<C, S>, run: RunControl, clock: K) -> Self {
        Self {
            core: Mutex::new(core),
            flag: NewSampleFlag::new(),
            run,
            clock,
        }
    }

    /// Lock the channel data. A panic in a previous holder does not
    /// make the channels unusable; the urgent path must never unwind.
    pub(crate) fn lock_core(&self) -> MutexGuard<'_, Acquisition<C, S>> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// One sampling cycle. Skipped entirely while paused.
    ///
    /// Returns whether the cycle ran.
    pub(crate) fn acquire_and_process_all(&self) -> bool {
        if self.run.is_paused() {
            return false;
        }
        let mut core = self.lock_core();
        // Re-check under the lock: pause() resets channels while holding it.
        if self.run.is_paused() {
            return false;
        }
        let now = self.clock.now_micros();
        core.run_cycle(now);
        self.flag.raise();
        true
    }
}

impl<C: Channel, S: SampleSource, K: MonotonicClock> TickTarget for Shared<C, S, K> {
    fn on_tick(&self) {
        self.acquire_and_process_all();
    }
}
