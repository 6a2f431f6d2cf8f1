//! Fixed-rate sampling scheduler.
//!
//! The scheduler drives every channel at one constant sampling frequency and
//! hands "a new sample is ready" over to the caller's poll loop:
//! 1. Urgent context: read all channels, process all channels, raise the flag
//! 2. Normal context: [`PulseScheduler::poll_and_clear`] observes and clears it
//!
//! In interrupt mode a [`PeriodicTrigger`] calls the acquisition cycle. In
//! polling mode `poll_and_clear` checks the monotonic clock itself and runs
//! the cycle inline when a sample is due.

use crate::acquisition::{Acquisition, Shared};
use crate::channel::{Channel, SensorChannel};
use crate::clock::{MonotonicClock, SystemClock};
use crate::dispatch::{self, Registration, TickTarget};
use crate::sample_clock::SampleClock;
use crate::source::SampleSource;
use crate::trigger::{NoTrigger, PeriodicTrigger, TickHandler};
use pulse_common::config::{SamplerConfig, SamplingMode, TimingAnalysisConfig, DEFAULT_SAMPLE_RATE_HZ};
use pulse_common::error::{PulseError, PulseResult};
use pulse_common::state::{RunControl, RunState};
use pulse_common::time::Micros;
use pulse_common::timing::{SampleTimingStats, TimingSnapshot};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Upper bound on the sampling frequency; one sample per microsecond tick.
const MAX_SAMPLE_RATE_HZ: u32 = 1_000_000;

/// Multi-channel fixed-rate sampler.
///
/// `T` is the periodic trigger for interrupt mode; the default
/// [`NoTrigger`] selects polling mode.
pub struct PulseScheduler<C, S, K = SystemClock, T = NoTrigger> {
    // Field order is drop order: stop the trigger before the slot is
    // released and before the shared state can go away.
    trigger: Option<T>,
    registration: Option<Registration>,
    shared: Arc<Shared<C, S, K>>,
    sample_clock: SampleClock,
    period: Duration,
    channel_count: usize,
    started: bool,
}

impl<C, S, K, T> std::fmt::Debug for PulseScheduler<C, S, K, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PulseScheduler")
            .field("mode", &self.mode())
            .field("state", &self.shared.run.state())
            .field("channel_count", &self.channel_count)
            .field("period", &self.period)
            .field("next_due", &self.sample_clock.next_due())
            .field("started", &self.started)
            .finish_non_exhaustive()
    }
}

impl<S: SampleSource + 'static> PulseScheduler<SensorChannel, S> {
    /// Polling-mode scheduler with `channel_count` reference channels on
    /// analog inputs `0..channel_count`, at the default sampling frequency.
    ///
    /// # Errors
    ///
    /// Returns [`PulseError::Config`] if `channel_count` is zero or exceeds
    /// the 256 addressable analog inputs.
    pub fn initialize(channel_count: usize, source: S) -> PulseResult<Self> {
        let channels = (0..channel_count)
            .map(|index| u8::try_from(index).map(SensorChannel::new))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| {
                PulseError::Config(format!(
                    "{channel_count} channels exceed the 256 analog inputs"
                ))
            })?;
        SchedulerBuilder::new(channels, source).build()
    }
}

impl<C, S, K, T> PulseScheduler<C, S, K, T> {
    /// Which context drives the acquisition cycle.
    pub fn mode(&self) -> SamplingMode {
        if self.trigger.is_some() {
            SamplingMode::Interrupt
        } else {
            SamplingMode::Polling
        }
    }

    /// Number of channels; fixed at construction.
    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Sample period derived from the sampling frequency.
    pub fn sample_period(&self) -> Duration {
        self.period
    }

    /// Current run state.
    pub fn state(&self) -> RunState {
        self.shared.run.state()
    }

    /// Is sampling paused?
    pub fn is_paused(&self) -> bool {
        self.shared.run.is_paused()
    }

    /// Number of run-state changes so far.
    pub fn transition_count(&self) -> u64 {
        self.shared.run.transition_count()
    }

    /// Timestamp at which the next polling-mode sample falls due.
    pub fn next_due(&self) -> Micros {
        self.sample_clock.next_due()
    }

    /// Has `now` reached the next-due timestamp? Wraparound-safe.
    ///
    /// Only meaningful in polling mode.
    pub fn is_due(&self, now: Micros) -> bool {
        self.sample_clock.is_due(now)
    }

    /// The installed trigger, in interrupt mode.
    pub fn trigger(&self) -> Option<&T> {
        self.trigger.as_ref()
    }
}

impl<C, S, K, T> PulseScheduler<C, S, K, T>
where
    C: Channel + 'static,
    S: SampleSource + 'static,
    K: MonotonicClock + 'static,
    T: PeriodicTrigger,
{
    /// Begin sampling.
    ///
    /// Polling mode only anchors the sample clock. Interrupt mode installs
    /// the trigger; if that fails the scheduler stays paused.
    ///
    /// # Errors
    ///
    /// Returns an error if already started, if the trigger cannot be
    /// installed, or [`PulseError::InstanceConflict`] if the trigger needs
    /// the global dispatch slot and another scheduler holds it.
    pub fn start(&mut self) -> PulseResult<()> {
        if self.started {
            return Err(PulseError::Config("scheduler already started".into()));
        }

        let now = self.shared.clock.now_micros();
        self.sample_clock.anchor(now);
        self.shared.lock_core().restart_timing();

        let Some(trigger) = self.trigger.as_mut() else {
            self.started = true;
            self.shared.run.force(RunState::Active);
            info!(
                mode = "polling",
                channels = self.channel_count,
                period_us = self.sample_clock.period_us(),
                "Sampling started"
            );
            return Ok(());
        };

        if trigger.needs_global_dispatch() {
            let target: Arc<dyn TickTarget> = self.shared.clone();
            match dispatch::register(&target) {
                Ok(registration) => self.registration = Some(registration),
                Err(e) => {
                    warn!(error = %e, "Tick dispatch slot unavailable; staying paused");
                    self.shared.run.force(RunState::Paused);
                    return Err(e);
                }
            }
        }

        let shared = Arc::clone(&self.shared);
        let tick: TickHandler = Arc::new(move || {
            shared.acquire_and_process_all();
        });

        if let Err(e) = trigger.install(self.period, tick) {
            warn!(error = %e, "Trigger installation failed; staying paused");
            self.registration = None;
            self.shared.run.force(RunState::Paused);
            return Err(e);
        }

        self.started = true;
        self.shared.run.force(RunState::Active);
        info!(
            mode = "interrupt",
            channels = self.channel_count,
            period_us = self.sample_clock.period_us(),
            "Sampling started"
        );
        Ok(())
    }

    /// Report whether a sample completed since the last call, and clear it.
    ///
    /// Always `false` while paused. Consecutive cycles between two calls
    /// coalesce into one `true`. In polling mode this is also where due
    /// samples are taken.
    pub fn poll_and_clear(&mut self) -> bool {
        if self.shared.run.is_paused() {
            return false;
        }

        match &self.trigger {
            Some(trigger) => trigger.critical_section(|| self.shared.flag.take()),
            None => {
                let now = self.shared.clock.now_micros();
                if !self.sample_clock.poll(now) {
                    return false;
                }
                self.shared.acquire_and_process_all();
                self.shared.flag.take()
            }
        }
    }

    /// Run one acquisition cycle now, from whatever context calls it.
    ///
    /// This is what the trigger calls on every tick. Returns `false`
    /// without touching any channel while paused.
    pub fn acquire_and_process_all(&self) -> bool {
        self.shared.acquire_and_process_all()
    }

    /// Stop sampling and reset every channel's transient state.
    ///
    /// # Errors
    ///
    /// If the trigger cannot be suppressed the scheduler keeps its prior
    /// state and the error is returned.
    pub fn pause(&mut self) -> PulseResult<()> {
        if let Some(trigger) = self.trigger.as_mut() {
            if let Err(e) = trigger.suppress() {
                warn!(error = %e, state = %self.shared.run.state(), "Pause failed; state unchanged");
                return Err(e);
            }
        }

        self.shared.run.force(RunState::Paused);
        self.shared.lock_core().reset_channels();
        self.shared.flag.clear();
        info!(channels = self.channel_count, "Sampling paused");
        Ok(())
    }

    /// Resume sampling after [`pause`](Self::pause).
    ///
    /// The next sample falls due one full period from now; no backlog of
    /// missed samples is replayed.
    ///
    /// # Errors
    ///
    /// If the trigger cannot be restored the scheduler stays paused and the
    /// error is returned.
    pub fn resume(&mut self) -> PulseResult<()> {
        if let Some(trigger) = self.trigger.as_mut() {
            if let Err(e) = trigger.restore() {
                warn!(error = %e, "Resume failed; staying paused");
                self.shared.run.force(RunState::Paused);
                return Err(e);
            }
        }

        let now = self.shared.clock.now_micros();
        self.sample_clock.anchor(now);
        self.shared.lock_core().restart_timing();
        self.shared.run.force(RunState::Active);
        info!(next_due = %self.sample_clock.next_due(), "Sampling resumed");
        Ok(())
    }

    /// Total acquisition cycles run.
    pub fn cycle_count(&self) -> u64 {
        self.shared.lock_core().cycles()
    }

    /// Timing statistics, if timing analysis is enabled.
    pub fn timing(&self) -> Option<TimingSnapshot> {
        self.shared.lock_core().timing_snapshot()
    }

    /// Borrow the sample source.
    pub fn with_source<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(self.shared.lock_core().source())
    }

    /// Borrow channel `index`, or `None` if out of range.
    pub fn with_channel<R>(&self, index: usize, f: impl FnOnce(&C) -> R) -> Option<R> {
        self.shared.lock_core().channel(index).map(f)
    }

    /// Mutably borrow channel `index`, or `None` if out of range.
    pub fn with_channel_mut<R>(&self, index: usize, f: impl FnOnce(&mut C) -> R) -> Option<R> {
        self.shared.lock_core().channel_mut(index).map(f)
    }

    fn configure_channel(&self, index: usize, setting: &'static str, f: impl FnOnce(&mut C)) {
        if self.with_channel_mut(index, f).is_none() {
            trace!(
                index,
                channel_count = self.channel_count,
                setting,
                "Ignoring setting for out-of-range channel"
            );
        }
    }

    /// Wire channel `index` to `input`. Out-of-range indices are ignored.
    pub fn set_analog_input(&self, index: usize, input: u8) {
        self.configure_channel(index, "analog_input", |c| c.set_analog_input(input));
    }

    /// Blink `output` on each beat of channel `index`.
    pub fn blink_on_pulse(&self, index: usize, output: u8) {
        self.configure_channel(index, "blink_output", |c| c.set_blink_output(output));
    }

    /// Fade `output` on each beat of channel `index`.
    pub fn fade_on_pulse(&self, index: usize, output: u8) {
        self.configure_channel(index, "fade_output", |c| c.set_fade_output(output));
    }

    /// Set the detection threshold of channel `index`.
    pub fn set_threshold(&self, index: usize, threshold: i32) {
        self.configure_channel(index, "threshold", |c| c.set_threshold(threshold));
    }

    /// Last raw value of channel `index`.
    pub fn latest_sample(&self, index: usize) -> Option<i32> {
        self.with_channel(index, Channel::latest_sample)
    }

    /// Peak-to-trough spread of channel `index` since its last reset.
    pub fn pulse_amplitude(&self, index: usize) -> Option<i32> {
        self.with_channel(index, Channel::pulse_amplitude)
    }

    /// Heart rate reported by channel `index`.
    pub fn beats_per_minute(&self, index: usize) -> Option<i32> {
        self.with_channel(index, Channel::beats_per_minute)
    }

    /// Milliseconds between the last two beats of channel `index`.
    pub fn inter_beat_interval_ms(&self, index: usize) -> Option<i32> {
        self.with_channel(index, Channel::inter_beat_interval_ms)
    }

    /// Timestamp of the most recent beat of channel `index`, in
    /// milliseconds.
    pub fn last_beat_time(&self, index: usize) -> Option<u32> {
        self.with_channel(index, Channel::last_beat_time)
    }

    /// Read-and-clear the beat-start latch of channel `index`.
    /// `false` when out of range.
    pub fn saw_start_of_beat(&self, index: usize) -> bool {
        self.with_channel_mut(index, Channel::saw_start_of_beat)
            .unwrap_or(false)
    }

    /// `false` when out of range.
    pub fn is_inside_beat(&self, index: usize) -> bool {
        self.with_channel(index, Channel::is_inside_beat)
            .unwrap_or(false)
    }
}

/// Builder for [`PulseScheduler`].
pub struct SchedulerBuilder<C, S, K = SystemClock, T = NoTrigger> {
    channels: Vec<C>,
    source: S,
    clock: K,
    trigger: Option<T>,
    sample_rate_hz: u32,
    timing: TimingAnalysisConfig,
}

impl<C: Channel, S: SampleSource> SchedulerBuilder<C, S> {
    /// Start from the given channels and source: polling mode, system clock,
    /// default sampling frequency, timing analysis off.
    pub fn new(channels: Vec<C>, source: S) -> Self {
        Self {
            channels,
            source,
            clock: SystemClock::new(),
            trigger: None,
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            timing: TimingAnalysisConfig::default(),
        }
    }
}

impl<C, S, K, T> SchedulerBuilder<C, S, K, T> {
    /// Set the sampling frequency.
    pub fn sample_rate_hz(mut self, hz: u32) -> Self {
        self.sample_rate_hz = hz;
        self
    }

    /// Set timing analysis.
    pub fn timing_analysis(mut self, timing: TimingAnalysisConfig) -> Self {
        self.timing = timing;
        self
    }

    /// Take frequency and timing analysis from a loaded configuration.
    ///
    /// Channels and mode stay with the caller, who chose the channel type
    /// and the trigger.
    pub fn config(self, config: &SamplerConfig) -> Self {
        self.sample_rate_hz(config.sample_rate_hz)
            .timing_analysis(config.timing_analysis.clone())
    }

    /// Use another monotonic clock.
    pub fn clock<K2: MonotonicClock>(self, clock: K2) -> SchedulerBuilder<C, S, K2, T> {
        SchedulerBuilder {
            channels: self.channels,
            source: self.source,
            clock,
            trigger: self.trigger,
            sample_rate_hz: self.sample_rate_hz,
            timing: self.timing,
        }
    }

    /// Drive sampling from `trigger` (interrupt mode).
    pub fn trigger<T2: PeriodicTrigger>(self, trigger: T2) -> SchedulerBuilder<C, S, K, T2> {
        SchedulerBuilder {
            channels: self.channels,
            source: self.source,
            clock: self.clock,
            trigger: Some(trigger),
            sample_rate_hz: self.sample_rate_hz,
            timing: self.timing,
        }
    }
}

impl<C, S, K, T> SchedulerBuilder<C, S, K, T>
where
    C: Channel,
    S: SampleSource,
    K: MonotonicClock,
    T: PeriodicTrigger,
{
    /// Build a paused scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`PulseError::Config`] if there are no channels, the sampling
    /// frequency is out of range, or an enabled timing window is empty.
    pub fn build(self) -> PulseResult<PulseScheduler<C, S, K, T>> {
        if self.channels.is_empty() {
            return Err(PulseError::Config("at least one channel is required".into()));
        }
        if self.sample_rate_hz == 0 || self.sample_rate_hz > MAX_SAMPLE_RATE_HZ {
            return Err(PulseError::Config(format!(
                "sample rate must be in 1..={MAX_SAMPLE_RATE_HZ} Hz, got {}",
                self.sample_rate_hz
            )));
        }
        if self.timing.enabled && self.timing.window == 0 {
            return Err(PulseError::Config("timing window must be at least 1".into()));
        }

        let period_us = MAX_SAMPLE_RATE_HZ / self.sample_rate_hz;
        let period = Duration::from_micros(u64::from(period_us));
        let timing = self
            .timing
            .enabled
            .then(|| SampleTimingStats::new(self.timing.window, period, self.timing.tolerance));

        let channel_count = self.channels.len();
        let now = self.clock.now_micros();
        let core = Acquisition::new(self.channels, self.source, timing);
        let shared = Arc::new(Shared::new(core, RunControl::new(RunState::Paused), self.clock));

        debug!(
            channel_count,
            period_us,
            interrupt = self.trigger.is_some(),
            "Scheduler built"
        );

        Ok(PulseScheduler {
            trigger: self.trigger,
            registration: None,
            shared,
            sample_clock: SampleClock::new(period_us, now),
            period,
            channel_count,
            started: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::source::{SimulatedSource, Waveform};
    use crate::trigger::SimulatedTrigger;

    fn script(values: &[i32]) -> SimulatedSource {
        SimulatedSource::new(Waveform::Script(values.to_vec()))
    }

    fn polling(
        channels: usize,
        clock: &ManualClock,
    ) -> PulseScheduler<SensorChannel, SimulatedSource, ManualClock> {
        let channels = (0..channels)
            .map(|i| SensorChannel::new(u8::try_from(i).unwrap()))
            .collect();
        SchedulerBuilder::new(channels, script(&[500, 600, 700]))
            .clock(clock.clone())
            .build()
            .unwrap()
    }

    fn interrupt(
        trigger: &SimulatedTrigger,
    ) -> PulseScheduler<SensorChannel, SimulatedSource, ManualClock, SimulatedTrigger> {
        SchedulerBuilder::new(vec![SensorChannel::new(0)], script(&[500, 600, 700]))
            .clock(ManualClock::default())
            .trigger(trigger.clone())
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_rejects_bad_input() {
        let empty: Vec<SensorChannel> = Vec::new();
        assert!(SchedulerBuilder::new(empty, script(&[0])).build().is_err());

        let zero_rate = SchedulerBuilder::new(vec![SensorChannel::new(0)], script(&[0]))
            .sample_rate_hz(0)
            .build();
        assert!(matches!(zero_rate, Err(PulseError::Config(_))));
    }

    #[test]
    fn test_initialize_defaults() {
        let scheduler = PulseScheduler::initialize(3, script(&[0])).unwrap();
        assert_eq!(scheduler.channel_count(), 3);
        assert_eq!(scheduler.mode(), SamplingMode::Polling);
        assert_eq!(scheduler.sample_period(), Duration::from_millis(2));
        assert!(scheduler.is_paused());
        assert_eq!(scheduler.with_channel(2, Channel::analog_input), Some(2));

        let widest = PulseScheduler::initialize(256, script(&[0])).unwrap();
        assert_eq!(widest.with_channel(255, Channel::analog_input), Some(255));
        assert!(matches!(
            PulseScheduler::initialize(257, script(&[0])),
            Err(PulseError::Config(_))
        ));
    }

    #[test]
    fn test_polling_end_to_end() {
        let clock = ManualClock::default();
        let mut scheduler = polling(2, &clock);
        scheduler.start().unwrap();
        assert_eq!(scheduler.next_due(), Micros(2000));

        clock.set(Micros(1500));
        assert!(!scheduler.poll_and_clear());
        assert_eq!(scheduler.cycle_count(), 0);

        clock.set(Micros(2100));
        assert!(scheduler.poll_and_clear());
        assert_eq!(scheduler.next_due(), Micros(4000));
        assert_eq!(scheduler.latest_sample(0), Some(500));
        assert_eq!(scheduler.latest_sample(1), Some(500));

        // Same instant: nothing new.
        assert!(!scheduler.poll_and_clear());
        assert_eq!(scheduler.cycle_count(), 1);
    }

    #[test]
    fn test_start_twice_fails() {
        let clock = ManualClock::default();
        let mut scheduler = polling(1, &clock);
        scheduler.start().unwrap();
        assert!(scheduler.start().is_err());
        assert_eq!(scheduler.state(), RunState::Active);
    }

    #[test]
    fn test_paused_poll_is_false() {
        let clock = ManualClock::default();
        let mut scheduler = polling(1, &clock);
        clock.set(Micros(10_000));
        // Never started.
        assert!(!scheduler.poll_and_clear());
        assert!(!scheduler.acquire_and_process_all());
        assert_eq!(scheduler.cycle_count(), 0);
    }

    #[test]
    fn test_interrupt_flag_coalesces() {
        let trigger = SimulatedTrigger::new();
        let mut scheduler = interrupt(&trigger);
        scheduler.start().unwrap();
        assert_eq!(trigger.period(), Some(Duration::from_millis(2)));

        assert!(trigger.fire());
        assert!(trigger.fire());
        assert!(trigger.fire());
        assert!(scheduler.poll_and_clear());
        assert!(!scheduler.poll_and_clear());
        assert_eq!(scheduler.cycle_count(), 3);
        assert_eq!(scheduler.latest_sample(0), Some(700));
        assert!(trigger.critical_sections() >= 2);
    }

    #[test]
    fn test_install_failure_stays_paused() {
        let trigger = SimulatedTrigger::new();
        trigger.fail_install(true);
        let mut scheduler = interrupt(&trigger);

        assert!(matches!(scheduler.start(), Err(PulseError::TriggerInstall(_))));
        assert!(scheduler.is_paused());
        assert!(!trigger.fire());
        assert!(!scheduler.poll_and_clear());

        // A later attempt may still succeed.
        trigger.fail_install(false);
        scheduler.start().unwrap();
        assert!(!scheduler.is_paused());
    }

    #[test]
    fn test_pause_resets_and_blocks_sampling() {
        let trigger = SimulatedTrigger::new();
        let mut scheduler = interrupt(&trigger);
        scheduler.start().unwrap();
        trigger.fire();
        trigger.fire();
        assert_eq!(scheduler.pulse_amplitude(0), Some(100));

        scheduler.pause().unwrap();
        assert!(scheduler.is_paused());
        assert!(!trigger.fire());
        assert!(!scheduler.poll_and_clear());
        assert!(!scheduler.acquire_and_process_all());
        assert_eq!(scheduler.pulse_amplitude(0), Some(0));
        assert_eq!(
            scheduler.with_channel(0, SensorChannel::processed_since_reset),
            Some(0)
        );
        // Raw telemetry survives the reset.
        assert_eq!(scheduler.latest_sample(0), Some(600));

        scheduler.resume().unwrap();
        assert_eq!(scheduler.latest_sample(0), Some(600));
        assert!(trigger.fire());
        assert!(scheduler.poll_and_clear());
        assert_eq!(scheduler.latest_sample(0), Some(700));
    }

    #[test]
    fn test_full_range_samples_do_not_panic() {
        let clock = ManualClock::default();
        let mut scheduler =
            SchedulerBuilder::new(vec![SensorChannel::new(0)], script(&[i32::MAX, i32::MIN]))
                .clock(clock.clone())
                .build()
                .unwrap();
        scheduler.start().unwrap();

        clock.set(Micros(2000));
        assert!(scheduler.poll_and_clear());
        clock.set(Micros(4000));
        assert!(scheduler.poll_and_clear());

        assert_eq!(scheduler.latest_sample(0), Some(i32::MIN));
        assert_eq!(scheduler.pulse_amplitude(0), Some(i32::MAX));
        // The core lock is still usable.
        clock.set(Micros(6000));
        assert!(scheduler.poll_and_clear());
        assert_eq!(scheduler.cycle_count(), 3);
    }

    #[test]
    fn test_pause_clears_pending_flag() {
        let trigger = SimulatedTrigger::new();
        let mut scheduler = interrupt(&trigger);
        scheduler.start().unwrap();
        trigger.fire();
        scheduler.pause().unwrap();
        scheduler.resume().unwrap();
        assert!(!scheduler.poll_and_clear());
    }

    #[test]
    fn test_pause_failure_keeps_active() {
        let trigger = SimulatedTrigger::new();
        let mut scheduler = interrupt(&trigger);
        scheduler.start().unwrap();
        trigger.fire();
        trigger.fire();

        trigger.fail_suppress(true);
        assert!(matches!(scheduler.pause(), Err(PulseError::TriggerSuppress(_))));
        assert_eq!(scheduler.state(), RunState::Active);
        // No reset happened.
        assert_eq!(scheduler.pulse_amplitude(0), Some(100));
        assert!(trigger.fire());
    }

    #[test]
    fn test_resume_failure_stays_paused() {
        let trigger = SimulatedTrigger::new();
        let mut scheduler = interrupt(&trigger);
        scheduler.start().unwrap();
        scheduler.pause().unwrap();

        trigger.fail_restore(true);
        assert!(matches!(scheduler.resume(), Err(PulseError::TriggerRestore(_))));
        assert!(scheduler.is_paused());
        assert!(!trigger.fire());
    }

    #[test]
    fn test_polling_resume_reanchors() {
        let clock = ManualClock::default();
        let mut scheduler = polling(1, &clock);
        scheduler.start().unwrap();
        scheduler.pause().unwrap();

        clock.set(Micros(50_000));
        scheduler.resume().unwrap();
        assert_eq!(scheduler.next_due(), Micros(52_000));
        assert!(!scheduler.poll_and_clear());

        clock.set(Micros(52_000));
        assert!(scheduler.poll_and_clear());
        assert!(!scheduler.poll_and_clear());
    }

    #[test]
    fn test_is_due_across_wrap() {
        let clock = ManualClock::starting_at(Micros(u32::MAX - 999));
        let mut scheduler = polling(1, &clock);
        scheduler.start().unwrap();
        assert_eq!(scheduler.next_due(), Micros(1000));

        assert!(!scheduler.is_due(Micros(u32::MAX)));
        assert!(!scheduler.is_due(Micros(999)));
        assert!(scheduler.is_due(Micros(1000)));

        clock.set(Micros(1000));
        assert!(scheduler.poll_and_clear());
        clock.set(Micros(1001));
        assert!(!scheduler.poll_and_clear());
    }

    #[test]
    fn test_out_of_range_accessors() {
        let clock = ManualClock::default();
        let scheduler = polling(2, &clock);

        scheduler.set_analog_input(2, 9);
        scheduler.set_threshold(5, 1);
        scheduler.blink_on_pulse(2, 13);
        scheduler.fade_on_pulse(2, 5);

        assert_eq!(scheduler.latest_sample(2), None);
        assert_eq!(scheduler.pulse_amplitude(2), None);
        assert_eq!(scheduler.beats_per_minute(2), None);
        assert_eq!(scheduler.inter_beat_interval_ms(2), None);
        assert_eq!(scheduler.last_beat_time(2), None);
        assert!(!scheduler.saw_start_of_beat(2));
        assert!(!scheduler.is_inside_beat(2));
    }

    #[test]
    fn test_in_range_setters() {
        let clock = ManualClock::default();
        let scheduler = polling(2, &clock);

        scheduler.set_analog_input(1, 7);
        scheduler.set_threshold(1, 600);
        scheduler.blink_on_pulse(1, 13);
        scheduler.fade_on_pulse(1, 5);

        let channel = scheduler.with_channel(1, Clone::clone).unwrap();
        assert_eq!(channel.analog_input(), 7);
        assert_eq!(channel.threshold(), 600);
        assert_eq!(channel.blink_output(), Some(13));
        assert_eq!(channel.fade_output(), Some(5));
        assert_eq!(scheduler.beats_per_minute(1), Some(0));
    }

    #[test]
    fn test_timing_restarts_on_resume() {
        let clock = ManualClock::default();
        let channels = vec![SensorChannel::new(0)];
        let mut scheduler = SchedulerBuilder::new(channels, script(&[1]))
            .clock(clock.clone())
            .timing_analysis(TimingAnalysisConfig {
                enabled: true,
                window: 100,
                tolerance: Duration::from_micros(100),
            })
            .build()
            .unwrap();
        scheduler.start().unwrap();

        for t in [2000, 4000, 6000] {
            clock.set(Micros(t));
            assert!(scheduler.poll_and_clear());
        }
        assert_eq!(scheduler.timing().unwrap().total_intervals, 2);

        scheduler.pause().unwrap();
        clock.set(Micros(100_000));
        scheduler.resume().unwrap();
        clock.set(Micros(102_000));
        assert!(scheduler.poll_and_clear());

        // The pause gap is not an interval.
        let snap = scheduler.timing().unwrap();
        assert_eq!(snap.total_intervals, 2);
        assert_eq!(snap.max_us, Some(2000));
    }

    #[test]
    fn test_context_free_trigger_uses_dispatch_slot() {
        let _guard = dispatch::test_guard();
        let trigger = SimulatedTrigger::new().context_free();
        let mut first = interrupt(&trigger);
        first.start().unwrap();
        assert!(dispatch::is_registered());

        assert!(trigger.fire());
        assert!(first.poll_and_clear());

        let other = SimulatedTrigger::new().context_free();
        let mut second = interrupt(&other);
        assert_eq!(second.start().unwrap_err(), PulseError::InstanceConflict);
        assert!(second.is_paused());

        drop(first);
        assert!(!dispatch::is_registered());
        second.start().unwrap();
        assert!(dispatch::is_registered());
    }
}
