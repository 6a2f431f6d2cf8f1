//! Per-sensor channel abstraction.
//!
//! A [`Channel`] owns one sensor's analog input identity and whatever
//! processing state its detection algorithm needs. The scheduler only
//! feeds it raw values, asks it to process them, and resets its transient
//! state on pause; everything else is reached through bounds-checked
//! accessors on the scheduler.

use pulse_common::config::{ChannelConfig, DEFAULT_THRESHOLD};

/// Consumer side of one sensor's acquisition pipeline.
///
/// Implementations run inside the urgent context for
/// [`ingest_sample`](Channel::ingest_sample), [`process`](Channel::process)
/// and [`update_indicators`](Channel::update_indicators); those must be
/// bounded, allocation-free and must not panic.
pub trait Channel: Send {
    /// Store a freshly read raw value. Called during the read pass.
    fn ingest_sample(&mut self, raw: i32);

    /// Run detection on the most recent value. Called during the process pass.
    fn process(&mut self);

    /// Drive channel-owned side effects (indicator outputs) after processing.
    fn update_indicators(&mut self) {}

    /// Return detection state to its post-construction values.
    ///
    /// Raw last-sample telemetry survives; only in-flight detection state
    /// is discarded.
    fn reset_transient_state(&mut self);

    /// Analog input this channel reads from.
    fn analog_input(&self) -> u8;

    /// Rewire the channel to another analog input.
    fn set_analog_input(&mut self, input: u8);

    /// Indicator output that blinks on each beat.
    fn set_blink_output(&mut self, _output: u8) {}

    /// Indicator output that fades on each beat.
    fn set_fade_output(&mut self, _output: u8) {}

    /// Detection threshold.
    fn threshold(&self) -> i32;

    /// Set the detection threshold.
    fn set_threshold(&mut self, threshold: i32);

    /// Last raw value ingested.
    fn latest_sample(&self) -> i32;

    /// Peak-to-trough amplitude of the current pulse.
    fn pulse_amplitude(&self) -> i32;

    /// Beats per minute.
    fn beats_per_minute(&self) -> i32 {
        0
    }

    /// Interval between the last two beats.
    fn inter_beat_interval_ms(&self) -> i32 {
        0
    }

    /// Read-and-clear the "a beat started" latch.
    fn saw_start_of_beat(&mut self) -> bool {
        false
    }

    /// Is the signal currently inside a beat?
    fn is_inside_beat(&self) -> bool {
        false
    }

    /// Sample time of the last detected beat, in milliseconds.
    fn last_beat_time(&self) -> u32 {
        0
    }

    /// Apply a configuration entry through the setters.
    fn configure(&mut self, config: &ChannelConfig) {
        self.set_analog_input(config.analog_input);
        self.set_threshold(config.threshold);
        if let Some(output) = config.blink_output {
            self.set_blink_output(output);
        }
        if let Some(output) = config.fade_output {
            self.set_fade_output(output);
        }
    }
}

/// Reference channel: raw telemetry plus running amplitude.
///
/// Tracks the last sample and the peak/trough seen since the last reset.
/// It carries no beat-detection algorithm of its own, so the beat queries
/// keep their trait defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorChannel {
    analog_input: u8,
    threshold: i32,
    blink_output: Option<u8>,
    fade_output: Option<u8>,
    latest_sample: i32,
    /// Transient: extremes since the last reset.
    peak: Option<i32>,
    trough: Option<i32>,
    processed_since_reset: u32,
}

impl Default for SensorChannel {
    fn default() -> Self {
        Self::new(0)
    }
}

impl SensorChannel {
    /// Create a channel reading `analog_input`.
    #[must_use]
    pub fn new(analog_input: u8) -> Self {
        Self {
            analog_input,
            threshold: DEFAULT_THRESHOLD,
            blink_output: None,
            fade_output: None,
            latest_sample: 0,
            peak: None,
            trough: None,
            processed_since_reset: 0,
        }
    }

    /// Create a channel from a configuration entry.
    #[must_use]
    pub fn from_config(config: &ChannelConfig) -> Self {
        let mut channel = Self::new(config.analog_input);
        channel.configure(config);
        channel
    }

    /// Configured blink output.
    #[must_use]
    pub fn blink_output(&self) -> Option<u8> {
        self.blink_output
    }

    /// Configured fade output.
    #[must_use]
    pub fn fade_output(&self) -> Option<u8> {
        self.fade_output
    }

    /// Samples processed since construction or the last reset.
    #[must_use]
    pub fn processed_since_reset(&self) -> u32 {
        self.processed_since_reset
    }
}

impl Channel for SensorChannel {
    fn ingest_sample(&mut self, raw: i32) {
        self.latest_sample = raw;
    }

    fn process(&mut self) {
        let value = self.latest_sample;
        self.peak = Some(self.peak.map_or(value, |p| p.max(value)));
        self.trough = Some(self.trough.map_or(value, |t| t.min(value)));
        self.processed_since_reset = self.processed_since_reset.saturating_add(1);
    }

    fn reset_transient_state(&mut self) {
        self.peak = None;
        self.trough = None;
        self.processed_since_reset = 0;
    }

    fn analog_input(&self) -> u8 {
        self.analog_input
    }

    fn set_analog_input(&mut self, input: u8) {
        self.analog_input = input;
    }

    fn set_blink_output(&mut self, output: u8) {
        self.blink_output = Some(output);
    }

    fn set_fade_output(&mut self, output: u8) {
        self.fade_output = Some(output);
    }

    fn threshold(&self) -> i32 {
        self.threshold
    }

    fn set_threshold(&mut self, threshold: i32) {
        self.threshold = threshold;
    }

    fn latest_sample(&self) -> i32 {
        self.latest_sample
    }

    fn pulse_amplitude(&self) -> i32 {
        match (self.peak, self.trough) {
            (Some(peak), Some(trough)) => peak.saturating_sub(trough),
            _ => 0,
        }
    }
}
