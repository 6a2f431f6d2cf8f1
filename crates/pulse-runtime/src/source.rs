//! Raw analog sample sources.
//!
//! The read pass of every acquisition cycle calls [`SampleSource::read`]
//! once per channel with that channel's analog input. On hardware this is
//! the ADC; [`SimulatedSource`] stands in for it everywhere else.

use std::collections::HashMap;

/// Analog-to-digital reader.
pub trait SampleSource: Send {
    /// Read one raw value from `analog_input`.
    ///
    /// Runs in the urgent context: must be bounded and must not panic.
    fn read(&mut self, analog_input: u8) -> i32;
}

/// Synthetic signal shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Waveform {
    /// Always the same value.
    Constant(i32),
    /// Replay the values in order, wrapping around at the end.
    Script(Vec<i32>),
    /// Periodic pulse: a fast upstroke and a slower decay on a flat baseline.
    Pulse {
        /// Samples per beat (sample rate × 60 / BPM).
        samples_per_beat: u32,
        /// Resting level.
        baseline: i32,
        /// Top of the upstroke.
        peak: i32,
    },
}

impl Waveform {
    /// Pulse shape for a given sample rate and heart rate.
    #[must_use]
    pub fn pulse(sample_rate_hz: u32, bpm: u32) -> Self {
        Self::Pulse {
            samples_per_beat: (sample_rate_hz * 60 / bpm.max(1)).max(1),
            baseline: 512,
            peak: 800,
        }
    }

    fn value_at(&self, position: usize) -> i32 {
        match self {
            Self::Constant(value) => *value,
            Self::Script(values) if values.is_empty() => 0,
            Self::Script(values) => values[position % values.len()],
            Self::Pulse {
                samples_per_beat,
                baseline,
                peak,
            } => {
                let period = i64::from(*samples_per_beat);
                let phase = i64::try_from(position).unwrap_or(0) % period;
                let rise = (period / 10).max(1);
                let fall = (period * 3 / 10).max(1);
                let swing = i64::from(*peak - *baseline);
                let offset = if phase < rise {
                    swing * phase / rise
                } else if phase < rise + fall {
                    swing - swing * (phase - rise) / fall
                } else {
                    0
                };
                // |offset| <= |swing|, which came from an i32 difference.
                baseline + i32::try_from(offset).unwrap_or(0)
            }
        }
    }
}

/// Deterministic stand-in for an ADC.
///
/// Each analog input advances through the waveform independently, so two
/// channels wired to different inputs see the same shape; `phase_step`
/// staggers them.
#[derive(Debug, Clone)]
pub struct SimulatedSource {
    waveform: Waveform,
    cursors: HashMap<u8, usize>,
    phase_step: usize,
    reads: u64,
}

impl SimulatedSource {
    /// Create a source producing `waveform` on every input.
    #[must_use]
    pub fn new(waveform: Waveform) -> Self {
        Self {
            waveform,
            cursors: HashMap::new(),
            phase_step: 0,
            reads: 0,
        }
    }

    /// Offset each input's starting position by `input * step` samples.
    #[must_use]
    pub fn with_phase_step(mut self, step: usize) -> Self {
        self.phase_step = step;
        self
    }

    /// Total reads served.
    #[must_use]
    pub fn reads(&self) -> u64 {
        self.reads
    }
}

impl SampleSource for SimulatedSource {
    fn read(&mut self, analog_input: u8) -> i32 {
        let start = usize::from(analog_input) * self.phase_step;
        let cursor = self.cursors.entry(analog_input).or_insert(start);
        let value = self.waveform.value_at(*cursor);
        *cursor = cursor.wrapping_add(1);
        self.reads += 1;
        value
    }
}
