//! Shared fixtures for acceptance tests.

use pulse_runtime::{SensorChannel, SimulatedSource, Waveform};
use std::time::{Duration, Instant};

/// Route `tracing` output through the test harness. Honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// `count` reference channels on analog inputs `0..count`.
pub fn sensor_channels(count: u8) -> Vec<SensorChannel> {
    (0..count).map(SensorChannel::new).collect()
}

/// Source replaying `values` on every input.
pub fn script_source(values: &[i32]) -> SimulatedSource {
    SimulatedSource::new(Waveform::Script(values.to_vec()))
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}

/// Deterministic step sequence in `1..=max`, for jittery clock advances.
pub struct Steps {
    state: u32,
    max: u32,
}

impl Steps {
    pub fn new(seed: u32, max: u32) -> Self {
        Self { state: seed, max }
    }
}

impl Iterator for Steps {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        self.state = self.state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        Some((self.state >> 8) % self.max + 1)
    }
}
