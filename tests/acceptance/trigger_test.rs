//! Interrupt-mode acceptance tests on the hosted trigger thread.
//!
//! # Acceptance Criteria
//!
//! - The trigger thread drives acquisition at roughly the configured rate
//! - The caller observes new samples through the coalescing flag
//! - Pause stops acquisition until resume
//! - Timing analysis records intervals near the nominal period

use super::common::{init_tracing, sensor_channels, wait_until};
use pulse_common::config::TimingAnalysisConfig;
use pulse_runtime::{SchedulerBuilder, SimulatedSource, ThreadTrigger, Waveform};
use std::thread;
use std::time::{Duration, Instant};

fn pulse_source(rate_hz: u32) -> SimulatedSource {
    SimulatedSource::new(Waveform::pulse(rate_hz, 60)).with_phase_step(50)
}

#[test]
fn test_trigger_thread_drives_sampling() {
    init_tracing();
    let mut scheduler = SchedulerBuilder::new(sensor_channels(2), pulse_source(1000))
        .sample_rate_hz(1000)
        .trigger(ThreadTrigger::with_name("acceptance-sampler"))
        .build()
        .unwrap();
    scheduler.start().unwrap();

    let mut observed = 0u64;
    let deadline = Instant::now() + Duration::from_millis(200);
    while Instant::now() < deadline {
        if scheduler.poll_and_clear() {
            observed += 1;
        }
        thread::sleep(Duration::from_micros(200));
    }

    let cycles = scheduler.cycle_count();
    assert!(cycles >= 50, "only {cycles} cycles in 200ms at 1kHz");
    assert!(cycles <= 400, "{cycles} cycles in 200ms at 1kHz");
    assert!(observed >= 1);
    assert!(observed <= cycles);
    assert!(scheduler.latest_sample(0).is_some_and(|v| (512..=800).contains(&v)));
}

#[test]
fn test_pause_stops_trigger_thread() {
    let mut scheduler = SchedulerBuilder::new(sensor_channels(1), pulse_source(1000))
        .sample_rate_hz(1000)
        .trigger(ThreadTrigger::new())
        .build()
        .unwrap();
    scheduler.start().unwrap();

    assert!(wait_until(Duration::from_secs(2), || scheduler.cycle_count() >= 5));
    scheduler.pause().unwrap();
    let frozen = scheduler.cycle_count();

    thread::sleep(Duration::from_millis(30));
    assert_eq!(scheduler.cycle_count(), frozen);
    assert!(!scheduler.poll_and_clear());

    scheduler.resume().unwrap();
    assert!(wait_until(Duration::from_secs(2), || scheduler.cycle_count() > frozen));
}

#[test]
fn test_timing_analysis_on_trigger_thread() {
    let mut scheduler = SchedulerBuilder::new(sensor_channels(1), pulse_source(500))
        .sample_rate_hz(500)
        .timing_analysis(TimingAnalysisConfig {
            enabled: true,
            window: 10_000,
            tolerance: Duration::from_micros(500),
        })
        .trigger(ThreadTrigger::new())
        .build()
        .unwrap();
    scheduler.start().unwrap();

    assert!(wait_until(Duration::from_secs(2), || scheduler.cycle_count() >= 50));
    scheduler.pause().unwrap();

    let snap = scheduler.timing().unwrap();
    assert!(snap.total_intervals >= 49);
    assert_eq!(snap.expected_us, 2000);
    let mean = snap.mean_us.unwrap();
    assert!((1000..=4000).contains(&mean), "mean interval {mean}us");
}
