//! Configuration acceptance tests.
//!
//! Configuration files are loaded, validated, and turned into a running
//! scheduler without further glue.

use pulse_common::config::{SamplerConfig, SamplingMode};
use pulse_common::time::Micros;
use pulse_runtime::{ManualClock, SchedulerBuilder, SensorChannel, SimulatedSource, Waveform};
use std::io::Write;
use std::time::Duration;

const SHIPPED_CONFIG: &str = include_str!("../../config/default.toml");

#[test]
fn test_shipped_config_is_valid() {
    let config = SamplerConfig::from_toml(SHIPPED_CONFIG).unwrap();
    assert_eq!(config.sample_rate_hz, 500);
    assert_eq!(config.mode, SamplingMode::Interrupt);
    assert_eq!(config.channels.len(), 2);
    assert_eq!(config.channels[0].blink_output, Some(13));
    assert_eq!(config.timing_analysis.tolerance, Duration::from_micros(100));
}

#[test]
fn test_config_file_builds_scheduler() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
sample_rate_hz = 250
mode = "polling"

[timing_analysis]
enabled = true
window = 8
tolerance = "50us"

[[channels]]
analog_input = 3
threshold = 600
fade_output = 9

[[channels]]
analog_input = 4
"#
    )
    .unwrap();

    let config = SamplerConfig::from_file(file.path()).unwrap();
    let channels: Vec<SensorChannel> = config.channels.iter().map(SensorChannel::from_config).collect();
    let clock = ManualClock::default();
    let mut scheduler = SchedulerBuilder::new(channels, SimulatedSource::new(Waveform::Constant(42)))
        .config(&config)
        .clock(clock.clone())
        .build()
        .unwrap();

    assert_eq!(scheduler.sample_period(), Duration::from_millis(4));
    assert_eq!(scheduler.channel_count(), 2);
    let first = scheduler.with_channel(0, Clone::clone).unwrap();
    assert_eq!(first.fade_output(), Some(9));
    assert_eq!(first.blink_output(), None);

    scheduler.start().unwrap();
    for _ in 0..3 {
        clock.advance(4000);
        assert!(scheduler.poll_and_clear());
    }
    assert_eq!(scheduler.latest_sample(1), Some(42));
    assert_eq!(scheduler.next_due(), Micros(16_000));

    let timing = scheduler.timing().unwrap();
    assert_eq!(timing.total_intervals, 2);
    assert_eq!(timing.out_of_tolerance, 0);
}

#[test]
fn test_invalid_config_file_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "sample_rate_hz = 500\nchannels = []\n").unwrap();
    assert!(SamplerConfig::from_file(file.path()).is_err());
}
