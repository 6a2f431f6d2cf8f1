//! Configuration structures for the sampler.
//!
//! Supports TOML deserialization with sensible defaults for
//! development and explicit values for deployment.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default sampling frequency (one sample every 2 ms).
pub const DEFAULT_SAMPLE_RATE_HZ: u32 = 500;

/// Default detection threshold for a freshly configured channel.
pub const DEFAULT_THRESHOLD: i32 = 550;

/// Top-level sampler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Constant sampling frequency; the sample period is derived from it once.
    pub sample_rate_hz: u32,

    /// Who drives the sampling loop.
    pub mode: SamplingMode,

    /// Sample-interval statistics.
    pub timing_analysis: TimingAnalysisConfig,

    /// One entry per sensor; the count is fixed once the sampler is built.
    pub channels: Vec<ChannelConfig>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            mode: SamplingMode::Interrupt,
            timing_analysis: TimingAnalysisConfig::default(),
            channels: vec![ChannelConfig::default()],
        }
    }
}

/// Sampling loop driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SamplingMode {
    /// A periodic trigger calls the acquisition cycle from the urgent context.
    #[default]
    Interrupt,
    /// The caller's poll loop checks due-ness against the monotonic clock.
    Polling,
}

/// Timing analysis configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingAnalysisConfig {
    /// Record the interval between consecutive samples.
    pub enabled: bool,

    /// Number of intervals per report window.
    pub window: usize,

    /// Allowed deviation from the sample period.
    #[serde(with = "humantime_serde")]
    pub tolerance: Duration,
}

impl Default for TimingAnalysisConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            window: DEFAULT_SAMPLE_RATE_HZ as usize * 30, // 30 seconds
            tolerance: Duration::from_micros(100),
        }
    }
}

/// Per-sensor channel configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Analog input the sensor is wired to.
    pub analog_input: u8,

    /// Detection threshold handed to the channel.
    pub threshold: i32,

    /// Indicator output that blinks on each beat.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blink_output: Option<u8>,

    /// Indicator output that fades on each beat.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fade_output: Option<u8>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            analog_input: 0,
            threshold: DEFAULT_THRESHOLD,
            blink_output: None,
            fade_output: None,
        }
    }
}

impl SamplerConfig {
    /// Sample period derived from the sampling frequency.
    ///
    /// Integer microseconds, matching the resolution of the monotonic clock.
    #[must_use]
    pub fn sample_period(&self) -> Duration {
        Duration::from_micros(u64::from(self.period_micros()))
    }

    /// Sample period in whole microseconds. A zero rate yields zero; callers
    /// are expected to have run [`validate`](Self::validate).
    #[must_use]
    pub fn period_micros(&self) -> u32 {
        1_000_000_u32.checked_div(self.sample_rate_hz).unwrap_or(0)
    }

    /// Check invariants the sampler relies on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first violated rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate_hz == 0 || self.sample_rate_hz > 1_000_000 {
            return Err(ConfigError::Invalid(format!(
                "sample_rate_hz must be in 1..=1000000, got {}",
                self.sample_rate_hz
            )));
        }
        if self.timing_analysis.window == 0 {
            return Err(ConfigError::Invalid(
                "timing_analysis.window must be at least 1".into(),
            ));
        }
        if self.channels.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one channel must be configured".into(),
            ));
        }
        Ok(())
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or violates an invariant.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Semantically invalid configuration.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Serde helper module for `Duration` using humantime format.
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
