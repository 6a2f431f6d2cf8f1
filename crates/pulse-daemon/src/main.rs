//! Pulse sampler daemon entry point.
//!
//! Samples every configured channel at a fixed rate from a simulated pulse
//! source, logs each observed sample at trace level, and reports periodic
//! status. SIGHUP toggles pause; SIGTERM/SIGINT shut down.

mod signals;

use anyhow::{Context, Result};
use clap::Parser;
use pulse_common::config::{SamplerConfig, SamplingMode};
use pulse_runtime::clock::MonotonicClock;
use pulse_runtime::scheduler::{PulseScheduler, SchedulerBuilder};
use pulse_runtime::source::{SimulatedSource, Waveform};
use pulse_runtime::trigger::{PeriodicTrigger, ThreadTrigger};
use pulse_runtime::SensorChannel;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, trace, warn};

use crate::signals::SignalHandler;

/// Heart rate of the simulated sensor signal.
const SIMULATED_BPM: u32 = 72;

/// Samples of phase offset between consecutive analog inputs.
const SIMULATED_PHASE_STEP: usize = 37;

/// Environment variable naming a configuration file.
const CONFIG_ENV: &str = "PULSE_CONFIG_PATH";

/// Local development configuration path.
const LOCAL_CONFIG: &str = "config/default.toml";

/// Pulse sampler daemon command-line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "pulse-daemon",
    about = "Fixed-rate multi-channel pulse sensor sampler",
    version,
    long_about = None
)]
struct Args {
    /// Path to a sampler configuration file (TOML).
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// Poll the monotonic clock instead of using the trigger thread.
    #[arg(long, short = 'p')]
    polling: bool,

    /// Stop after this many observed samples (0 = run until signalled).
    #[arg(long, default_value = "0")]
    max_samples: u64,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting pulse daemon");

    let mut config = load_config(&args)?;
    if args.polling {
        config.mode = SamplingMode::Polling;
    }

    info!(
        sample_rate_hz = config.sample_rate_hz,
        mode = ?config.mode,
        channels = config.channels.len(),
        "Configuration loaded"
    );

    let signal_handler = SignalHandler::new().context("Failed to set up signal handlers")?;

    run_daemon(&config, &signal_handler, args.max_samples)
}

fn init_logging(level: &str) {
    let filter = format!("pulse_daemon={level},pulse_runtime={level},pulse_common={level}");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&filter)),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();
}

/// Load configuration from the first source that exists.
///
/// 1. `--config`
/// 2. `PULSE_CONFIG_PATH`
/// 3. `config/default.toml`
/// 4. Built-in defaults
fn load_config(args: &Args) -> Result<SamplerConfig> {
    resolve_config(
        args.config.as_deref(),
        std::env::var(CONFIG_ENV).ok(),
        Path::new(LOCAL_CONFIG),
    )
}

fn resolve_config(
    cli: Option<&Path>,
    env: Option<String>,
    local: &Path,
) -> Result<SamplerConfig> {
    if let Some(config_path) = cli {
        info!(?config_path, "Loading config from command-line argument");
        return SamplerConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()));
    }

    if let Some(env_path) = env {
        let config_path = PathBuf::from(&env_path);
        if config_path.exists() {
            info!(?config_path, env = CONFIG_ENV, "Loading config from environment");
            return SamplerConfig::from_file(&config_path)
                .with_context(|| format!("Failed to load config from {CONFIG_ENV}={env_path}"));
        }
        warn!(
            path = %env_path,
            env = CONFIG_ENV,
            "Config path from environment does not exist, checking other locations"
        );
    }

    if local.exists() {
        info!(config_path = ?local, "Loading config from local path");
        return SamplerConfig::from_file(local)
            .with_context(|| format!("Failed to load config from {}", local.display()));
    }

    info!("No config file found, using built-in defaults");
    Ok(SamplerConfig::default())
}

fn simulated_source(config: &SamplerConfig) -> SimulatedSource {
    SimulatedSource::new(Waveform::pulse(config.sample_rate_hz, SIMULATED_BPM))
        .with_phase_step(SIMULATED_PHASE_STEP)
}

fn run_daemon(config: &SamplerConfig, signals: &SignalHandler, max_samples: u64) -> Result<()> {
    let channels: Vec<SensorChannel> = config
        .channels
        .iter()
        .map(SensorChannel::from_config)
        .collect();
    let builder = SchedulerBuilder::new(channels, simulated_source(config)).config(config);
    let status_every = u64::from(config.sample_rate_hz) * 10;

    match config.mode {
        SamplingMode::Interrupt => {
            let scheduler = builder
                .trigger(ThreadTrigger::with_name("pulse-sampler"))
                .build()
                .context("Failed to build scheduler")?;
            run_sampling_loop(scheduler, signals, max_samples, status_every)
        }
        SamplingMode::Polling => {
            let scheduler = builder.build().context("Failed to build scheduler")?;
            run_sampling_loop(scheduler, signals, max_samples, status_every)
        }
    }
}

fn run_sampling_loop<K, T>(
    mut scheduler: PulseScheduler<SensorChannel, SimulatedSource, K, T>,
    signals: &SignalHandler,
    max_samples: u64,
    status_every: u64,
) -> Result<()>
where
    K: MonotonicClock + 'static,
    T: PeriodicTrigger,
{
    scheduler.start().context("Failed to start sampling")?;

    // Interrupt mode only has to look often enough not to miss the flag
    // for long; polling mode has to check the clock itself.
    let idle = match scheduler.mode() {
        SamplingMode::Interrupt => scheduler.sample_period() / 4,
        SamplingMode::Polling => Duration::ZERO,
    };

    let mut observed = 0u64;
    while !signals.shutdown_requested() {
        if signals.take_pause_toggle() {
            let toggled = if scheduler.is_paused() {
                scheduler.resume()
            } else {
                scheduler.pause()
            };
            if let Err(e) = toggled {
                warn!(error = %e, "Pause toggle failed");
            }
        }

        if !scheduler.poll_and_clear() {
            if idle.is_zero() {
                std::thread::yield_now();
            } else {
                std::thread::sleep(idle);
            }
            continue;
        }

        observed += 1;
        for index in 0..scheduler.channel_count() {
            trace!(
                channel = index,
                sample = scheduler.latest_sample(index),
                amplitude = scheduler.pulse_amplitude(index),
                "Sample"
            );
        }

        if max_samples > 0 && observed >= max_samples {
            info!(samples = observed, "Maximum sample count reached");
            break;
        }

        if status_every > 0 && observed % status_every == 0 {
            let timing = scheduler.timing();
            info!(
                samples = observed,
                cycles = scheduler.cycle_count(),
                jitter_us = timing.and_then(|t| t.jitter_us()),
                "Periodic status"
            );
        }
    }

    info!("Shutting down...");
    if !scheduler.is_paused() {
        if let Err(e) = scheduler.pause() {
            warn!(error = %e, "Failed to pause sampling on shutdown");
        }
    }

    info!(
        samples = observed,
        cycles = scheduler.cycle_count(),
        signals = signals.state().signal_count(),
        final_state = %scheduler.state(),
        "Daemon shutdown complete"
    );

    Ok(())
}
