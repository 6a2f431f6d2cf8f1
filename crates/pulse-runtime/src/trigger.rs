//! Periodic trigger collaborators.
//!
//! The trigger is the urgent context: it calls the installed tick handler
//! once per sample period. The scheduler only needs three capabilities from
//! it (install, suppress, restore) plus a critical section that keeps the
//! tick from running while the normal context reads-and-clears shared state.
//!
//! - [`ThreadTrigger`]: hosted implementation on a dedicated thread
//! - [`SimulatedTrigger`]: test double fired by hand, with failure injection
//! - [`NoTrigger`]: uninhabited placeholder for polling-mode schedulers

use crate::dispatch;
use pulse_common::error::{PulseError, PulseResult};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Callback run by the trigger once per period.
pub type TickHandler = Arc<dyn Fn() + Send + Sync>;

/// Periodic trigger abstraction.
///
/// Failures are always reported; an implementation that cannot honour a
/// request must return an error rather than pretend it succeeded.
pub trait PeriodicTrigger: Send {
    /// Start firing `tick` every `period`.
    fn install(&mut self, period: Duration, tick: TickHandler) -> PulseResult<()>;

    /// Stop firing. No tick may be running once this returns `Ok`.
    fn suppress(&mut self) -> PulseResult<()>;

    /// Resume firing after [`suppress`](Self::suppress).
    fn restore(&mut self) -> PulseResult<()>;

    /// Run `f` with the urgent context held off.
    ///
    /// Keep `f` short: a tick that falls due meanwhile is delayed.
    fn critical_section<R>(&self, f: impl FnOnce() -> R) -> R {
        f()
    }

    /// True if the trigger cannot carry the handler and instead calls
    /// [`dispatch::dispatch_tick`] from a context-free vector.
    fn needs_global_dispatch(&self) -> bool {
        false
    }
}

/// Placeholder trigger type for schedulers that poll. Cannot be constructed.
#[derive(Debug)]
pub enum NoTrigger {}

impl PeriodicTrigger for NoTrigger {
    fn install(&mut self, _period: Duration, _tick: TickHandler) -> PulseResult<()> {
        match *self {}
    }

    fn suppress(&mut self) -> PulseResult<()> {
        match *self {}
    }

    fn restore(&mut self) -> PulseResult<()> {
        match *self {}
    }
}

fn lock_ignoring_poison<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared state between the trigger thread and its owner.
#[derive(Debug, Default)]
struct TriggerState {
    /// Ticks are delivered only while set.
    enabled: AtomicBool,
    /// Ask the thread to exit.
    stop_requested: AtomicBool,
    /// Held by the thread while a tick runs, and by critical sections.
    dispatch: Mutex<()>,
    /// Ticks delivered.
    fired: AtomicU64,
}

/// Hosted urgent context: a named thread firing at absolute deadlines.
///
/// Deadlines advance by exactly one period each tick, so a late wake-up
/// does not shift the ones after it.
#[derive(Debug)]
pub struct ThreadTrigger {
    name: String,
    state: Arc<TriggerState>,
    handle: Option<JoinHandle<()>>,
}

impl ThreadTrigger {
    /// Create an idle trigger; the thread starts on [`install`](PeriodicTrigger::install).
    #[must_use]
    pub fn new() -> Self {
        Self::with_name("pulse-sampler")
    }

    /// Create an idle trigger whose thread carries `name`.
    #[must_use]
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(TriggerState::default()),
            handle: None,
        }
    }

    /// Ticks delivered so far.
    #[must_use]
    pub fn fired(&self) -> u64 {
        self.state.fired.load(Ordering::Relaxed)
    }

    /// True while the thread is installed and ticks are enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.handle.is_some() && self.state.enabled.load(Ordering::Acquire)
    }

    fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        debug!(name = %self.name, "Stopping trigger thread");
        self.state.enabled.store(false, Ordering::Release);
        self.state.stop_requested.store(true, Ordering::Release);
        if let Err(e) = handle.join() {
            warn!("Trigger thread panicked: {:?}", e);
        }
    }
}

impl Default for ThreadTrigger {
    fn default() -> Self {
        Self::new()
    }
}

impl PeriodicTrigger for ThreadTrigger {
    fn install(&mut self, period: Duration, tick: TickHandler) -> PulseResult<()> {
        if self.handle.is_some() {
            return Err(PulseError::TriggerInstall("trigger already installed".into()));
        }
        if period.is_zero() {
            return Err(PulseError::TriggerInstall("period must be non-zero".into()));
        }

        info!(name = %self.name, period_us = period.as_micros(), "Installing periodic trigger");

        self.state.stop_requested.store(false, Ordering::Release);
        // Enable BEFORE spawn so the first deadline already delivers.
        self.state.enabled.store(true, Ordering::Release);

        let state = Arc::clone(&self.state);
        let spawned = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                debug!("Trigger thread started");
                let mut deadline = Instant::now() + period;
                while !state.stop_requested.load(Ordering::Acquire) {
                    wait_until(deadline);
                    deadline += period;

                    if state.stop_requested.load(Ordering::Acquire) {
                        break;
                    }
                    if state.enabled.load(Ordering::Acquire) {
                        let _dispatch = lock_ignoring_poison(&state.dispatch);
                        tick();
                        state.fired.fetch_add(1, Ordering::Relaxed);
                    }
                }
                debug!("Trigger thread stopped");
            });

        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.state.enabled.store(false, Ordering::Release);
                Err(PulseError::TriggerInstall(format!(
                    "failed to spawn trigger thread: {e}"
                )))
            }
        }
    }

    fn suppress(&mut self) -> PulseResult<()> {
        if self.handle.is_none() {
            return Err(PulseError::TriggerSuppress("trigger not installed".into()));
        }
        self.state.enabled.store(false, Ordering::Release);
        // Wait out a tick that was already running.
        drop(lock_ignoring_poison(&self.state.dispatch));
        Ok(())
    }

    fn restore(&mut self) -> PulseResult<()> {
        if self.handle.is_none() {
            return Err(PulseError::TriggerRestore("trigger not installed".into()));
        }
        self.state.enabled.store(true, Ordering::Release);
        Ok(())
    }

    fn critical_section<R>(&self, f: impl FnOnce() -> R) -> R {
        let _dispatch = lock_ignoring_poison(&self.state.dispatch);
        f()
    }
}

impl Drop for ThreadTrigger {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Sleep until `deadline` using a high-precision monotonic sleep.
#[cfg(target_os = "linux")]
#[allow(unsafe_code)]
fn wait_until(deadline: Instant) {
    let now = Instant::now();
    if deadline <= now {
        return; // Already late; fire immediately.
    }
    let remaining = deadline - now;

    #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
    let ts = libc::timespec {
        tv_sec: remaining.as_secs() as libc::time_t,
        tv_nsec: remaining.subsec_nanos() as libc::c_long,
    };

    // SAFETY: `ts` is a valid timespec and the remainder pointer may be null.
    unsafe {
        libc::clock_nanosleep(libc::CLOCK_MONOTONIC, 0, &ts, std::ptr::null_mut());
    }
}

#[cfg(not(target_os = "linux"))]
fn wait_until(deadline: Instant) {
    let now = Instant::now();
    if deadline > now {
        thread::sleep(deadline - now);
    }
}

#[derive(Default)]
struct SimulatedInner {
    handler: Mutex<Option<TickHandler>>,
    period: Mutex<Option<Duration>>,
    enabled: AtomicBool,
    dispatch: Mutex<()>,
    context_free: AtomicBool,
    fail_install: AtomicBool,
    fail_suppress: AtomicBool,
    fail_restore: AtomicBool,
    fired: AtomicU64,
    critical_sections: AtomicU64,
}

/// Hand-fired trigger for tests and simulations.
///
/// Clones share state, so a test can keep one handle and give the other to
/// the scheduler.
#[derive(Clone, Default)]
pub struct SimulatedTrigger {
    inner: Arc<SimulatedInner>,
}

impl std::fmt::Debug for SimulatedTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedTrigger")
            .field("installed", &self.is_installed())
            .field("enabled", &self.is_enabled())
            .field("fired", &self.fired())
            .finish_non_exhaustive()
    }
}

impl SimulatedTrigger {
    /// Create an uninstalled trigger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Behave like a vector that cannot carry context: `fire` goes through
    /// [`dispatch::dispatch_tick`] instead of the installed handler.
    #[must_use]
    pub fn context_free(self) -> Self {
        self.inner.context_free.store(true, Ordering::Relaxed);
        self
    }

    /// Make the next installs fail.
    pub fn fail_install(&self, fail: bool) {
        self.inner.fail_install.store(fail, Ordering::Relaxed);
    }

    /// Make the next suppressions fail.
    pub fn fail_suppress(&self, fail: bool) {
        self.inner.fail_suppress.store(fail, Ordering::Relaxed);
    }

    /// Make the next restores fail.
    pub fn fail_restore(&self, fail: bool) {
        self.inner.fail_restore.store(fail, Ordering::Relaxed);
    }

    /// Deliver one tick if installed and enabled. Returns whether it ran.
    pub fn fire(&self) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let handler = lock_ignoring_poison(&self.inner.handler).clone();
        let _dispatch = lock_ignoring_poison(&self.inner.dispatch);
        let delivered = if self.inner.context_free.load(Ordering::Relaxed) {
            dispatch::dispatch_tick()
        } else if let Some(handler) = handler {
            handler();
            true
        } else {
            false
        };
        if delivered {
            self.inner.fired.fetch_add(1, Ordering::Relaxed);
        }
        delivered
    }

    /// Ticks delivered so far.
    #[must_use]
    pub fn fired(&self) -> u64 {
        self.inner.fired.load(Ordering::Relaxed)
    }

    /// Critical sections entered so far.
    #[must_use]
    pub fn critical_sections(&self) -> u64 {
        self.inner.critical_sections.load(Ordering::Relaxed)
    }

    /// Period passed to the last successful install.
    #[must_use]
    pub fn period(&self) -> Option<Duration> {
        *lock_ignoring_poison(&self.inner.period)
    }

    /// True once a handler has been installed.
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.period().is_some()
    }

    /// True while ticks would be delivered.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Acquire)
    }
}

impl PeriodicTrigger for SimulatedTrigger {
    fn install(&mut self, period: Duration, tick: TickHandler) -> PulseResult<()> {
        if self.inner.fail_install.load(Ordering::Relaxed) {
            return Err(PulseError::TriggerInstall("simulated install failure".into()));
        }
        *lock_ignoring_poison(&self.inner.handler) = Some(tick);
        *lock_ignoring_poison(&self.inner.period) = Some(period);
        self.inner.enabled.store(true, Ordering::Release);
        Ok(())
    }

    fn suppress(&mut self) -> PulseResult<()> {
        if self.inner.fail_suppress.load(Ordering::Relaxed) {
            return Err(PulseError::TriggerSuppress("simulated suppress failure".into()));
        }
        if !self.is_installed() {
            return Err(PulseError::TriggerSuppress("trigger not installed".into()));
        }
        self.inner.enabled.store(false, Ordering::Release);
        Ok(())
    }

    fn restore(&mut self) -> PulseResult<()> {
        if self.inner.fail_restore.load(Ordering::Relaxed) {
            return Err(PulseError::TriggerRestore("simulated restore failure".into()));
        }
        if !self.is_installed() {
            return Err(PulseError::TriggerRestore("trigger not installed".into()));
        }
        self.inner.enabled.store(true, Ordering::Release);
        Ok(())
    }

    fn critical_section<R>(&self, f: impl FnOnce() -> R) -> R {
        let _dispatch = lock_ignoring_poison(&self.inner.dispatch);
        self.inner.critical_sections.fetch_add(1, Ordering::Relaxed);
        f()
    }

    fn needs_global_dispatch(&self) -> bool {
        self.inner.context_free.load(Ordering::Relaxed)
    }
}

static_assertions::assert_impl_all!(ThreadTrigger: Send);
static_assertions::assert_impl_all!(SimulatedTrigger: Send, Sync);
