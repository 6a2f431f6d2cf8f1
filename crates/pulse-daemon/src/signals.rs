//! Unix signal handling for the sampler daemon.
//!
//! SIGTERM and SIGINT request shutdown. SIGHUP toggles between sampling and
//! paused. The handlers only store to static atomics; the main loop drains
//! them between polls.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

static PENDING_TERM: AtomicBool = AtomicBool::new(false);
static PENDING_INT: AtomicBool = AtomicBool::new(false);
static PENDING_HUP: AtomicBool = AtomicBool::new(false);

/// Signals the daemon reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// SIGTERM
    Terminate,
    /// SIGINT (Ctrl+C)
    Interrupt,
    /// SIGHUP, used here to toggle pause.
    Hangup,
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalKind::Terminate => write!(f, "SIGTERM"),
            SignalKind::Interrupt => write!(f, "SIGINT"),
            SignalKind::Hangup => write!(f, "SIGHUP"),
        }
    }
}

/// Requests observed by the main loop.
#[derive(Debug, Default)]
pub struct SignalState {
    shutdown_requested: AtomicBool,
    pause_toggle_requested: AtomicBool,
    signal_count: AtomicU32,
}

impl SignalState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::Relaxed)
    }

    /// Read and clear a pending pause toggle.
    #[inline]
    pub fn take_pause_toggle(&self) -> bool {
        self.pause_toggle_requested.swap(false, Ordering::Relaxed)
    }

    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::Relaxed);
    }

    pub fn request_pause_toggle(&self) {
        self.pause_toggle_requested.store(true, Ordering::Relaxed);
    }

    fn record(&self, kind: SignalKind) {
        self.signal_count.fetch_add(1, Ordering::Relaxed);
        info!(signal = %kind, "Signal received");
        match kind {
            SignalKind::Terminate | SignalKind::Interrupt => self.request_shutdown(),
            SignalKind::Hangup => self.request_pause_toggle(),
        }
    }

    /// Signals delivered since start.
    pub fn signal_count(&self) -> u32 {
        self.signal_count.load(Ordering::Relaxed)
    }
}

/// Registered signal handlers plus the state they feed.
#[derive(Debug, Clone)]
pub struct SignalHandler {
    state: Arc<SignalState>,
}

impl SignalHandler {
    /// Register handlers for SIGTERM, SIGINT and SIGHUP.
    ///
    /// On non-Unix platforms only manual requests are available.
    pub fn new() -> std::io::Result<Self> {
        let handler = Self {
            state: Arc::new(SignalState::new()),
        };

        #[cfg(unix)]
        register_unix_handlers()?;

        Ok(handler)
    }

    fn drain_pending(&self) {
        if PENDING_TERM.swap(false, Ordering::Relaxed) {
            self.state.record(SignalKind::Terminate);
        }
        if PENDING_INT.swap(false, Ordering::Relaxed) {
            self.state.record(SignalKind::Interrupt);
        }
        if PENDING_HUP.swap(false, Ordering::Relaxed) {
            self.state.record(SignalKind::Hangup);
        }
    }

    pub fn shutdown_requested(&self) -> bool {
        self.drain_pending();
        self.state.shutdown_requested()
    }

    /// Read and clear a pending pause toggle.
    pub fn take_pause_toggle(&self) -> bool {
        self.drain_pending();
        self.state.take_pause_toggle()
    }

    pub fn request_shutdown(&self) {
        info!("Manual shutdown requested");
        self.state.request_shutdown();
    }

    pub fn state(&self) -> &SignalState {
        &self.state
    }
}

#[cfg(unix)]
fn register_unix_handlers() -> std::io::Result<()> {
    use std::os::raw::c_int;

    extern "C" fn on_sigterm(_: c_int) {
        PENDING_TERM.store(true, Ordering::Relaxed);
    }

    extern "C" fn on_sigint(_: c_int) {
        PENDING_INT.store(true, Ordering::Relaxed);
    }

    extern "C" fn on_sighup(_: c_int) {
        PENDING_HUP.store(true, Ordering::Relaxed);
    }

    let handlers: [(c_int, extern "C" fn(c_int)); 3] = [
        (libc::SIGTERM, on_sigterm),
        (libc::SIGINT, on_sigint),
        (libc::SIGHUP, on_sighup),
    ];

    for (signal, handler) in handlers {
        // SAFETY: the handlers only store to static atomics, which is
        // async-signal-safe.
        let previous = unsafe { libc::signal(signal, handler as libc::sighandler_t) };
        if previous == libc::SIG_ERR {
            return Err(std::io::Error::last_os_error());
        }
    }

    debug!("Unix signal handlers registered");
    Ok(())
}
