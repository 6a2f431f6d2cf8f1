//! Monotonic microsecond clocks.
//!
//! The sampler only ever asks "what time is it" as a wrapping 32-bit
//! microsecond counter. [`SystemClock`] derives that counter from
//! [`Instant`]; [`ManualClock`] lets tests and simulations drive time by hand,
//! including across the 2^32 wrap.

use pulse_common::time::Micros;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Source of monotonic time for due-ness checks and timing analysis.
///
/// Must be callable from both the urgent and the normal context.
pub trait MonotonicClock: Send + Sync {
    /// Current time on the wrapping microsecond timeline.
    fn now_micros(&self) -> Micros;
}

/// Wall-independent clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Create a clock whose counter reads zero now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for SystemClock {
    #[allow(clippy::cast_possible_truncation)]
    fn now_micros(&self) -> Micros {
        // Truncation is the wrap.
        Micros(self.origin.elapsed().as_micros() as u32)
    }
}

/// Hand-driven clock. Clones share the same counter.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU32>,
}

impl ManualClock {
    /// Create a clock reading `start`.
    #[must_use]
    pub fn starting_at(start: Micros) -> Self {
        Self {
            now: Arc::new(AtomicU32::new(start.as_u32())),
        }
    }

    /// Jump to an absolute time.
    pub fn set(&self, now: Micros) {
        self.now.store(now.as_u32(), Ordering::Release);
    }

    /// Advance by `delta_us`, wrapping at 2^32.
    pub fn advance(&self, delta_us: u32) {
        // fetch_add on atomics wraps on overflow.
        self.now.fetch_add(delta_us, Ordering::AcqRel);
    }
}

impl MonotonicClock for ManualClock {
    fn now_micros(&self) -> Micros {
        Micros(self.now.load(Ordering::Acquire))
    }
}
