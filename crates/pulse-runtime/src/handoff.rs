//! New-sample flag shared between the urgent and normal contexts.
//!
//! A single coalescing bit: the urgent context raises it at the end of every
//! acquisition cycle, the normal context reads-and-clears it. It never
//! queues; if the poller is slow, intermediate cycles collapse into one
//! `true`.
//!
//! The bit sits on its own cache line so the urgent context's store does not
//! contend with unrelated scheduler fields.

use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicBool, Ordering};

/// Single-bit, coalescing "a cycle completed" signal.
#[derive(Debug, Default)]
pub struct NewSampleFlag {
    raised: CachePadded<AtomicBool>,
}

impl NewSampleFlag {
    /// Create a lowered flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a completed cycle. Release pairs with the acquire in
    /// [`take`](Self::take): channel writes made during the cycle are visible
    /// to whoever observes the flag.
    #[inline]
    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    /// Snapshot and clear in one step.
    #[inline]
    pub fn take(&self) -> bool {
        self.raised.swap(false, Ordering::AcqRel)
    }

    /// Peek without clearing.
    #[inline]
    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    /// Drop any pending signal.
    #[inline]
    pub fn clear(&self) {
        self.raised.store(false, Ordering::Release);
    }
}
