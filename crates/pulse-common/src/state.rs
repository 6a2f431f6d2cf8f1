//! Run-state machine gating the sampling loop.
//!
//! Two states only:
//! ACTIVE ⇄ PAUSED
//!
//! The state is read from the urgent (trigger) context on every tick and
//! written from the normal context by pause/resume, so it lives in an
//! atomic rather than behind a lock.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Run states for the sampling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    /// Sampling cycles execute when due.
    Active,
    /// Sampling cycles are skipped entirely.
    #[default]
    Paused,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Paused => write!(f, "PAUSED"),
        }
    }
}

impl RunState {
    fn from_paused(paused: bool) -> Self {
        if paused {
            Self::Paused
        } else {
            Self::Active
        }
    }
}

/// Shared run-state cell with transition counting.
///
/// Every sampling entry point consults [`RunControl::is_paused`] before
/// touching any channel; this is the single gate that makes pause/resume
/// meaningful in both sampling modes.
#[derive(Debug)]
pub struct RunControl {
    paused: AtomicBool,
    transition_count: AtomicU64,
}

impl Default for RunControl {
    fn default() -> Self {
        Self::new(RunState::default())
    }
}

impl RunControl {
    /// Create a run control in the given initial state.
    #[must_use]
    pub fn new(initial: RunState) -> Self {
        Self {
            paused: AtomicBool::new(initial == RunState::Paused),
            transition_count: AtomicU64::new(0),
        }
    }

    /// Get the current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> RunState {
        RunState::from_paused(self.is_paused())
    }

    /// Pure read of the paused flag.
    #[inline]
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Get total number of transitions.
    #[must_use]
    pub fn transition_count(&self) -> u64 {
        self.transition_count.load(Ordering::Relaxed)
    }

    /// Set the state. Also used to roll back a failed pause/resume.
    /// Counts as a transition only if the state changed.
    pub fn force(&self, target: RunState) {
        let previous = self
            .paused
            .swap(target == RunState::Paused, Ordering::AcqRel);
        if RunState::from_paused(previous) != target {
            self.transition_count.fetch_add(1, Ordering::Relaxed);
        }
    }
}
