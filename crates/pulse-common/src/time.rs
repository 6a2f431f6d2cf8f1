//! Wrapping microsecond timestamps.
//!
//! The monotonic clock collaborator is a free-running 32-bit microsecond
//! counter that overflows roughly every 71.6 minutes. Ordering between two
//! timestamps is therefore only meaningful through the signed difference
//! `a - b` reinterpreted as `i32`, which is correct as long as the two
//! points are less than 2^31 µs apart.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// A point on the wrapping 32-bit microsecond timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Micros(pub u32);

impl Micros {
    /// Timestamp zero.
    pub const ZERO: Micros = Micros(0);

    /// Raw counter value.
    #[inline]
    #[must_use]
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Advance by `delta_us`, wrapping at 2^32.
    #[inline]
    #[must_use]
    pub fn wrapping_add(self, delta_us: u32) -> Micros {
        Micros(self.0.wrapping_add(delta_us))
    }

    /// Signed distance `self - earlier` in microseconds.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn signed_since(self, earlier: Micros) -> i32 {
        self.0.wrapping_sub(earlier.0) as i32
    }

    /// Has `self` (now) reached or passed `deadline`?
    #[inline]
    #[must_use]
    pub fn is_reached(self, deadline: Micros) -> bool {
        self.signed_since(deadline) >= 0
    }
}

impl fmt::Display for Micros {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}us", self.0)
    }
}

/// Convert a period to whole microseconds, saturating at `u32::MAX`.
#[must_use]
pub fn period_micros(period: Duration) -> u32 {
    u32::try_from(period.as_micros()).unwrap_or(u32::MAX)
}
