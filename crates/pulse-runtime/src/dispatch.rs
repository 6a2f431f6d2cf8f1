//! Process-wide tick dispatch slot.
//!
//! Some interrupt vectors are plain `fn()` and cannot carry a pointer to the
//! scheduler they serve. For those, the scheduler registers itself here on
//! start and the vector calls [`dispatch_tick`]. Only one scheduler can hold
//! the slot at a time; a second registration fails with
//! [`PulseError::InstanceConflict`] until the first is dropped.
//!
//! Triggers that can carry their handler (every trigger in this crate
//! except a context-free [`SimulatedTrigger`](crate::trigger::SimulatedTrigger))
//! never touch the slot, so any number of those schedulers can coexist.

use pulse_common::error::{PulseError, PulseResult};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tracing::{debug, trace};

/// Something that can run one acquisition cycle from the urgent context.
pub trait TickTarget: Send + Sync {
    /// Handle one periodic tick.
    fn on_tick(&self);
}

static SLOT: Mutex<Option<Weak<dyn TickTarget>>> = Mutex::new(None);

fn slot() -> std::sync::MutexGuard<'static, Option<Weak<dyn TickTarget>>> {
    SLOT.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Ownership of the dispatch slot. Dropping it empties the slot.
#[derive(Debug)]
#[must_use = "the slot is released when the registration is dropped"]
pub struct Registration {
    target: Weak<dyn TickTarget>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        let mut slot = slot();
        if slot
            .as_ref()
            .is_some_and(|current| Weak::ptr_eq(current, &self.target))
        {
            *slot = None;
            debug!("Tick dispatch slot released");
        }
    }
}

/// Claim the slot for `target`.
///
/// A slot whose previous holder has been dropped counts as free.
///
/// # Errors
///
/// [`PulseError::InstanceConflict`] if another live target holds the slot.
pub fn register(target: &Arc<dyn TickTarget>) -> PulseResult<Registration> {
    let mut slot = slot();
    if slot.as_ref().and_then(Weak::upgrade).is_some() {
        return Err(PulseError::InstanceConflict);
    }
    let weak = Arc::downgrade(target);
    *slot = Some(weak.clone());
    debug!("Tick dispatch slot claimed");
    Ok(Registration { target: weak })
}

/// Deliver one tick to the registered target.
///
/// Returns `false` if nothing is registered. The slot lock is released
/// before the target runs.
pub fn dispatch_tick() -> bool {
    let target = slot().as_ref().and_then(Weak::upgrade);
    match target {
        Some(target) => {
            target.on_tick();
            true
        }
        None => {
            trace!("Tick with no registered target");
            false
        }
    }
}

/// True while a live target holds the slot.
#[must_use]
pub fn is_registered() -> bool {
    slot().as_ref().and_then(Weak::upgrade).is_some()
}

/// Serializes tests that touch the process-wide slot.
#[cfg(test)]
pub(crate) fn test_guard() -> std::sync::MutexGuard<'static, ()> {
    static GUARD: Mutex<()> = Mutex::new(());
    GUARD.lock().unwrap_or_else(PoisonError::into_inner)
}
