//! Debounce Timer Module
//!
//! The single-slot cancellable timer both debounce shapes are built on.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use crate::time::{Scheduler, TimerId};

// == Debounce Timer ==
/// Holds at most one pending task; every restart replaces it.
///
/// Each scheduled task carries the slot generation it was scheduled under
/// and only runs if that generation is still current when it fires, so a
/// cancel racing an already-expired timer never lets the stale task run.
/// Dropping the timer cancels the pending task.
pub struct DebounceTimer {
    scheduler: Arc<dyn Scheduler>,
    slot: Arc<Mutex<Slot>>,
}

#[derive(Debug, Default)]
struct Slot {
    pending: Option<TimerId>,
    generation: u64,
}

impl DebounceTimer {
    // == Constructor ==
    /// Creates an idle timer on the given scheduler.
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            scheduler,
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    // == Restart ==
    /// Cancels the pending task, if any, and schedules `task` after `delay`.
    ///
    /// Returns `true` when a pending task was replaced.
    pub fn restart<F>(&self, delay: Duration, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let mut slot = self.slot.lock();
        let replaced = self.clear(&mut slot);
        self.arm(&mut slot, delay, task);
        replaced
    }

    /// Like `restart`, but only when a task is pending. An idle timer stays
    /// idle and `task` is dropped.
    ///
    /// Returns `true` when the pending task was replaced.
    pub fn restart_if_pending<F>(&self, delay: Duration, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let mut slot = self.slot.lock();
        if slot.pending.is_none() {
            return false;
        }
        self.clear(&mut slot);
        self.arm(&mut slot, delay, task);
        true
    }

    // == Cancel ==
    /// Discards the pending task. Returns `false` if nothing was pending.
    pub fn cancel(&self) -> bool {
        let mut slot = self.slot.lock();
        self.clear(&mut slot)
    }

    // == Is Pending ==
    /// Returns true while a task is waiting to fire.
    pub fn is_pending(&self) -> bool {
        self.slot.lock().pending.is_some()
    }

    fn arm<F>(&self, slot: &mut Slot, delay: Duration, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let generation = slot.generation;
        let weak = Arc::downgrade(&self.slot);
        let id = self
            .scheduler
            .schedule(delay, Box::new(move || fire(weak, generation, task)));
        slot.pending = Some(id);
    }

    fn clear(&self, slot: &mut Slot) -> bool {
        slot.generation = slot.generation.wrapping_add(1);
        match slot.pending.take() {
            Some(id) => {
                self.scheduler.cancel(id);
                true
            }
            None => false,
        }
    }
}

/// Runs `task` if its slot still exists and was not restarted or cancelled.
fn fire<F: FnOnce()>(slot: Weak<Mutex<Slot>>, generation: u64, task: F) {
    let Some(slot) = slot.upgrade() else {
        return;
    };

    let current = {
        let mut slot = slot.lock();
        if slot.generation == generation && slot.pending.is_some() {
            slot.pending = None;
            true
        } else {
            false
        }
    };

    // Lock released so the task may restart this timer
    if current {
        task();
    }
}

impl Drop for DebounceTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for DebounceTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.slot.lock();
        f.debug_struct("DebounceTimer")
            .field("pending", &slot.pending)
            .field("generation", &slot.generation)
            .finish()
    }
}
