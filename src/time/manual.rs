//! Manual Clock Module
//!
//! Virtual time for deterministic tests and simulations. Nothing moves until
//! `advance` is called.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::time::{Clock, Scheduler, Task, TimerId};

// == Manual Clock ==
/// A clock and scheduler driven by explicit `advance` calls.
///
/// Clones share the same timeline.
#[derive(Clone, Default)]
pub struct ManualClock {
    state: Arc<Mutex<Timeline>>,
}

#[derive(Default)]
struct Timeline {
    now_ms: u64,
    next_seq: u64,
    /// Keyed by (deadline, schedule order)
    queue: BTreeMap<(u64, u64), Task>,
    deadlines: HashMap<TimerId, u64>,
}

impl ManualClock {
    /// Creates a timeline starting at Unix millisecond zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a timeline starting at the given Unix millisecond.
    pub fn starting_at(now_ms: u64) -> Self {
        let clock = Self::default();
        clock.state.lock().now_ms = now_ms;
        clock
    }

    /// Moves time forward, firing every task that falls due on the way.
    ///
    /// Tasks fire in deadline order, ties broken by schedule order, and each
    /// sees the clock set to its own deadline. Tasks scheduled while
    /// advancing fire too if they fall due before the target.
    pub fn advance(&self, by: Duration) {
        let target = self.state.lock().now_ms + duration_ms(by);

        loop {
            let due = {
                let mut timeline = self.state.lock();
                let ready = matches!(
                    timeline.queue.first_key_value(),
                    Some((&(deadline, _), _)) if deadline <= target
                );
                if ready {
                    timeline.queue.pop_first().map(|((deadline, seq), task)| {
                        timeline.deadlines.remove(&TimerId::new(seq));
                        timeline.now_ms = timeline.now_ms.max(deadline);
                        task
                    })
                } else {
                    None
                }
            };

            // Run outside the lock so tasks may schedule or cancel
            match due {
                Some(task) => task(),
                None => break,
            }
        }

        let mut timeline = self.state.lock();
        timeline.now_ms = timeline.now_ms.max(target);
    }

    /// Shorthand for `advance` in milliseconds.
    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    /// Number of tasks waiting to fire.
    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.state.lock().now_ms
    }
}

impl Scheduler for ManualClock {
    fn schedule(&self, delay: Duration, task: Task) -> TimerId {
        let mut timeline = self.state.lock();
        let seq = timeline.next_seq;
        timeline.next_seq += 1;

        let deadline = timeline.now_ms + duration_ms(delay);
        let id = TimerId::new(seq);
        timeline.queue.insert((deadline, seq), task);
        timeline.deadlines.insert(id, deadline);
        id
    }

    fn cancel(&self, id: TimerId) {
        let mut timeline = self.state.lock();
        if let Some(deadline) = timeline.deadlines.remove(&id) {
            timeline.queue.remove(&(deadline, id.raw()));
        }
    }
}

impl fmt::Debug for ManualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let timeline = self.state.lock();
        f.debug_struct("ManualClock")
            .field("now_ms", &timeline.now_ms)
            .field("pending", &timeline.queue.len())
            .finish()
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
