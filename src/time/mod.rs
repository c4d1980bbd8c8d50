//! Time Module
//!
//! Host time services injected into the debouncer and the cache: a wall
//! clock and a cancellable timer scheduler.

mod clock;
mod manual;
mod scheduler;

pub use clock::{Clock, SystemClock};
pub use manual::ManualClock;
pub use scheduler::{Scheduler, Task, TimerId, TokioScheduler};
