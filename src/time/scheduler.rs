//! Scheduler Module
//!
//! Schedule-after-delay and cancel-by-handle, backed by the tokio runtime.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::trace;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

// == Timer Id ==
/// Handle identifying one scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub(crate) fn raw(self) -> u64 {
        self.0
    }
}

// == Scheduler Trait ==
/// Runs tasks after a delay and cancels them by id.
///
/// Implementations never run a task synchronously inside `schedule`, even
/// with a zero delay. Cancelling an id that already fired or was already
/// cancelled is a no-op.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, delay: Duration, task: Task) -> TimerId;
    fn cancel(&self, id: TimerId);
}

// == Tokio Scheduler ==
/// Scheduler spawning one sleeping task per timer on a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
    inner: Arc<Timers>,
}

#[derive(Debug, Default)]
struct Timers {
    next_id: AtomicU64,
    /// Timers that have not fired or been cancelled yet
    live: Mutex<HashMap<TimerId, AbortHandle>>,
}

impl TokioScheduler {
    /// Creates a scheduler spawning onto the given runtime.
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            inner: Arc::new(Timers::default()),
        }
    }

    /// Creates a scheduler for the runtime of the calling context.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime, like `Handle::current`.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Number of timers still waiting to fire.
    pub fn pending(&self) -> usize {
        self.inner.live.lock().len()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TimerId {
        let id = TimerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let timers = Arc::clone(&self.inner);

        // Registration happens under the lock so the task cannot deregister
        // itself before its abort handle is recorded.
        let mut live = self.inner.live.lock();
        let join = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            let registered = timers.live.lock().remove(&id).is_some();
            if registered {
                trace!(timer = id.0, "timer fired");
                task();
            }
        });
        live.insert(id, join.abort_handle());
        id
    }

    fn cancel(&self, id: TimerId) {
        let removed = self.inner.live.lock().remove(&id);
        if let Some(abort) = removed {
            abort.abort();
            trace!(timer = id.0, "timer cancelled");
        }
    }
}
