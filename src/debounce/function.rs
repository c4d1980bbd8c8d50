//! Debounced Function Module
//!
//! Wraps a callback so a burst of calls collapses into a single invocation.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::debounce::DebounceTimer;
use crate::time::Scheduler;

// == Debounce Mode ==
/// Which edge of a burst invokes the callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebounceMode {
    /// Fire once, `delay` after the last call, with the last call's arguments
    #[default]
    Trailing,
    /// Fire synchronously on the first call of a burst; no trailing call
    Leading,
}

// == Debounced ==
/// A debounced callback.
///
/// In trailing mode, calling `call` repeatedly with gaps shorter than the
/// delay invokes the callback once with the arguments of the final call.
/// In leading mode the first call of a burst invokes the callback at once
/// and later calls only extend the burst.
pub struct Debounced<A> {
    timer: DebounceTimer,
    callback: Arc<dyn Fn(A) + Send + Sync>,
    last_args: Arc<Mutex<Option<A>>>,
    delay: Mutex<Duration>,
    mode: DebounceMode,
}

impl<A: Send + 'static> Debounced<A> {
    // == Constructors ==
    /// Creates a trailing-edge debounced callback.
    pub fn new<F>(scheduler: Arc<dyn Scheduler>, delay: Duration, callback: F) -> Self
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        Self::with_mode(scheduler, delay, DebounceMode::Trailing, callback)
    }

    /// Creates a debounced callback firing on the given edge.
    pub fn with_mode<F>(
        scheduler: Arc<dyn Scheduler>,
        delay: Duration,
        mode: DebounceMode,
        callback: F,
    ) -> Self
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        Self {
            timer: DebounceTimer::new(scheduler),
            callback: Arc::new(callback),
            last_args: Arc::new(Mutex::new(None)),
            delay: Mutex::new(delay),
            mode,
        }
    }

    // == Call ==
    /// Registers a call, restarting the quiet window.
    pub fn call(&self, args: A) {
        let delay = self.delay();
        match self.mode {
            DebounceMode::Trailing => {
                let mut last = self.last_args.lock();
                *last = Some(args);
                self.timer.restart(delay, self.trailing_task());
            }
            DebounceMode::Leading => {
                // The window timer only marks the burst as open
                let in_burst = self.timer.restart(delay, || {});
                if !in_burst {
                    (self.callback)(args);
                }
            }
        }
    }

    // == Cancel ==
    /// Drops the pending invocation (trailing) or closes the burst (leading).
    ///
    /// Returns `false` if nothing was pending.
    pub fn cancel(&self) -> bool {
        let mut last = self.last_args.lock();
        last.take();
        self.timer.cancel()
    }

    /// Returns true while an invocation or burst window is pending.
    pub fn is_pending(&self) -> bool {
        self.timer.is_pending()
    }

    /// Current quiet period.
    pub fn delay(&self) -> Duration {
        *self.delay.lock()
    }

    /// Changes the quiet period. A pending invocation or open burst
    /// restarts its wait using the new delay.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
        match self.mode {
            DebounceMode::Trailing => {
                let _last = self.last_args.lock();
                self.timer.restart_if_pending(delay, self.trailing_task());
            }
            DebounceMode::Leading => {
                self.timer.restart_if_pending(delay, || {});
            }
        }
    }

    /// Invokes the callback with the stored arguments, if any remain.
    fn trailing_task(&self) -> impl FnOnce() + Send + 'static {
        let callback = Arc::clone(&self.callback);
        let last_args = Arc::clone(&self.last_args);
        move || {
            let args = last_args.lock().take();
            if let Some(args) = args {
                callback(args);
            }
        }
    }
}

impl<A> fmt::Debug for Debounced<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debounced")
            .field("timer", &self.timer)
            .field("delay", &*self.delay.lock())
            .field("mode", &self.mode)
            .finish()
    }
}
