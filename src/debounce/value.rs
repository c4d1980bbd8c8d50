//! Debounced Value Module
//!
//! A value that settles to the latest input once the input stops changing.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::debounce::DebounceTimer;
use crate::time::Scheduler;

// == Debounced Value ==
/// Tracks a continuously changing input and exposes a settled copy of it.
///
/// The settled value only moves to the latest input after `delay` has
/// passed without another `set`. Dropping the `DebouncedValue` cancels any
/// pending update, so nothing is published after teardown.
pub struct DebouncedValue<T> {
    timer: DebounceTimer,
    delay: Mutex<Duration>,
    latest: Mutex<T>,
    settled: Arc<watch::Sender<T>>,
}

impl<T> DebouncedValue<T>
where
    T: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a debounced value, settled at `initial`.
    pub fn new(scheduler: Arc<dyn Scheduler>, initial: T, delay: Duration) -> Self {
        let (settled, _) = watch::channel(initial.clone());
        Self {
            timer: DebounceTimer::new(scheduler),
            delay: Mutex::new(delay),
            latest: Mutex::new(initial),
            settled: Arc::new(settled),
        }
    }

    // == Set ==
    /// Records a new input and restarts the quiet window.
    pub fn set(&self, value: T) {
        let delay = self.delay();
        // Held across the restart so the pending update matches `latest`
        let mut latest = self.latest.lock();
        *latest = value.clone();
        self.timer.restart(delay, self.settle_task(value));
    }

    // == Get ==
    /// Returns the settled value.
    pub fn get(&self) -> T {
        self.settled.borrow().clone()
    }

    /// Returns the most recent input, settled or not.
    pub fn latest(&self) -> T {
        self.latest.lock().clone()
    }

    // == Subscribe ==
    /// Returns a receiver notified each time the value settles.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.settled.subscribe()
    }

    // == Delay ==
    /// Current quiet period.
    pub fn delay(&self) -> Duration {
        *self.delay.lock()
    }

    /// Changes the quiet period. A pending update restarts its wait using
    /// the new delay.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
        let latest = self.latest.lock();
        self.timer.restart_if_pending(delay, self.settle_task(latest.clone()));
    }

    // == Cancel ==
    /// Discards a pending update; the settled value stays as it is.
    pub fn cancel(&self) -> bool {
        self.timer.cancel()
    }

    pub fn is_pending(&self) -> bool {
        self.timer.is_pending()
    }

    fn settle_task(&self, value: T) -> impl FnOnce() + Send + 'static {
        let settled = Arc::clone(&self.settled);
        move || {
            settled.send_replace(value);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for DebouncedValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebouncedValue")
            .field("settled", &*self.settled.borrow())
            .field("latest", &*self.latest.lock())
            .field("delay", &*self.delay.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualClock;

    fn search_box(delay_ms: u64) -> (ManualClock, DebouncedValue<String>) {
        let clock = ManualClock::new();
        let value = DebouncedValue::new(
            Arc::new(clock.clone()),
            "initial".to_string(),
            Duration::from_millis(delay_ms),
        );
        (clock, value)
    }

    #[test]
    fn test_value_settles_after_delay() {
        let (clock, value) = search_box(500);
        assert_eq!(value.get(), "initial");

        value.set("updated".to_string());
        clock.advance_ms(400);
        assert_eq!(value.get(), "initial");
        assert_eq!(value.latest(), "updated");

        clock.advance_ms(500);
        assert_eq!(value.get(), "updated");
        assert!(!value.is_pending());
    }

    #[test]
    fn test_rapid_changes_settle_on_last() {
        let (clock, value) = search_box(100);

        for text in ["s", "se", "sea", "sear", "search"] {
            value.set(text.to_string());
            clock.advance_ms(50);
        }
        assert_eq!(value.get(), "initial");

        clock.advance_ms(50);
        assert_eq!(value.get(), "search");
    }

    #[test]
    fn test_drop_cancels_pending_update() {
        let (clock, value) = search_box(500);
        let mut rx = value.subscribe();

        value.set("updated".to_string());
        clock.advance_ms(400);
        drop(value);

        clock.advance_ms(1000);
        assert_eq!(*rx.borrow_and_update(), "initial");
        assert_eq!(clock.pending(), 0);
    }

    #[test]
    fn test_cancel_keeps_settled_value() {
        let (clock, value) = search_box(100);

        value.set("draft".to_string());
        assert!(value.cancel());

        clock.advance_ms(500);
        assert_eq!(value.get(), "initial");
        assert_eq!(value.latest(), "draft");
    }

    #[test]
    fn test_set_delay_restarts_pending_wait() {
        let (clock, value) = search_box(100);

        value.set("query".to_string());
        clock.advance_ms(80);
        value.set_delay(Duration::from_millis(300));

        clock.advance_ms(200);
        assert_eq!(value.get(), "initial");

        clock.advance_ms(100);
        assert_eq!(value.get(), "query");
    }

    #[test]
    fn test_set_delay_when_idle_schedules_nothing() {
        let (clock, value) = search_box(100);

        value.set_delay(Duration::from_millis(300));
        assert_eq!(value.delay(), Duration::from_millis(300));
        assert_eq!(clock.pending(), 0);
    }

    #[test]
    fn test_concurrent_sets_settle_on_latest() {
        let (clock, value) = search_box(100);
        let value = Arc::new(value);

        let writers: Vec<_> = (0..8)
            .map(|n| {
                let value = Arc::clone(&value);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        value.set(format!("{n}-{i}"));
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        clock.advance_ms(100);
        assert_eq!(value.get(), value.latest());
        assert_eq!(clock.pending(), 0);
    }

    #[test]
    fn test_subscriber_sees_settled_value() {
        let (clock, value) = search_box(100);
        let mut rx = value.subscribe();

        value.set("a".to_string());
        value.set("ab".to_string());
        assert!(!rx.has_changed().unwrap_or(false));

        clock.advance_ms(100);
        assert!(rx.has_changed().unwrap_or(false));
        assert_eq!(*rx.borrow_and_update(), "ab");
    }

    #[test]
    fn test_zero_delay_settles_on_next_tick() {
        let (clock, value) = search_box(0);

        value.set("now".to_string());
        assert_eq!(value.get(), "initial");

        clock.advance_ms(0);
        assert_eq!(value.get(), "now");
    }
}
