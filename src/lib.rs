//! Settle - debounced inputs and an expiring query cache
//!
//! Provides debounced callbacks and values over an injected scheduler, and
//! a fail-open TTL cache over a durable key-value store.

pub mod cache;
pub mod config;
pub mod debounce;
pub mod error;
pub mod time;

pub use cache::{ExpiringCache, FileStore, KeyValueStore, MemoryStore};
pub use config::Config;
pub use debounce::{DebounceMode, Debounced, DebouncedValue};
pub use time::{Clock, ManualClock, Scheduler, SystemClock, TokioScheduler};
