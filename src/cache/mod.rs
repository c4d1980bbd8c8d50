//! Cache Module
//!
//! Expiring key-value cache for computed query results, backed by a
//! durable string store. Expiry is lazy: entries are only purged when a
//! read finds them stale.

mod entry;
mod expiring;
mod file_store;
mod key;
mod kv;
mod stats;


// Re-export public types
pub use entry::CacheEntry;
pub use expiring::ExpiringCache;
pub use file_store::FileStore;
pub use key::{cache_key, canonical_params};
pub use kv::{KeyValueStore, MemoryStore};
pub use stats::CacheStats;

use std::time::Duration;

// == Public Constants ==
/// TTL applied when a cache is created without an explicit default
pub const DEFAULT_TTL: Duration = Duration::from_secs(2 * 60);

/// Converts whole minutes to a TTL.
pub const fn minutes(n: u64) -> Duration {
    Duration::from_secs(n.saturating_mul(60))
}
