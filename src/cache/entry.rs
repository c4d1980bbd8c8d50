//! Cache Entry Module
//!
//! The persisted shape of a cached payload and its expiry checks.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// == Cache Entry ==
/// A cached payload stamped with its write time.
///
/// Persisted as `{"data": ..., "storedAt": ms, "expiresAt": ms}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<T> {
    /// The cached payload
    pub data: T,
    /// Write timestamp (Unix milliseconds)
    pub stored_at: u64,
    /// Write timestamp plus the TTL given at write time
    pub expires_at: u64,
}

impl<T> CacheEntry<T> {
    // == Constructor ==
    /// Creates an entry written at `now_ms` with the given TTL.
    pub fn new(data: T, now_ms: u64, ttl: Duration) -> Self {
        Self {
            data,
            stored_at: now_ms,
            expires_at: now_ms.saturating_add(ttl_ms(ttl)),
        }
    }

    /// Milliseconds since the entry was written.
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.stored_at)
    }

    // == Is Expired ==
    /// Checks the entry against a TTL supplied at read time.
    ///
    /// The entry is stale once its age strictly exceeds `ttl`. The TTL is
    /// the reader's, not the writer's, so a shorter read TTL expires an
    /// entry early and a longer one keeps it alive past `expires_at`.
    pub fn is_expired(&self, now_ms: u64, ttl: Duration) -> bool {
        self.age_ms(now_ms) > ttl_ms(ttl)
    }

    /// Remaining lifetime under `ttl`, zero once expired.
    pub fn ttl_remaining_ms(&self, now_ms: u64, ttl: Duration) -> u64 {
        ttl_ms(ttl).saturating_sub(self.age_ms(now_ms))
    }
}

fn ttl_ms(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
}
