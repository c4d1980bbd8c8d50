//! Expiring Cache Module
//!
//! Stores query results under `name + canonical params` with a TTL checked
//! lazily at read time. Every failure degrades to "not cached": reads
//! return `None`, writes are dropped, and the error is logged and counted.

use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::{
    cache_key, canonical_params, CacheEntry, CacheStats, FileStore, KeyValueStore, DEFAULT_TTL,
};
use crate::config::Config;
use crate::error::{CacheError, Result, StoreResult};
use crate::time::{Clock, SystemClock};

// == Expiring Cache ==
/// Fail-open TTL cache over a durable key-value store.
///
/// TTLs are compared at read time against the write timestamp, using the
/// TTL passed to the read. Reading with a different TTL than the write
/// moves the effective expiry accordingly.
#[derive(Debug)]
pub struct ExpiringCache<S, C = SystemClock> {
    store: S,
    clock: C,
    default_ttl: Duration,
    stats: Mutex<CacheStats>,
}

impl<S: KeyValueStore> ExpiringCache<S> {
    /// Creates a cache on the wall clock with the default two minute TTL.
    pub fn new(store: S) -> Self {
        Self::with_clock(store, SystemClock)
    }
}

impl ExpiringCache<FileStore> {
    /// Opens the configured file store and applies the configured TTL.
    pub fn from_config(config: &Config) -> StoreResult<Self> {
        let store = FileStore::from_config(config)?;
        Ok(Self::new(store).with_default_ttl(config.default_ttl()))
    }
}

impl<S: KeyValueStore, C: Clock> ExpiringCache<S, C> {
    // == Constructors ==
    /// Creates a cache reading time from `clock`.
    pub fn with_clock(store: S, clock: C) -> Self {
        Self {
            store,
            clock,
            default_ttl: DEFAULT_TTL,
            stats: Mutex::new(CacheStats::new()),
        }
    }

    /// Replaces the TTL used by `write` and `read`.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    // == Write ==
    /// Caches `data` for the query with the default TTL.
    pub fn write<P, T>(&self, name: &str, params: &P, data: &T)
    where
        P: Serialize + ?Sized,
        T: Serialize + ?Sized,
    {
        self.write_with_ttl(name, params, data, self.default_ttl);
    }

    /// Caches `data` for the query, overwriting any previous entry.
    ///
    /// Never fails: a store error (quota, I/O) or an unserializable value is
    /// logged and the write is dropped.
    pub fn write_with_ttl<P, T>(&self, name: &str, params: &P, data: &T, ttl: Duration)
    where
        P: Serialize + ?Sized,
        T: Serialize + ?Sized,
    {
        match self.try_write(name, params, data, ttl) {
            Ok(key) => {
                debug!(key = %key, ttl = ?ttl, "Cache write");
                self.stats.lock().record_write();
            }
            Err(e) => {
                warn!(query = name, error = %e, "Cache write failed, entry not cached");
                self.stats.lock().record_failure();
            }
        }
    }

    // == Read ==
    /// Looks up the query with the default TTL.
    pub fn read<P, T>(&self, name: &str, params: &P) -> Option<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.read_with_ttl(name, params, self.default_ttl)
    }

    /// Looks up the query, treating entries older than `ttl` as absent.
    ///
    /// A stale entry is removed from the store before returning `None`. An
    /// unreadable entry or a store error also yields `None`.
    pub fn read_with_ttl<P, T>(&self, name: &str, params: &P, ttl: Duration) -> Option<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        match self.try_read(name, params, ttl) {
            Ok(found) => found,
            Err(e) => {
                warn!(query = name, error = %e, "Cache read failed, treating as absent");
                let mut stats = self.stats.lock();
                stats.record_failure();
                stats.record_miss();
                None
            }
        }
    }

    // == Invalidate ==
    /// Removes the query's entry if present.
    pub fn invalidate<P>(&self, name: &str, params: &P)
    where
        P: Serialize + ?Sized,
    {
        let result =
            key_for(name, params).and_then(|key| self.store.remove(&key).map_err(CacheError::from));
        if let Err(e) = result {
            warn!(query = name, error = %e, "Cache invalidate failed");
            self.stats.lock().record_failure();
        }
    }

    // == Read-through ==
    /// Returns the cached value, or computes, caches, and returns it.
    ///
    /// Errors from `compute` are returned as-is and nothing is cached.
    pub fn get_or_compute<P, T, E, F>(
        &self,
        name: &str,
        params: &P,
        ttl: Duration,
        compute: F,
    ) -> std::result::Result<T, E>
    where
        P: Serialize + ?Sized,
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> std::result::Result<T, E>,
    {
        if let Some(cached) = self.read_with_ttl(name, params, ttl) {
            return Ok(cached);
        }
        let value = compute()?;
        self.write_with_ttl(name, params, &value, ttl);
        Ok(value)
    }

    /// Async form of `get_or_compute` for fetched results.
    pub async fn get_or_fetch<P, T, E, F, Fut>(
        &self,
        name: &str,
        params: &P,
        ttl: Duration,
        fetch: F,
    ) -> std::result::Result<T, E>
    where
        P: Serialize + ?Sized,
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        if let Some(cached) = self.read_with_ttl(name, params, ttl) {
            return Ok(cached);
        }
        let value = fetch().await?;
        self.write_with_ttl(name, params, &value, ttl);
        Ok(value)
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.lock().clone();
        stats.set_total_entries(self.store.len());
        stats
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn try_write<P, T>(&self, name: &str, params: &P, data: &T, ttl: Duration) -> Result<String>
    where
        P: Serialize + ?Sized,
        T: Serialize + ?Sized,
    {
        let key = key_for(name, params)?;
        let entry = CacheEntry::new(data, self.clock.now_ms(), ttl);
        let encoded = serde_json::to_string(&entry).map_err(CacheError::Encode)?;
        self.store.set(&key, &encoded)?;
        Ok(key)
    }

    fn try_read<P, T>(&self, name: &str, params: &P, ttl: Duration) -> Result<Option<T>>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let key = key_for(name, params)?;
        let Some(raw) = self.store.get(&key)? else {
            debug!(key = %key, "Cache miss");
            self.stats.lock().record_miss();
            return Ok(None);
        };

        let entry: CacheEntry<T> =
            serde_json::from_str(&raw).map_err(|source| CacheError::Decode {
                key: key.clone(),
                source,
            })?;

        let now = self.clock.now_ms();
        if entry.is_expired(now, ttl) {
            debug!(key = %key, age_ms = entry.age_ms(now), "Cache entry expired, purging");
            self.stats.lock().record_expired();
            if let Err(e) = self.store.remove(&key) {
                warn!(key = %key, error = %e, "Failed to purge expired cache entry");
                self.stats.lock().record_failure();
            }
            return Ok(None);
        }

        debug!(
            key = %key,
            ttl_remaining_ms = entry.ttl_remaining_ms(now, ttl),
            "Cache hit"
        );
        self.stats.lock().record_hit();
        Ok(Some(entry.data))
    }
}

fn key_for<P: Serialize + ?Sized>(name: &str, params: &P) -> Result<String> {
    let serialized = canonical_params(params).map_err(CacheError::Encode)?;
    Ok(cache_key(name, &serialized))
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{minutes, MemoryStore};
    use crate::error::StoreError;
    use crate::time::ManualClock;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::io;

    type Outcome<T, E> = std::result::Result<T, E>;

    /// A store whose every operation fails.
    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> StoreResult<Option<String>> {
            Err(StoreError::Io(io::Error::new(io::ErrorKind::Other, "disk gone")))
        }
        fn set(&self, key: &str, value: &str) -> StoreResult<()> {
            Err(StoreError::QuotaExceeded {
                used: 0,
                needed: key.len() + value.len(),
                quota: 0,
            })
        }
        fn remove(&self, _key: &str) -> StoreResult<()> {
            Err(StoreError::Io(io::Error::new(io::ErrorKind::Other, "disk gone")))
        }
        fn len(&self) -> usize {
            0
        }
    }

    fn cache() -> (ManualClock, ExpiringCache<MemoryStore, ManualClock>) {
        let clock = ManualClock::starting_at(1_700_000_000_000);
        let cache = ExpiringCache::with_clock(MemoryStore::new(), clock.clone());
        (clock, cache)
    }

    #[test]
    fn test_write_then_read() {
        let (_, cache) = cache();

        cache.write_with_ttl("name", &json!({"a": 1}), &json!({"x": 1}), minutes(5));
        let value: Option<Value> = cache.read_with_ttl("name", &json!({"a": 1}), minutes(5));

        assert_eq!(value, Some(json!({"x": 1})));
    }

    #[test]
    fn test_read_never_written_is_absent() {
        let (_, cache) = cache();

        let value: Option<Value> = cache.read("name", &json!({"a": 1}));
        assert!(value.is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_expired_entry_is_purged() {
        let (clock, cache) = cache();
        let params = json!({"a": 1});
        let key = cache_key("name", &canonical_params(&params).unwrap());

        cache.write_with_ttl("name", &params, &"payload", minutes(1));
        clock.advance(Duration::from_secs(61));

        let value: Option<String> = cache.read_with_ttl("name", &params, minutes(1));
        assert!(value.is_none());
        assert!(!cache.store().contains(&key));

        let stats = cache.stats();
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.total_entries, 0);
    }

    #[test]
    fn test_entry_served_until_ttl_elapses() {
        let (clock, cache) = cache();

        cache.write_with_ttl("name", &1, &"payload", minutes(1));
        clock.advance(Duration::from_secs(60));

        let value: Option<String> = cache.read_with_ttl("name", &1, minutes(1));
        assert_eq!(value.as_deref(), Some("payload"));
    }

    #[test]
    fn test_read_ttl_overrides_write_ttl() {
        let (clock, cache) = cache();

        cache.write_with_ttl("short", &(), &1, minutes(5));
        cache.write_with_ttl("long", &(), &2, minutes(1));
        clock.advance(Duration::from_secs(2 * 60));

        // Written for five minutes, read with a one minute TTL
        assert_eq!(cache.read_with_ttl::<_, i32>("short", &(), minutes(1)), None);
        // Written for one minute, read with a ten minute TTL
        assert_eq!(cache.read_with_ttl::<_, i32>("long", &(), minutes(10)), Some(2));
    }

    #[test]
    fn test_overwrite_resets_timestamp() {
        let (clock, cache) = cache();

        cache.write("name", &(), &"first");
        clock.advance(Duration::from_secs(90));
        cache.write("name", &(), &"second");
        clock.advance(Duration::from_secs(90));

        let value: Option<String> = cache.read("name", &());
        assert_eq!(value.as_deref(), Some("second"));
    }

    #[test]
    fn test_default_ttl_is_two_minutes() {
        let (clock, cache) = cache();
        assert_eq!(cache.default_ttl(), minutes(2));

        cache.write("name", &(), &1);
        clock.advance(Duration::from_secs(121));

        assert_eq!(cache.read::<_, i32>("name", &()), None);
    }

    #[test]
    fn test_field_order_does_not_change_key() {
        #[derive(Serialize)]
        struct Forward {
            page: u32,
            sort: &'static str,
        }

        let (_, cache) = cache();
        cache.write("list", &Forward { page: 2, sort: "name" }, &"rows");

        let mut reordered = HashMap::new();
        reordered.insert("sort", json!("name"));
        reordered.insert("page", json!(2));

        assert_eq!(cache.read::<_, String>("list", &reordered).as_deref(), Some("rows"));
    }

    #[test]
    fn test_store_write_failure_is_swallowed() {
        let cache = ExpiringCache::with_clock(BrokenStore, ManualClock::new());

        cache.write("name", &json!({"a": 1}), &json!({"x": 1}));
        let value: Option<Value> = cache.read("name", &json!({"a": 1}));
        cache.invalidate("name", &json!({"a": 1}));

        assert!(value.is_none());
        let stats = cache.stats();
        assert_eq!(stats.failures, 3);
        assert_eq!(stats.writes, 0);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_quota_exceeded_is_swallowed() {
        let cache = ExpiringCache::with_clock(MemoryStore::with_quota(16), ManualClock::new());

        cache.write("name", &(), &"a payload far larger than sixteen bytes");

        assert!(cache.store().is_empty());
        assert_eq!(cache.read::<_, String>("name", &()), None);
        assert_eq!(cache.stats().failures, 1);
    }

    #[test]
    fn test_corrupt_entry_reads_as_absent() {
        let (_, cache) = cache();
        cache.store().set("name1", "{not json").unwrap();
        cache.store().set("name2", r#"{"data": 1}"#).unwrap();

        assert_eq!(cache.read::<_, i32>("name", &1), None);
        assert_eq!(cache.read::<_, i32>("name", &2), None);
        assert_eq!(cache.stats().failures, 2);
    }

    #[test]
    fn test_type_mismatch_reads_as_absent() {
        let (_, cache) = cache();

        cache.write("name", &(), &"text");
        assert_eq!(cache.read::<_, u64>("name", &()), None);
        // Still there for a reader expecting the right type
        assert_eq!(cache.read::<_, String>("name", &()).as_deref(), Some("text"));
    }

    #[test]
    fn test_unserializable_params_are_swallowed() {
        let (_, cache) = cache();
        let mut params = HashMap::new();
        params.insert((1u8, 2u8), 3u8);

        cache.write("name", &params, &1);
        assert_eq!(cache.read::<_, i32>("name", &params), None);
        assert_eq!(cache.stats().failures, 2);
    }

    #[test]
    fn test_invalidate_removes_entry() {
        let (_, cache) = cache();

        cache.write("name", &1, &"payload");
        cache.invalidate("name", &1);
        // Invalidating again is fine
        cache.invalidate("name", &1);

        assert_eq!(cache.read::<_, String>("name", &1), None);
        assert_eq!(cache.stats().failures, 0);
    }

    #[test]
    fn test_get_or_compute_caches_result() {
        let (_, cache) = cache();
        let mut calls = 0;

        let first: Outcome<u32, String> =
            cache.get_or_compute("sum", &[1, 2], minutes(1), || {
                calls += 1;
                Ok(3)
            });
        let second: Outcome<u32, String> =
            cache.get_or_compute("sum", &[1, 2], minutes(1), || {
                calls += 1;
                Ok(99)
            });

        assert_eq!(first, Ok(3));
        assert_eq!(second, Ok(3));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_get_or_compute_error_is_not_cached() {
        let (_, cache) = cache();

        let failed: Outcome<u32, &str> =
            cache.get_or_compute("sum", &(), minutes(1), || Err("boom"));
        assert_eq!(failed, Err("boom"));
        assert!(cache.store().is_empty());
    }

    #[test]
    fn test_get_or_fetch_error_is_not_cached() {
        let (_, cache) = cache();

        let failed: Outcome<u8, String> = tokio_test::block_on(cache.get_or_fetch(
            "user",
            &1,
            minutes(1),
            || async { Err("offline".to_string()) },
        ));

        assert_eq!(failed, Err("offline".to_string()));
        assert!(cache.store().is_empty());
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn test_get_or_fetch_caches_result() {
        let (_, cache) = cache();

        let params = json!({"id": 1});
        let fetched: Outcome<Value, String> = cache
            .get_or_fetch("user", &params, minutes(1), || async {
                Ok(json!({"name": "Ada"}))
            })
            .await;
        assert_eq!(fetched, Ok(json!({"name": "Ada"})));

        let cached: Outcome<Value, String> = cache
            .get_or_fetch("user", &params, minutes(1), || async {
                Err("offline".to_string())
            })
            .await;
        assert_eq!(cached, Ok(json!({"name": "Ada"})));
        assert_eq!(cache.stats().hits, 1);
    }
}
