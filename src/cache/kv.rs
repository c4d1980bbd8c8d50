//! Key-Value Store Module
//!
//! The durable string store the cache persists into, and an in-memory
//! implementation of it.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{StoreError, StoreResult};

// == Key-Value Store Trait ==
/// A string-to-string store with independent keys.
///
/// Production code uses `FileStore`, tests can use `MemoryStore` or a
/// failing mock.
pub trait KeyValueStore: Send + Sync {
    /// Fetches the value stored under `key`
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Removes `key`; removing a missing key succeeds
    fn remove(&self, key: &str) -> StoreResult<()>;

    /// Number of stored keys
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains(&self, key: &str) -> bool {
        matches!(self.get(key), Ok(Some(_)))
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Arc<S> {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        (**self).remove(key)
    }

    fn len(&self) -> usize {
        (**self).len()
    }
}

// == Entries ==
/// Key-value map with byte accounting against an optional quota.
///
/// Usage counts key and value bytes, the way browser storage quotas do.
#[derive(Debug, Default)]
pub(crate) struct Entries {
    map: BTreeMap<String, String>,
    used: usize,
    quota: Option<usize>,
}

impl Entries {
    pub(crate) fn new(map: BTreeMap<String, String>, quota: Option<usize>) -> Self {
        let used = map.iter().map(|(k, v)| k.len() + v.len()).sum();
        Self { map, used, quota }
    }

    pub(crate) fn get(&self, key: &str) -> Option<&String> {
        self.map.get(key)
    }

    /// Inserts a value, returning the one it replaced.
    pub(crate) fn insert(&mut self, key: &str, value: &str) -> StoreResult<Option<String>> {
        let freed = self.map.get(key).map_or(0, |old| key.len() + old.len());
        let needed = key.len() + value.len();

        if let Some(quota) = self.quota {
            let used = self.used - freed;
            if used + needed > quota {
                return Err(StoreError::QuotaExceeded {
                    used,
                    needed,
                    quota,
                });
            }
        }

        self.used = self.used - freed + needed;
        Ok(self.map.insert(key.to_string(), value.to_string()))
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<String> {
        let removed = self.map.remove(key);
        if let Some(old) = &removed {
            self.used -= key.len() + old.len();
        }
        removed
    }

    /// Puts back the value `insert` or `remove` displaced.
    pub(crate) fn restore(&mut self, key: &str, previous: Option<String>) {
        self.remove(key);
        if let Some(old) = previous {
            self.used += key.len() + old.len();
            self.map.insert(key.to_string(), old);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }

    pub(crate) fn used_bytes(&self) -> usize {
        self.used
    }

    pub(crate) fn map(&self) -> &BTreeMap<String, String> {
        &self.map
    }
}

// == Memory Store ==
/// Non-durable store for tests and single-process use.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<Entries>,
}

impl MemoryStore {
    /// Creates an empty store without a quota.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store refusing writes past `quota` bytes.
    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: Mutex::new(Entries::new(BTreeMap::new(), Some(quota))),
        }
    }

    /// Bytes currently in use.
    pub fn used_bytes(&self) -> usize {
        self.entries.lock().used_bytes()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.entries.lock().insert(key, value).map(|_| ())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}
