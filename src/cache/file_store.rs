//! File Store Module
//!
//! Durable key-value store persisting to a single JSON file, surviving
//! process restarts the way browser local storage survives reloads.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::cache::kv::{Entries, KeyValueStore};
use crate::config::Config;
use crate::error::{StoreError, StoreResult};

// == File Store ==
/// Key-value store backed by a JSON object file.
///
/// The whole map is held in memory and rewritten after every mutation,
/// via a temporary file and a rename so a crash never leaves a torn file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<Entries>,
}

impl FileStore {
    // == Open ==
    /// Opens the store at `path`, creating it on first write if missing.
    ///
    /// # Errors
    /// `StoreError::Corrupt` if the file exists but is not a JSON object of
    /// strings, `StoreError::Io` if it cannot be read.
    pub fn open(path: impl Into<PathBuf>, quota: Option<usize>) -> StoreResult<Self> {
        let path = path.into();

        let map: BTreeMap<String, String> = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text)
                .map_err(|e| StoreError::Corrupt(format!("{}: {}", path.display(), e)))?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        info!(
            "File store opened at {} with {} entries",
            path.display(),
            map.len()
        );

        Ok(Self {
            path,
            entries: Mutex::new(Entries::new(map, quota)),
        })
    }

    /// Opens the store configured by `SETTLE_CACHE_PATH`.
    pub fn from_config(config: &Config) -> StoreResult<Self> {
        Self::open(&config.cache_path, config.store_quota_bytes)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes currently in use.
    pub fn used_bytes(&self) -> usize {
        self.entries.lock().used_bytes()
    }

    /// Sibling file the next flush is written to before the rename.
    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn persist(&self, entries: &Entries) -> StoreResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string(entries.map())?;
        let staging = self.staging_path();
        fs::write(&staging, json)?;
        fs::rename(&staging, &self.path)?;

        debug!("File store flushed {} entries", entries.len());
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut entries = self.entries.lock();
        let previous = entries.insert(key, value)?;

        // Memory and disk stay in step: undo the insert if the flush fails
        if let Err(e) = self.persist(&entries) {
            entries.restore(key, previous);
            return Err(e);
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        let mut entries = self.entries.lock();
        let Some(previous) = entries.remove(key) else {
            return Ok(());
        };

        if let Err(e) = self.persist(&entries) {
            entries.restore(key, Some(previous));
            return Err(e);
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}
