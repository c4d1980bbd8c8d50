//! Configuration Module
//!
//! Handles loading cache and debounce settings from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// TTL in minutes applied by `write`/`read` when none is given
    pub default_ttl_minutes: u64,
    /// Quiet period in milliseconds for debounced input
    pub debounce_ms: u64,
    /// File backing the durable cache store
    pub cache_path: PathBuf,
    /// Byte quota for the durable store, None = unlimited
    pub store_quota_bytes: Option<usize>,
}

/// Default store quota, the usual browser local storage allowance.
pub const DEFAULT_STORE_QUOTA: usize = 5 * 1024 * 1024;

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SETTLE_CACHE_TTL_MINUTES` - Default cache TTL in minutes (default: 2)
    /// - `SETTLE_DEBOUNCE_MS` - Debounce delay in milliseconds (default: 200)
    /// - `SETTLE_CACHE_PATH` - Cache file path (default: settle-cache.json)
    /// - `SETTLE_STORE_QUOTA_BYTES` - Store quota, 0 disables it (default: 5 MiB)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_ttl_minutes: env::var("SETTLE_CACHE_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_ttl_minutes),
            debounce_ms: env::var("SETTLE_DEBOUNCE_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.debounce_ms),
            cache_path: env::var("SETTLE_CACHE_PATH")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_path),
            store_quota_bytes: match env::var("SETTLE_STORE_QUOTA_BYTES")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
            {
                Some(0) => None,
                Some(quota) => Some(quota),
                None => defaults.store_quota_bytes,
            },
        }
    }

    /// Default cache TTL as a Duration.
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_minutes.saturating_mul(60))
    }

    /// Debounce delay as a Duration.
    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_ttl_minutes: 2,
            debounce_ms: 200,
            cache_path: PathBuf::from("settle-cache.json"),
            store_quota_bytes: Some(DEFAULT_STORE_QUOTA),
        }
    }
}
