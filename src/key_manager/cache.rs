//! Read-through app config cache.
//!
//! Maps app id to an [`AppConfig`] snapshot and its insertion time, stored in
//! a thread-safe DashMap. Entries are never swept; age is checked on read.
//! Concurrent refreshes of the same app are last-writer-wins.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::api_auth::models::AppConfig;

#[derive(Debug, Clone)]
struct CacheEntry {
    config: AppConfig,
    inserted_at: DateTime<Utc>,
}

/// Outcome of a cache lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Hit(AppConfig),
    /// Present but older than the expiry; treat as a miss
    Stale { age_ms: i64 },
    Miss,
}

/// Observability snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    /// Live entries, stale ones included until overwritten or cleared
    pub size: usize,
}

/// Thread-safe TTL cache of app configs.
#[derive(Debug)]
pub struct AppCache {
    entries: DashMap<String, CacheEntry>,
    expiry_ms: i64,
}

impl AppCache {
    /// Create a cache whose entries live `expiry_secs` seconds.
    pub fn new(expiry_secs: u64) -> Self {
        Self {
            entries: DashMap::new(),
            expiry_ms: i64::try_from(expiry_secs.saturating_mul(1000)).unwrap_or(i64::MAX),
        }
    }

    /// Look up `app_id` as of `now`.
    ///
    /// Valid iff `now - inserted_at < expiry`.
    pub fn lookup(&self, app_id: &str, now: DateTime<Utc>) -> CacheLookup {
        let Some(entry) = self.entries.get(app_id) else {
            return CacheLookup::Miss;
        };
        let age_ms = (now - entry.inserted_at).num_milliseconds();
        if age_ms < self.expiry_ms {
            CacheLookup::Hit(entry.config.clone())
        } else {
            CacheLookup::Stale { age_ms }
        }
    }

    /// Insert or overwrite the entry for `config.app_id`.
    pub fn insert(&self, config: AppConfig, now: DateTime<Utc>) {
        self.entries.insert(
            config.app_id.clone(),
            CacheEntry {
                config,
                inserted_at: now,
            },
        );
    }

    /// Drop one entry.
    pub fn remove(&self, app_id: &str) {
        self.entries.remove(app_id);
    }

    /// Drop every entry, returning how many there were.
    pub fn clear(&self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.len(),
        }
    }
}
