//! Timestamped record cache with a fixed expiration window.
//!
//! Entries live under `"<namespace>:<key>|<version>"` as JSON
//! `{ "timestamp": <epoch ms>, "data": <RawRecord> }`. Bumping the version
//! hides every older entry; the next sweep deletes them.

use crate::config::schema::CacheConfig;
use crate::error::Result;
use crate::extractor::RawRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod file;
pub mod memory;
pub mod sqlite;

pub use file::FileBackend;
pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

/// Raw string storage underneath the cache.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<String>>;
    async fn store(&self, key: &str, value: String) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
    async fn keys(&self) -> Result<Vec<String>>;

    async fn remove_many(&self, keys: &[String]) -> Result<()> {
        for key in keys {
            self.remove(key).await?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub timestamp: i64,
    pub data: RawRecord,
}

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
    namespace: String,
    version: u32,
    expiration_ms: i64,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn CacheBackend>, config: &CacheConfig) -> Self {
        Self {
            backend,
            namespace: config.namespace.clone(),
            version: config.version,
            expiration_ms: i64::try_from(config.expiration_ms).unwrap_or(i64::MAX),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()), &CacheConfig::default())
    }

    fn prefix(&self) -> String {
        format!("{}:", self.namespace)
    }

    fn version_suffix(&self) -> String {
        format!("|{}", self.version)
    }

    pub fn storage_key(&self, key: &str) -> String {
        format!("{}{}{}", self.prefix(), key, self.version_suffix())
    }

    /// An age that does not fit in an `i64` counts as expired.
    fn is_fresh(&self, entry: &CacheEntry, now: i64) -> bool {
        now.checked_sub(entry.timestamp)
            .is_some_and(|age| age < self.expiration_ms)
    }

    pub async fn get(&self, key: &str) -> Option<RawRecord> {
        self.get_at(key, now_ms()).await
    }

    /// Never fails: unreadable or undecodable entries count as a miss.
    pub async fn get_at(&self, key: &str, now: i64) -> Option<RawRecord> {
        let storage_key = self.storage_key(key);

        let stored = match self.backend.load(&storage_key).await {
            Ok(Some(stored)) => stored,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("Cache read failed for {}: {}", storage_key, e);
                return None;
            }
        };

        match serde_json::from_str::<CacheEntry>(&stored) {
            Ok(entry) if self.is_fresh(&entry, now) => {
                log::debug!("Cache hit: {}", storage_key);
                Some(entry.data)
            }
            Ok(_) => None,
            Err(e) => {
                log::warn!("Failed to parse cached data for {}: {}", storage_key, e);
                None
            }
        }
    }

    pub async fn put(&self, key: &str, data: &RawRecord) -> Result<()> {
        self.put_at(key, data, now_ms()).await
    }

    pub async fn put_at(&self, key: &str, data: &RawRecord, now: i64) -> Result<()> {
        let entry = CacheEntry {
            timestamp: now,
            data: data.clone(),
        };
        let storage_key = self.storage_key(key);
        self.backend
            .store(&storage_key, serde_json::to_string(&entry)?)
            .await?;
        log::debug!("Stored fresh data for {}", storage_key);
        Ok(())
    }

    pub async fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(now_ms()).await
    }

    /// Deletes expired, corrupt and stale-version entries in this namespace.
    /// Returns how many were removed.
    pub async fn sweep_expired_at(&self, now: i64) -> usize {
        let keys = match self.backend.keys().await {
            Ok(keys) => keys,
            Err(e) => {
                log::warn!("Cache sweep skipped, cannot list keys: {}", e);
                return 0;
            }
        };

        let prefix = self.prefix();
        let suffix = self.version_suffix();
        let mut doomed_keys = Vec::new();

        for key in keys.into_iter().filter(|k| k.starts_with(&prefix)) {
            let doomed = if !key.ends_with(&suffix) {
                true
            } else {
                match self.backend.load(&key).await {
                    Ok(Some(stored)) => match serde_json::from_str::<CacheEntry>(&stored) {
                        Ok(entry) => !self.is_fresh(&entry, now),
                        Err(_) => true,
                    },
                    Ok(None) => false,
                    Err(e) => {
                        log::warn!("Cache read failed for {}: {}", key, e);
                        false
                    }
                }
            };

            if doomed {
                doomed_keys.push(key);
            }
        }

        let removed = match self.backend.remove_many(&doomed_keys).await {
            Ok(()) => doomed_keys.len(),
            Err(e) => {
                log::warn!("Failed to remove {} cache entries: {}", doomed_keys.len(), e);
                0
            }
        };
        log::info!("Cache sweep removed {} entries", removed);
        removed
    }
}
