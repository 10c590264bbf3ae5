//! Namespaced key-value cache with a fixed time-to-live.
//!
//! Entries are only ever replaced, never removed: a stale entry stays where it is until the next
//! write for the same key. Two concurrent misses for the same key both go upstream and the last
//! write wins.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use time::{Duration, OffsetDateTime};
use tracing::{error, trace};

use crate::clock::Clock;
use crate::storage::Storage;

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Value,
    stored_at: OffsetDateTime,
}

enum Backend {
    Memory(Mutex<HashMap<String, CacheEntry>>),
    Sqlite(Arc<Storage>),
}

pub struct Cache {
    namespace: String,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    backend: Backend,
}

impl Cache {
    pub fn in_memory(
        namespace: impl Into<String>,
        ttl: std::time::Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_backend(namespace, ttl, clock, Backend::Memory(Default::default()))
    }

    /// A cache whose entries survive restarts.
    pub fn persistent(
        namespace: impl Into<String>,
        ttl: std::time::Duration,
        clock: Arc<dyn Clock>,
        storage: Arc<Storage>,
    ) -> Self {
        Self::with_backend(namespace, ttl, clock, Backend::Sqlite(storage))
    }

    fn with_backend(
        namespace: impl Into<String>,
        ttl: std::time::Duration,
        clock: Arc<dyn Clock>,
        backend: Backend,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            ttl: Duration::try_from(ttl).unwrap_or(Duration::MAX),
            clock,
            backend,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    /// Returns the payload stored under `key` unless it is missing or has outlived the TTL.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let key = self.full_key(key);

        let entry = match &self.backend {
            Backend::Memory(entries) => {
                let entries = entries.lock().unwrap();
                entries.get(&key).cloned()
            }

            Backend::Sqlite(storage) => match Self::load(storage, &key).await {
                Ok(entry) => entry,

                Err(e) => {
                    error!(%key, "Could not read a cache entry; treating it as a miss: {e:#}");
                    None
                }
            },
        }?;

        let age = self.clock.now() - entry.stored_at;

        if age < self.ttl {
            trace!(%key, age_secs = age.whole_seconds(), "Cache entry is fresh");
            Some(entry.payload)
        } else {
            trace!(%key, age_secs = age.whole_seconds(), "Cache entry is stale");
            None
        }
    }

    /// Stores `payload` under `key`, replacing whatever was there.
    pub async fn set(&self, key: &str, payload: Value) {
        let key = self.full_key(key);
        let entry = CacheEntry {
            payload,
            stored_at: self.clock.now(),
        };

        match &self.backend {
            Backend::Memory(entries) => {
                let mut entries = entries.lock().unwrap();
                entries.insert(key, entry);
            }

            Backend::Sqlite(storage) => {
                if let Err(e) = Self::store(storage, &key, &entry).await {
                    error!(%key, "Could not write a cache entry: {e:#}");
                }
            }
        }
    }

    async fn load(storage: &Storage, key: &str) -> anyhow::Result<Option<CacheEntry>> {
        let mut tx = storage.begin().await?;
        let entry = tx.get_cache_entry(key).await?;
        tx.commit().await?;

        Ok(entry.map(|(payload, stored_at)| CacheEntry { payload, stored_at }))
    }

    async fn store(storage: &Storage, key: &str, entry: &CacheEntry) -> anyhow::Result<()> {
        let mut tx = storage.begin().await?;
        tx.put_cache_entry(key, &entry.payload, entry.stored_at)
            .await?;
        tx.commit().await
    }
}
