//! Two-tier name cache: in-memory TTL map plus an optional persistent adapter
//! consulted only after every live strategy failed.

use crate::errors::*;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Caller-supplied durable store. Advisory only: every failure is absorbed.
#[async_trait]
pub trait PersistentCache: Send + Sync {
    async fn read(&self, name: &str) -> std::result::Result<String, PersistentCacheError>;

    async fn write(
        &self,
        name: &str,
        key: &str,
        ttl: Duration,
    ) -> std::result::Result<(), PersistentCacheError>;
}

/// In-memory cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    pub expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Per-engine cache. Never shared between engines.
pub struct CacheManager {
    entries: RwLock<HashMap<String, CacheEntry>>,
    persistent: Option<Arc<dyn PersistentCache>>,
}

impl fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheManager")
            .field("entries", &self.entries.read().len())
            .field("persistent", &self.persistent.is_some())
            .finish()
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new(None)
    }
}

impl CacheManager {
    pub fn new(persistent: Option<Arc<dyn PersistentCache>>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            persistent,
        }
    }

    pub fn has_persistent(&self) -> bool {
        self.persistent.is_some()
    }

    /// Live entry for `name`, if any. No I/O.
    pub fn lookup(&self, name: &str) -> Option<CacheEntry> {
        let now = Instant::now();
        let entries = self.entries.read();
        entries.get(name).filter(|entry| entry.is_live(now)).cloned()
    }

    /// Insert or overwrite. A zero TTL drops any existing entry instead.
    pub fn store(&self, name: &str, key: &str, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.write();
        entries.retain(|_, entry| entry.is_live(now));

        if ttl.is_zero() {
            entries.remove(name);
            return;
        }

        let Some(expires_at) = now.checked_add(ttl) else {
            debug!(name = %name, ttl_secs = ttl.as_secs(), "TTL out of range, not caching");
            entries.remove(name);
            return;
        };

        entries.insert(
            name.to_string(),
            CacheEntry {
                key: key.to_string(),
                expires_at,
            },
        );
    }

    /// Snapshot of live entries, name → key.
    pub fn list_all(&self) -> HashMap<String, String> {
        let now = Instant::now();
        let entries = self.entries.read();
        entries
            .iter()
            .filter(|(_, entry)| entry.is_live(now))
            .map(|(name, entry)| (name.clone(), entry.key.clone()))
            .collect()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .values()
            .filter(|entry| entry.is_live(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn flush(&self) {
        self.entries.write().clear();
    }

    /// Last-resort read. No adapter, or any adapter error, is a miss.
    pub async fn read_persistent(&self, name: &str) -> Result<String> {
        let not_found = || ResolutionError::NotFound {
            name: name.to_string(),
        };

        let Some(persistent) = &self.persistent else {
            return Err(not_found());
        };

        match persistent.read(name).await {
            Ok(key) => Ok(key),
            Err(err) => {
                debug!(name = %name, error = %err, "Persistent cache miss");
                Err(not_found())
            }
        }
    }

    /// Best-effort write, detached from the calling task.
    pub fn write_persistent(&self, name: &str, key: &str, ttl: Duration) {
        let Some(persistent) = self.persistent.clone() else {
            return;
        };

        let name = name.to_string();
        let key = key.to_string();
        tokio::spawn(async move {
            if let Err(err) = persistent.write(&name, &key, ttl).await {
                debug!(name = %name, error = %err, "Persistent cache write failed");
            }
        });
    }
}
