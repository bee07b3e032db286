//! On-disk persistent cache for the command line tool

use anyhow::Context;
use async_trait::async_trait;
use dwebx_dns::{PersistentCache, PersistentCacheError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub key: String,
    /// Unix seconds
    pub expires_at: u64,
}

impl FileEntry {
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at
    }
}

/// `name -> { key, expires_at }` map stored as a JSON file.
///
/// Expired entries are still returned by `read`: the persistent tier is only
/// consulted once every live strategy has failed. File writes run on the
/// blocking pool, one at a time, so the file always holds the latest map.
pub struct JsonFileCache {
    path: Arc<PathBuf>,
    entries: Mutex<BTreeMap<String, FileEntry>>,
    save_lock: AsyncMutex<()>,
}

impl JsonFileCache {
    /// Open the cache at `path`. A missing file starts an empty cache.
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let data = fs::read(&path)
                .with_context(|| format!("failed to read cache file {}", path.display()))?;
            serde_json::from_slice(&data)
                .with_context(|| format!("failed to parse cache file {}", path.display()))?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path: Arc::new(path),
            entries: Mutex::new(entries),
            save_lock: AsyncMutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> BTreeMap<String, FileEntry> {
        self.entries.lock().clone()
    }

}

fn save(path: &Path, entries: &BTreeMap<String, FileEntry>) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path(path);
    fs::write(&tmp, serde_json::to_vec_pretty(entries)?)
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[async_trait]
impl PersistentCache for JsonFileCache {
    async fn read(&self, name: &str) -> Result<String, PersistentCacheError> {
        let entries = self.entries.lock();
        let entry = entries.get(name).ok_or_else(|| PersistentCacheError::Miss {
            name: name.to_string(),
        })?;
        if entry.is_expired(unix_now()) {
            debug!(name = %name, "Serving expired persistent entry");
        }
        Ok(entry.key.clone())
    }

    async fn write(&self, name: &str, key: &str, ttl: Duration) -> Result<(), PersistentCacheError> {
        let _saving = self.save_lock.lock().await;
        let snapshot = {
            let mut entries = self.entries.lock();
            entries.insert(
                name.to_string(),
                FileEntry {
                    key: key.to_string(),
                    expires_at: unix_now().saturating_add(ttl.as_secs()),
                },
            );
            entries.clone()
        };

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || save(&path, &snapshot))
            .await
            .map_err(|err| PersistentCacheError::Backend(err.to_string()))??;
        Ok(())
    }
}
