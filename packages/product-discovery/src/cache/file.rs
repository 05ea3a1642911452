//! JSON snapshot file cache.

use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

use super::{CacheEntry, CacheStore, MemoryCache};
use crate::error::CacheResult;

/// Cache persisted as a single JSON snapshot.
///
/// The snapshot is loaded once by [`JsonFileCache::open`]; reads and writes
/// then go to memory, and [`CacheStore::flush`] writes the snapshot back
/// (temp file + rename). Expired entries are dropped on open and on flush.
#[derive(Debug)]
pub struct JsonFileCache {
    path: PathBuf,
    inner: MemoryCache,
    dirty: AtomicBool,
}

impl JsonFileCache {
    /// Open the snapshot at `path`, starting empty when it does not exist.
    pub async fn open(path: impl AsRef<Path>) -> CacheResult<Self> {
        let path = path.as_ref().to_path_buf();

        let entries: Vec<CacheEntry> = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let now = Utc::now();
        let total = entries.len();
        let live: Vec<CacheEntry> = entries.into_iter().filter(|e| !e.is_expired_at(now)).collect();

        info!(
            path = %path.display(),
            entries = live.len(),
            dropped_expired = total - live.len(),
            "Opened cache"
        );

        Ok(Self {
            path,
            inner: MemoryCache::from_entries(live),
            dirty: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[async_trait]
impl CacheStore for JsonFileCache {
    async fn get(&self, key: &str) -> CacheResult<Option<CacheEntry>> {
        self.inner.get(key).await
    }

    async fn set(&self, entry: CacheEntry) -> CacheResult<()> {
        self.inner.set(entry).await?;
        self.dirty.store(true, Ordering::Release);
        Ok(())
    }

    async fn expire(&self, key: &str) -> CacheResult<()> {
        self.inner.expire(key).await?;
        self.dirty.store(true, Ordering::Release);
        Ok(())
    }

    async fn purge_expired(&self) -> CacheResult<usize> {
        let removed = self.inner.purge_expired().await?;
        if removed > 0 {
            self.dirty.store(true, Ordering::Release);
        }
        Ok(removed)
    }

    async fn flush(&self) -> CacheResult<()> {
        self.inner.purge_expired().await?;
        if !self.dirty.swap(false, Ordering::AcqRel) {
            debug!(path = %self.path.display(), "Cache clean, skipping flush");
            return Ok(());
        }

        let snapshot = self.inner.snapshot()?;
        let bytes = serde_json::to_vec(&snapshot)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        info!(path = %self.path.display(), entries = snapshot.len(), "Flushed cache");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn scratch_path(name: &str) -> PathBuf {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        std::env::temp_dir()
            .join(format!("scout-cache-{}-{}-{}", name, std::process::id(), nanos))
            .join("cache.json")
    }

    #[tokio::test]
    async fn test_open_missing_file_starts_empty() {
        let cache = JsonFileCache::open(scratch_path("missing")).await.unwrap();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_flush_then_reopen_preserves_entries() {
        let path = scratch_path("reopen");
        let cache = JsonFileCache::open(&path).await.unwrap();
        cache
            .set(CacheEntry::new("k", "payload", Duration::from_secs(3600)))
            .await
            .unwrap();
        cache.flush().await.unwrap();

        let reopened = JsonFileCache::open(&path).await.unwrap();
        assert_eq!(reopened.get("k").await.unwrap().unwrap().payload, "payload");
    }

    #[tokio::test]
    async fn test_reopen_drops_expired_entries() {
        let path = scratch_path("expired");
        let cache = JsonFileCache::open(&path).await.unwrap();
        cache
            .set(CacheEntry::new("fresh", "a", Duration::from_secs(3600)))
            .await
            .unwrap();
        cache.flush().await.unwrap();

        // Write a stale entry straight into the snapshot
        let mut entries: Vec<CacheEntry> =
            serde_json::from_slice(&tokio::fs::read(&path).await.unwrap()).unwrap();
        entries.push(
            CacheEntry::new("stale", "b", Duration::from_secs(1))
                .with_stored_at(Utc::now() - chrono::Duration::seconds(10)),
        );
        tokio::fs::write(&path, serde_json::to_vec(&entries).unwrap()).await.unwrap();

        let reopened = JsonFileCache::open(&path).await.unwrap();
        assert_eq!(reopened.len(), 1);
        assert!(reopened.get("stale").await.unwrap().is_none());
    }
}
