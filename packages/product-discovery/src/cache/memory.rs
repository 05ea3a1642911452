//! In-memory cache store.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;

use super::{CacheEntry, CacheStore};
use crate::error::{CacheError, CacheResult};

/// Process-local cache. Entries are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_entries(entries: impl IntoIterator<Item = CacheEntry>) -> Self {
        Self {
            entries: RwLock::new(entries.into_iter().map(|e| (e.key.clone(), e)).collect()),
        }
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn snapshot(&self) -> CacheResult<Vec<CacheEntry>> {
        let entries = self.entries.read().map_err(|_| CacheError::Poisoned)?;
        Ok(entries.values().cloned().collect())
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<CacheEntry>> {
        let entries = self.entries.read().map_err(|_| CacheError::Poisoned)?;
        Ok(entries.get(key).filter(|e| !e.is_expired()).cloned())
    }

    async fn set(&self, entry: CacheEntry) -> CacheResult<()> {
        self.entries
            .write()
            .map_err(|_| CacheError::Poisoned)?
            .insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn expire(&self, key: &str) -> CacheResult<()> {
        self.entries
            .write()
            .map_err(|_| CacheError::Poisoned)?
            .remove(key);
        Ok(())
    }

    async fn purge_expired(&self) -> CacheResult<usize> {
        let now = Utc::now();
        let mut entries = self.entries.write().map_err(|_| CacheError::Poisoned)?;
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired_at(now));
        Ok(before - entries.len())
    }
}
