//! Content-addressed cache with TTL expiry.
//!
//! Entries are addressed by `sha256(stage, identifier)`, so the same page or
//! result always lands under the same key and concurrent writers for one key
//! write identical payloads. Expired entries read as misses.
//!
//! The cache has an explicit lifecycle: open one store per run, hand an
//! `Arc<dyn CacheStore>` to every component, and call [`CacheStore::flush`]
//! when the run ends.

mod file;
mod memory;

pub use file::JsonFileCache;
pub use memory::MemoryCache;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::error::CacheResult;

/// Pipeline stage a cache entry belongs to. Part of the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheStage {
    /// Raw fetched documents (HTML, XML, JSON listings)
    Page,
    /// A site's deduplicated candidate list
    Discovery,
    /// A fully extracted product record
    Extraction,
}

impl CacheStage {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheStage::Page => "page",
            CacheStage::Discovery => "discovery",
            CacheStage::Extraction => "extraction",
        }
    }
}

/// Stable cache key for a (stage, identifier) pair.
pub fn cache_key(stage: CacheStage, identifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(stage.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(identifier.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A cached payload with its storage time and validity window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub payload: String,
    pub stored_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl CacheEntry {
    /// Create an entry stored now.
    pub fn new(key: impl Into<String>, payload: impl Into<String>, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            payload: payload.into(),
            stored_at: Utc::now(),
            ttl,
        }
    }

    /// Override the storage time.
    pub fn with_stored_at(mut self, stored_at: DateTime<Utc>) -> Self {
        self.stored_at = stored_at;
        self
    }

    /// Whether the entry has outlived its TTL at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match now.signed_duration_since(self.stored_at).to_std() {
            Ok(age) => age >= self.ttl,
            // stored_at in the future (clock skew): still fresh
            Err(_) => false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Key → payload store with get/set/expire semantics.
///
/// Any durable key-value store can back this; the crate ships an in-memory
/// store and a JSON snapshot file store.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a live entry. Expired entries are reported as `None`.
    async fn get(&self, key: &str) -> CacheResult<Option<CacheEntry>>;

    /// Insert or replace an entry.
    async fn set(&self, entry: CacheEntry) -> CacheResult<()>;

    /// Drop an entry regardless of its TTL.
    async fn expire(&self, key: &str) -> CacheResult<()>;

    /// Drop every expired entry, returning how many were removed.
    async fn purge_expired(&self) -> CacheResult<usize>;

    /// Persist pending writes. No-op for stores without a backing medium.
    async fn flush(&self) -> CacheResult<()> {
        Ok(())
    }
}

/// Read and deserialize a JSON payload. Undecodable payloads are misses.
pub async fn get_json<T: DeserializeOwned>(
    cache: &dyn CacheStore,
    stage: CacheStage,
    identifier: &str,
) -> CacheResult<Option<T>> {
    let key = cache_key(stage, identifier);
    let Some(entry) = cache.get(&key).await? else {
        return Ok(None);
    };
    match serde_json::from_str(&entry.payload) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            tracing::warn!(stage = stage.as_str(), identifier = %identifier, error = %e, "Dropping undecodable cache entry");
            cache.expire(&key).await?;
            Ok(None)
        }
    }
}

/// Serialize a value as JSON and store it.
pub async fn put_json<T: Serialize + ?Sized>(
    cache: &dyn CacheStore,
    stage: CacheStage,
    identifier: &str,
    value: &T,
    ttl: Duration,
) -> CacheResult<()> {
    let payload = serde_json::to_string(value)?;
    cache
        .set(CacheEntry::new(cache_key(stage, identifier), payload, ttl))
        .await
}
