//! Typed errors for discovery and extraction.
//!
//! Every error here is local to the page or strategy that raised it. The
//! discovery manager and the pipeline catch and log them; they never cross a
//! site boundary.

use thiserror::Error;

/// Errors raised while fetching a single URL.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure (DNS, connection reset, TLS, body read)
    #[error("HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Request exceeded the configured timeout
    #[error("timeout fetching: {url}")]
    Timeout { url: String },

    /// URL could not be parsed or resolved
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// Cache lookup or write failed on the fetch path
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Errors raised by a cache store.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Backing file could not be read or written
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Entry or snapshot could not be (de)serialized
    #[error("cache serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A writer panicked while holding the lock
    #[error("cache lock poisoned")]
    Poisoned,
}

/// Errors raised by a discovery strategy or the discovery manager.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// A fetch the strategy depends on failed
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// A document was malformed (XML, JSON, HTML)
    #[error("parse error at {url}: {reason}")]
    Parse { url: String, reason: String },

    /// Base URL was unusable
    #[error("invalid base URL: {url}")]
    InvalidBaseUrl { url: String },

    /// Cache failure outside the fetch path
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// Every strategy that ran failed and none produced a candidate
    #[error("all discovery strategies failed for {base_url}")]
    AllStrategiesFailed { base_url: String },
}

/// Errors raised during attribute extraction.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Product page could not be fetched
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// Language-model call failed
    #[error("language model error: {0}")]
    Model(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

/// Result type alias for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result type alias for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Result type alias for discovery operations.
pub type DiscoveryResult<T> = std::result::Result<T, DiscoveryError>;

/// Result type alias for extraction operations.
pub type ExtractionResult<T> = std::result::Result<T, ExtractionError>;
