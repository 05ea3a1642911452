//! Coffee Roaster Product Discovery & Extraction
//!
//! Finds product detail pages on roaster storefronts of unknown platform and
//! turns them into normalized product records.
//!
//! # Design
//!
//! - Discovery tries cheap, precise strategies first (platform endpoints,
//!   sitemaps, embedded structured data) and falls back to a bounded
//!   breadth-first crawl of catalog pages
//! - Extraction is declarative and platform-aware; a language model only fills
//!   what the page markup leaves unknown, never overwriting a definite value
//! - Every failure is local to the page or strategy that raised it
//! - Every fetch and result goes through one shared, TTL-bound cache
//!
//! # Usage
//!
//! ```rust,ignore
//! use product_discovery::{
//!     CachedFetcher, HttpFetcher, JsonFileCache, Pipeline, SiteRequest, Platform,
//! };
//!
//! let cache = Arc::new(JsonFileCache::open(".cache/scout.json").await?);
//! let http = Arc::new(HttpFetcher::new(&FetchConfig::default())?);
//! let fetcher = CachedFetcher::new(http, cache.clone(), Duration::from_secs(86_400));
//!
//! let pipeline = Pipeline::new(fetcher, DiscoveryConfig::new(), ExtractionConfig::new(), PipelineConfig::default());
//! let summary = pipeline
//!     .run(vec![SiteRequest::new("roaster.in").with_platform(Platform::Shopify)])
//!     .await;
//! cache.flush().await?;
//! ```
//!
//! # Modules
//!
//! - [`discoverers`] - Discovery strategies and the manager that orders them
//! - [`extractors`] - Structured extraction, language-model fallback and merge
//! - [`pipeline`] - Multi-site orchestration and run statistics
//! - [`cache`] - Content-addressed TTL cache (memory and JSON file)
//! - [`classify`] - Product-path classification rules
//! - [`testing`] - Mock fetcher and language model

pub mod cache;
pub mod classify;
pub mod discoverers;
pub mod dom;
pub mod error;
pub mod extractors;
pub mod fetcher;
pub mod llm;
pub mod pipeline;
pub mod testing;
pub mod types;
pub mod urls;

// Re-export core types at crate root
pub use cache::{CacheEntry, CacheStage, CacheStore, JsonFileCache, MemoryCache};
pub use classify::{classify_path, classify_url, is_likely_coffee_product, PathClass};
pub use discoverers::{Discoverer, DiscoveryContext, DiscoveryManager};
pub use error::{CacheError, DiscoveryError, ExtractionError, FetchError};
pub use extractors::{
    merge_fallback, needs_fallback, ExtractionOutcome, FallbackAttributes, FallbackExtractor,
    ProductExtractor, StructuredExtractor,
};
pub use fetcher::{CachedFetcher, FetchedPage, HttpFetcher, PageFetcher};
pub use llm::LanguageModel;
pub use pipeline::{Pipeline, PipelineStats, RunSummary, SiteReport};
pub use types::{
    BeanType, DiscoveryConfig, DiscoverySource, EnrichmentSource, ExtractionConfig, FetchConfig,
    Platform, PipelineConfig, ProcessingMethod, ProductCandidate, ProductRecord, RoastLevel,
    SiteRequest,
};

#[cfg(feature = "deepseek")]
pub use llm::DeepSeekModel;
