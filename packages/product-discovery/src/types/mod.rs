//! Domain types: candidates, records, vocabularies and configuration.

pub mod attributes;
pub mod candidate;
pub mod config;
pub mod platform;
pub mod record;

pub use attributes::{BeanType, ProcessingMethod, RoastLevel};
pub use candidate::{DiscoverySource, ProductCandidate};
pub use config::{
    DiscoveryConfig, EndpointConfig, ExtractionConfig, FetchConfig, HtmlCrawlConfig,
    PipelineConfig, SitemapConfig,
};
pub use platform::Platform;
pub use record::{EnrichmentSource, Prices, ProductRecord};

/// One site to process.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SiteRequest {
    /// Storefront base URL (scheme optional)
    pub base_url: String,

    /// Platform hint from the roaster-metadata collaborator
    #[serde(default)]
    pub platform: Platform,

    /// Bypass cached pages and results
    #[serde(default)]
    pub refresh: bool,
}

impl SiteRequest {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            platform: Platform::Unknown,
            refresh: false,
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }
}
