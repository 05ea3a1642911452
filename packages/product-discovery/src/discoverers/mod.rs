//! Product discovery strategies.
//!
//! Each strategy implements [`Discoverer`]. The [`DiscoveryManager`] runs them
//! in a fixed priority order (endpoint, sitemap, structured data, HTML),
//! deduplicates what they find and decides when to stop early.

pub mod endpoint;
pub mod html;
pub mod manager;
pub mod sitemap;
pub mod structured_data;

pub use endpoint::EndpointDiscoverer;
pub use html::{CrawlFrontier, HtmlDiscoverer};
pub use manager::DiscoveryManager;
pub use sitemap::SitemapDiscoverer;
pub use structured_data::StructuredDataDiscoverer;

use async_trait::async_trait;
use url::Url;

use crate::error::DiscoveryResult;
use crate::types::{DiscoverySource, Platform, ProductCandidate};

/// Per-site inputs shared by every strategy of one discovery run.
#[derive(Debug, Clone, Copy)]
pub struct DiscoveryContext<'a> {
    pub base_url: &'a Url,
    pub platform: Platform,
    pub refresh: bool,
}

impl<'a> DiscoveryContext<'a> {
    pub fn new(base_url: &'a Url, platform: Platform) -> Self {
        Self {
            base_url,
            platform,
            refresh: false,
        }
    }

    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }
}

/// A product discovery strategy.
#[async_trait]
pub trait Discoverer: Send + Sync {
    /// Provenance tag given to every candidate this strategy produces.
    fn source(&self) -> DiscoverySource;

    /// Whether the strategy is worth running for this platform.
    fn applies_to(&self, _platform: Platform) -> bool {
        true
    }

    /// Find candidate product URLs on the site.
    ///
    /// Per-page failures are logged and skipped. An `Err` means the strategy
    /// as a whole could not run (e.g. every entry point failed to fetch).
    async fn discover(&self, ctx: &DiscoveryContext<'_>) -> DiscoveryResult<Vec<ProductCandidate>>;
}

/// Sleep between requests unless the delay is disabled.
pub(crate) async fn politeness_delay(delay: std::time::Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
