//! Configuration types for fetching, discovery and extraction.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// HTTP fetching and page-cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Per-request timeout. Default: 30s.
    pub timeout: Duration,

    /// User agent sent with every request.
    pub user_agent: String,

    /// How long fetched pages stay valid in the cache. Default: 24h.
    pub cache_ttl: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: "CoffeeScout/1.0 (+product discovery)".to_string(),
            cache_ttl: Duration::from_secs(86_400),
        }
    }
}

impl FetchConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }
}

/// Breadth-first catalog crawl settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HtmlCrawlConfig {
    /// Deepest frontier level that is fetched. Seeds are depth 0. Default: 2.
    pub max_depth: usize,

    /// Maximum distinct pages fetched per run. Default: 50.
    pub max_pages: usize,

    /// Pause between consecutive fetches. Default: 2s.
    pub delay: Duration,

    /// Catalog paths seeded after the home page.
    pub catalog_paths: Vec<String>,
}

impl Default for HtmlCrawlConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            max_pages: 50,
            delay: Duration::from_secs(2),
            catalog_paths: CATALOG_PATHS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl HtmlCrawlConfig {
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_max_pages(mut self, pages: usize) -> Self {
        self.max_pages = pages;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_catalog_paths(mut self, paths: Vec<String>) -> Self {
        self.catalog_paths = paths;
        self
    }
}

/// Well-known catalog locations on storefronts.
pub const CATALOG_PATHS: &[&str] = &[
    "/shop",
    "/products",
    "/collections/coffee",
    "/collections/all",
    "/product-category/coffee",
    "/coffee",
    "/store",
    "/beans",
];

/// Sitemap traversal settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitemapConfig {
    /// How many levels of nested sitemap indexes are followed. Default: 3.
    pub max_depth: usize,

    /// Upper bound on sitemap documents fetched per run. Default: 25.
    pub max_documents: usize,

    /// Candidate sitemap locations, tried in order.
    pub paths: Vec<String>,
}

impl Default for SitemapConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            max_documents: 25,
            paths: [
                "/sitemap.xml",
                "/sitemap_index.xml",
                "/sitemap_products_1.xml",
                "/sitemap/sitemap.xml",
                "/product-sitemap.xml",
                "/wp-sitemap.xml",
            ]
            .iter()
            .map(|p| p.to_string())
            .collect(),
        }
    }
}

impl SitemapConfig {
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_max_documents(mut self, documents: usize) -> Self {
        self.max_documents = documents;
        self
    }
}

/// Platform listing-endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Maximum listing pages requested per endpoint. Default: 10.
    pub max_pages: usize,

    /// Shopify `limit` parameter. Default: 250.
    pub shopify_page_size: usize,

    /// WooCommerce `per_page` parameter. Default: 100.
    pub woocommerce_page_size: usize,

    /// Pause between listing pages. Default: 2s.
    pub delay: Duration,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            max_pages: 10,
            shopify_page_size: 250,
            woocommerce_page_size: 100,
            delay: Duration::from_secs(2),
        }
    }
}

impl EndpointConfig {
    pub fn with_max_pages(mut self, pages: usize) -> Self {
        self.max_pages = pages;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Discovery manager settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Stop once high-confidence strategies produced at least this many
    /// candidates. Default: 20.
    pub early_stop_threshold: usize,

    /// Strategies that must have been attempted before early stop is considered.
    /// Default: 2 (endpoint and sitemap).
    pub min_strategies_before_stop: usize,

    /// Drop candidates that look like gear, merch or gift cards.
    pub coffee_only: bool,

    /// How long a site's discovered candidate list stays cached. Default: 24h.
    pub result_ttl: Duration,

    pub html: HtmlCrawlConfig,
    pub sitemap: SitemapConfig,
    pub endpoint: EndpointConfig,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            early_stop_threshold: 20,
            min_strategies_before_stop: 2,
            coffee_only: false,
            result_ttl: Duration::from_secs(86_400),
            html: HtmlCrawlConfig::default(),
            sitemap: SitemapConfig::default(),
            endpoint: EndpointConfig::default(),
        }
    }
}

impl DiscoveryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_early_stop_threshold(mut self, threshold: usize) -> Self {
        self.early_stop_threshold = threshold;
        self
    }

    /// Never lowered below 2, so endpoint and sitemap always get a chance.
    pub fn with_min_strategies_before_stop(mut self, count: usize) -> Self {
        self.min_strategies_before_stop = count.max(2);
        self
    }

    pub fn with_coffee_only(mut self, coffee_only: bool) -> Self {
        self.coffee_only = coffee_only;
        self
    }

    pub fn with_html(mut self, html: HtmlCrawlConfig) -> Self {
        self.html = html;
        self
    }

    pub fn with_sitemap(mut self, sitemap: SitemapConfig) -> Self {
        self.sitemap = sitemap;
        self
    }

    pub fn with_endpoint(mut self, endpoint: EndpointConfig) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Remove every politeness delay (tests, local fixtures).
    pub fn without_delays(mut self) -> Self {
        self.html.delay = Duration::ZERO;
        self.endpoint.delay = Duration::ZERO;
        self
    }
}

/// Attribute extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Character cap on the page rendering sent to the language model. Default: 6000.
    pub max_text_chars: usize,

    /// Renderings shorter than this fall back to the known description. Default: 50.
    pub min_text_chars: usize,

    /// Escalate when price alone is missing. Default: false, so fallback runs
    /// exactly when two or more critical fields are missing.
    pub fallback_on_missing_price: bool,

    /// Language-model model name.
    pub model: String,

    pub max_tokens: u32,
    pub temperature: f32,

    /// How long extracted records stay cached. Default: 24h.
    pub record_ttl: Duration,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_text_chars: 6000,
            min_text_chars: 50,
            fallback_on_missing_price: false,
            model: "deepseek-chat".to_string(),
            max_tokens: 800,
            temperature: 0.1,
            record_ttl: Duration::from_secs(86_400),
        }
    }
}

impl ExtractionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_text_chars(mut self, chars: usize) -> Self {
        self.max_text_chars = chars;
        self
    }

    pub fn with_fallback_on_missing_price(mut self, enabled: bool) -> Self {
        self.fallback_on_missing_price = enabled;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// Multi-site pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Sites processed concurrently. Default: 3.
    pub concurrency: usize,

    /// Pause between product-page extractions within one site. Default: 2s.
    pub product_delay: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            product_delay: Duration::from_secs(2),
        }
    }
}

impl PipelineConfig {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_product_delay(mut self, delay: Duration) -> Self {
        self.product_delay = delay;
        self
    }
}
