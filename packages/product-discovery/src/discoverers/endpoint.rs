//! Platform listing endpoints (Shopify `products.json`, WooCommerce REST).

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use super::{politeness_delay, Discoverer, DiscoveryContext};
use crate::dom;
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::fetcher::CachedFetcher;
use crate::types::{DiscoverySource, EndpointConfig, Platform, ProductCandidate};
use crate::urls::{resolve_href, same_host, site_url};

/// WooCommerce listing endpoints, tried in order until one yields products.
const WOOCOMMERCE_ENDPOINTS: &[&str] = &[
    "/wp-json/wc/v3/products",
    "/wp-json/wc/v2/products",
    "/wp-json/wp/v2/product",
];

/// One product from a listing response.
#[derive(Debug, Clone, Default, PartialEq)]
struct ListingItem {
    url: String,
    name: Option<String>,
    description: Option<String>,
    image: Option<String>,
}

type ListingParser = fn(&str, &Url) -> Result<Vec<ListingItem>, String>;

#[derive(Debug, Deserialize)]
struct ShopifyListing {
    #[serde(default)]
    products: Vec<ShopifyProduct>,
}

#[derive(Debug, Deserialize)]
struct ShopifyProduct {
    handle: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    body_html: Option<String>,
    #[serde(default)]
    images: Vec<ShopifyImage>,
}

#[derive(Debug, Deserialize)]
struct ShopifyImage {
    src: String,
}

fn parse_shopify_listing(body: &str, base: &Url) -> Result<Vec<ListingItem>, String> {
    let listing: ShopifyListing = serde_json::from_str(body).map_err(|e| e.to_string())?;
    Ok(listing
        .products
        .into_iter()
        .filter(|p| !p.handle.is_empty())
        .filter_map(|p| {
            let url = site_url(base, &format!("/products/{}", p.handle))?;
            Some(ListingItem {
                url: url.to_string(),
                name: p.title,
                description: p
                    .body_html
                    .as_deref()
                    .map(dom::fragment_text)
                    .filter(|d| !d.is_empty()),
                image: p.images.into_iter().next().map(|i| i.src),
            })
        })
        .collect())
}

/// A plain string field, or the `rendered` member of a WordPress field object.
fn rendered(value: &Value, key: &str) -> Option<String> {
    let text = match value.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => obj.get("rendered").and_then(Value::as_str).map(str::to_string),
        _ => None,
    };
    text.filter(|s| !s.trim().is_empty())
}

fn parse_woocommerce_listing(body: &str, _base: &Url) -> Result<Vec<ListingItem>, String> {
    let value: Value = serde_json::from_str(body).map_err(|e| e.to_string())?;
    let Value::Array(items) = value else {
        return Err("expected a JSON array of products".to_string());
    };

    Ok(items
        .iter()
        .filter_map(|item| {
            let url = rendered(item, "permalink").or_else(|| rendered(item, "link"))?;
            Some(ListingItem {
                url,
                name: rendered(item, "name")
                    .or_else(|| rendered(item, "title"))
                    .map(|n| dom::fragment_text(&n)),
                description: rendered(item, "description")
                    .or_else(|| rendered(item, "content"))
                    .or_else(|| rendered(item, "short_description"))
                    .map(|d| dom::fragment_text(&d))
                    .filter(|d| !d.is_empty()),
                image: item
                    .get("images")
                    .and_then(Value::as_array)
                    .and_then(|images| images.first())
                    .and_then(|image| image.get("src"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
            })
        })
        .collect())
}

/// Discovers products through a platform's JSON listing API.
pub struct EndpointDiscoverer {
    fetcher: CachedFetcher,
    config: EndpointConfig,
}

impl EndpointDiscoverer {
    pub fn new(fetcher: CachedFetcher, config: EndpointConfig) -> Self {
        Self { fetcher, config }
    }

    /// Page through one endpoint until an empty or short page, or the page budget.
    ///
    /// A failure on the first page is the endpoint's failure; a failure later
    /// ends pagination with what was gathered.
    async fn paginate(
        &self,
        ctx: &DiscoveryContext<'_>,
        path: &str,
        page_size: usize,
        parse: ListingParser,
    ) -> DiscoveryResult<Vec<ListingItem>> {
        let size_param = if path.contains("products.json") { "limit" } else { "per_page" };
        let mut items = Vec::new();

        for page in 1..=self.config.max_pages {
            if page > 1 {
                politeness_delay(self.config.delay).await;
            }

            let target = format!("{}?{}={}&page={}", path, size_param, page_size, page);
            let Some(url) = site_url(ctx.base_url, &target) else {
                return Err(DiscoveryError::InvalidBaseUrl {
                    url: ctx.base_url.to_string(),
                });
            };

            let response = match self.fetcher.fetch(&url, ctx.refresh).await {
                Ok(response) => response,
                Err(e) if page == 1 => return Err(e.into()),
                Err(e) => {
                    warn!(url = %url, error = %e, "Listing page failed, keeping earlier pages");
                    break;
                }
            };
            if !response.is_success() {
                debug!(url = %url, status = response.status, "Listing endpoint returned non-success");
                break;
            }

            let batch = match parse(&response.body, ctx.base_url) {
                Ok(batch) => batch,
                Err(reason) if page == 1 => {
                    return Err(DiscoveryError::Parse {
                        url: url.to_string(),
                        reason,
                    })
                }
                Err(reason) => {
                    warn!(url = %url, reason = %reason, "Malformed listing page, stopping");
                    break;
                }
            };

            debug!(url = %url, count = batch.len(), "Fetched listing page");
            if batch.is_empty() {
                break;
            }
            let short = batch.len() < page_size;
            items.extend(batch);
            if short {
                break;
            }
        }

        Ok(items)
    }

    async fn woocommerce(&self, ctx: &DiscoveryContext<'_>) -> DiscoveryResult<Vec<ListingItem>> {
        let mut last_error = None;
        let mut failures = 0usize;
        for endpoint in WOOCOMMERCE_ENDPOINTS {
            match self
                .paginate(ctx, endpoint, self.config.woocommerce_page_size, parse_woocommerce_listing)
                .await
            {
                Ok(items) if !items.is_empty() => {
                    debug!(endpoint = %endpoint, count = items.len(), "WooCommerce endpoint answered");
                    return Ok(items);
                }
                Ok(_) => {}
                Err(e) => {
                    debug!(endpoint = %endpoint, error = %e, "WooCommerce endpoint failed");
                    failures += 1;
                    last_error = Some(e);
                }
            }
        }
        match last_error {
            Some(e) if failures == WOOCOMMERCE_ENDPOINTS.len() => Err(e),
            _ => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl Discoverer for EndpointDiscoverer {
    fn source(&self) -> DiscoverySource {
        DiscoverySource::Endpoint
    }

    fn applies_to(&self, platform: Platform) -> bool {
        platform.has_listing_endpoint()
    }

    async fn discover(&self, ctx: &DiscoveryContext<'_>) -> DiscoveryResult<Vec<ProductCandidate>> {
        let items = match ctx.platform {
            Platform::Shopify => {
                self.paginate(ctx, "/products.json", self.config.shopify_page_size, parse_shopify_listing)
                    .await?
            }
            Platform::WooCommerce => self.woocommerce(ctx).await?,
            _ => return Ok(Vec::new()),
        };

        let mut found: IndexMap<String, ProductCandidate> = IndexMap::new();
        for item in items {
            let Some(url) = resolve_href(ctx.base_url, &item.url) else {
                continue;
            };
            if !same_host(&url, ctx.base_url) {
                continue;
            }
            let Some(mut candidate) = ProductCandidate::new(url.as_str(), DiscoverySource::Endpoint) else {
                continue;
            };
            if let Some(name) = item.name {
                candidate = candidate.with_name(name);
            }
            if let Some(description) = item.description {
                candidate = candidate.with_description(description);
            }
            if let Some(image) = item.image {
                candidate = candidate.with_image_url(image);
            }
            found.entry(candidate.url.clone()).or_insert(candidate);
        }

        info!(
            base_url = %ctx.base_url,
            platform = %ctx.platform,
            candidates = found.len(),
            "Endpoint discovery complete"
        );
        Ok(found.into_values().collect())
    }
}
