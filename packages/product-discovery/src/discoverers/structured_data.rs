//! Structured-data discovery: JSON-LD and schema.org microdata.
//!
//! Product metadata embedded in listing pages names canonical product URLs
//! directly, so no path heuristic is applied. Only the same-host check is.

use async_trait::async_trait;
use indexmap::IndexMap;
use scraper::{Html, Selector};
use serde_json::Value;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::{politeness_delay, Discoverer, DiscoveryContext};
use crate::dom;
use crate::error::{DiscoveryError, DiscoveryResult, FetchError};
use crate::fetcher::CachedFetcher;
use crate::types::{DiscoverySource, HtmlCrawlConfig, ProductCandidate};
use crate::urls::{resolve_href, same_host, site_url};

static JSON_LD: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap());
static MICRODATA_PRODUCT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"[itemtype*="schema.org/Product"]"#).unwrap());
static ITEMPROP_URL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(r#"[itemprop="url"]"#).unwrap());
static ITEMPROP_NAME: LazyLock<Selector> = LazyLock::new(|| Selector::parse(r#"[itemprop="name"]"#).unwrap());
static ITEMPROP_IMAGE: LazyLock<Selector> = LazyLock::new(|| Selector::parse(r#"[itemprop="image"]"#).unwrap());
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// A product named by embedded metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct StructuredProduct {
    pub url: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
}

fn has_type(map: &serde_json::Map<String, Value>, wanted: &str) -> bool {
    match map.get("@type") {
        Some(Value::String(t)) => t.eq_ignore_ascii_case(wanted),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .any(|t| t.eq_ignore_ascii_case(wanted)),
        _ => false,
    }
}

fn string_field(map: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// `image` may be a string, a list of strings or an `ImageObject`.
pub(crate) fn image_field(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => image_field(items.first()),
        Value::Object(obj) => string_field(obj, "url").or_else(|| string_field(obj, "contentUrl")),
        _ => None,
    }
}

fn product_from(map: &serde_json::Map<String, Value>) -> Option<StructuredProduct> {
    let url = string_field(map, "url").or_else(|| string_field(map, "@id"))?;
    Some(StructuredProduct {
        url,
        name: string_field(map, "name"),
        description: string_field(map, "description"),
        image: image_field(map.get("image")),
    })
}

/// Walk a JSON-LD value collecting products from `Product`, `ItemList`,
/// `CollectionPage` and `@graph` shapes.
fn collect_json_ld(value: &Value, out: &mut Vec<StructuredProduct>) {
    match value {
        Value::Array(items) => items.iter().for_each(|item| collect_json_ld(item, out)),
        Value::Object(map) => {
            if let Some(graph) = map.get("@graph") {
                collect_json_ld(graph, out);
            }
            if has_type(map, "Product") {
                out.extend(product_from(map));
            }
            if has_type(map, "ItemList") {
                for element in map.get("itemListElement").and_then(Value::as_array).into_iter().flatten() {
                    let entry = match element.get("item") {
                        Some(Value::String(url)) => {
                            out.push(StructuredProduct {
                                url: url.clone(),
                                ..Default::default()
                            });
                            continue;
                        }
                        Some(item) => item,
                        None => element,
                    };
                    if let Value::Object(obj) = entry {
                        if has_type(obj, "Product") {
                            collect_json_ld(entry, out);
                        } else {
                            out.extend(product_from(obj));
                        }
                    }
                }
            }
            if let Some(main) = map.get("mainEntity") {
                collect_json_ld(main, out);
            }
        }
        _ => {}
    }
}

/// Products described by a page's JSON-LD blocks and microdata.
pub(crate) fn parse_structured_products(html: &str) -> Vec<StructuredProduct> {
    let document = Html::parse_document(html);
    let mut products = Vec::new();

    for script in document.select(&JSON_LD) {
        let raw = script.text().collect::<String>();
        match serde_json::from_str::<Value>(raw.trim()) {
            Ok(value) => collect_json_ld(&value, &mut products),
            Err(e) => debug!(error = %e, "Skipping malformed JSON-LD block"),
        }
    }

    for item in document.select(&MICRODATA_PRODUCT) {
        let url = item
            .select(&ITEMPROP_URL)
            .find_map(|el| el.value().attr("href").or_else(|| el.value().attr("content")))
            .or_else(|| item.select(&ANCHOR).find_map(|a| a.value().attr("href")));
        let Some(url) = url else {
            continue;
        };
        let name = item.select(&ITEMPROP_NAME).next().and_then(|el| {
            el.value()
                .attr("content")
                .map(str::to_string)
                .or_else(|| Some(dom::element_text(el)))
                .filter(|n| !n.trim().is_empty())
        });
        let image = item
            .select(&ITEMPROP_IMAGE)
            .find_map(|el| el.value().attr("src").or_else(|| el.value().attr("content")))
            .map(str::to_string);

        products.push(StructuredProduct {
            url: url.to_string(),
            name,
            description: None,
            image,
        });
    }

    products
}

/// Discovers products from embedded metadata on the home page and catalog guesses.
pub struct StructuredDataDiscoverer {
    fetcher: CachedFetcher,
    catalog_paths: Vec<String>,
    delay: Duration,
}

impl StructuredDataDiscoverer {
    /// Pages are the base URL plus the HTML crawl's catalog guesses.
    pub fn new(fetcher: CachedFetcher, html: &HtmlCrawlConfig) -> Self {
        Self {
            fetcher,
            catalog_paths: html.catalog_paths.clone(),
            delay: html.delay,
        }
    }
}

#[async_trait]
impl Discoverer for StructuredDataDiscoverer {
    fn source(&self) -> DiscoverySource {
        DiscoverySource::StructuredData
    }

    async fn discover(&self, ctx: &DiscoveryContext<'_>) -> DiscoveryResult<Vec<ProductCandidate>> {
        let mut pages: Vec<Url> = vec![ctx.base_url.clone()];
        pages.extend(self.catalog_paths.iter().filter_map(|p| site_url(ctx.base_url, p)));

        let mut found: IndexMap<String, ProductCandidate> = IndexMap::new();
        let mut errors = 0usize;
        let mut last_error: Option<FetchError> = None;

        for (i, page_url) in pages.iter().enumerate() {
            if i > 0 {
                politeness_delay(self.delay).await;
            }

            let page = match self.fetcher.fetch(page_url, ctx.refresh).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(url = %page_url, error = %e, "Failed to fetch page for structured data");
                    errors += 1;
                    last_error = Some(e);
                    continue;
                }
            };
            if !page.is_success() || !page.is_html() {
                debug!(url = %page_url, status = page.status, "Skipping non-HTML page");
                continue;
            }

            for product in parse_structured_products(&page.body) {
                let Some(url) = resolve_href(page_url, &product.url) else {
                    continue;
                };
                if !same_host(&url, ctx.base_url) {
                    debug!(url = %url, "Dropping off-host structured-data product");
                    continue;
                }
                let Some(mut candidate) = ProductCandidate::new(url.as_str(), DiscoverySource::StructuredData) else {
                    continue;
                };
                if let Some(name) = product.name {
                    candidate = candidate.with_name(name);
                }
                if let Some(description) = product.description {
                    candidate = candidate.with_description(description);
                }
                if let Some(image) = product.image.and_then(|i| resolve_href(page_url, &i)) {
                    candidate = candidate.with_image_url(image.to_string());
                }

                match found.get_mut(&candidate.url) {
                    Some(existing) => existing.fill_missing_from(&candidate),
                    None => {
                        found.insert(candidate.url.clone(), candidate);
                    }
                }
            }
        }

        if found.is_empty() && errors == pages.len() {
            if let Some(e) = last_error {
                return Err(DiscoveryError::Fetch(e));
            }
        }

        info!(base_url = %ctx.base_url, candidates = found.len(), "Structured-data discovery complete");
        Ok(found.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::testing::MockFetcher;
    use crate::types::Platform;
    use std::sync::Arc;

    fn discoverer(mock: &Arc<MockFetcher>) -> StructuredDataDiscoverer {
        let fetcher = CachedFetcher::new(mock.clone(), Arc::new(MemoryCache::new()), Duration::from_secs(60));
        StructuredDataDiscoverer::new(fetcher, &HtmlCrawlConfig::default().with_delay(Duration::ZERO))
    }

    #[test]
    fn test_parse_item_list_and_graph() {
        let html = r#"<html><head>
            <script type="application/ld+json">
            {"@context":"https://schema.org","@type":"ItemList","itemListElement":[
              {"@type":"ListItem","position":1,"url":"/products/attikan","name":"Attikan Estate"},
              {"@type":"ListItem","position":2,"item":{"@type":"Product","url":"https://roaster.in/products/baarbara","name":"Baarbara"}}
            ]}
            </script>
            <script type="application/ld+json">
            {"@graph":[{"@type":"WebSite","url":"https://roaster.in"},
                       {"@type":["Product"],"@id":"https://roaster.in/products/ratnagiri","image":[{"url":"https://cdn/r.jpg"}]}]}
            </script>
            <script type="application/ld+json">{ not json </script>
        </head></html>"#;

        let products = parse_structured_products(html);
        let urls: Vec<&str> = products.iter().map(|p| p.url.as_str()).collect();

        assert_eq!(
            urls,
            vec![
                "/products/attikan",
                "https://roaster.in/products/baarbara",
                "https://roaster.in/products/ratnagiri"
            ]
        );
        assert_eq!(products[0].name.as_deref(), Some("Attikan Estate"));
        assert_eq!(products[2].image.as_deref(), Some("https://cdn/r.jpg"));
    }

    #[test]
    fn test_parse_microdata() {
        let html = r#"<div itemscope itemtype="https://schema.org/Product">
            <a itemprop="url" href="/products/kalledeverapura"><span itemprop="name">Kalledeverapura</span></a>
            <img itemprop="image" src="/k.jpg">
        </div>"#;

        let products = parse_structured_products(html);
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].url, "/products/kalledeverapura");
        assert_eq!(products[0].name.as_deref(), Some("Kalledeverapura"));
        assert_eq!(products[0].image.as_deref(), Some("/k.jpg"));
    }

    #[tokio::test]
    async fn test_discover_resolves_and_filters_hosts() {
        let home = r#"<html><script type="application/ld+json">
            [{"@type":"Product","url":"/products/a","name":"A"},
             {"@type":"Product","url":"https://marketplace.com/products/b","name":"B"}]
        </script></html>"#;
        let mock = Arc::new(MockFetcher::new().with_html("https://roaster.in/", home));
        let base = Url::parse("https://roaster.in").unwrap();
        let ctx = DiscoveryContext::new(&base, Platform::Unknown);

        let found = discoverer(&mock).discover(&ctx).await.unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].url, "https://roaster.in/products/a");
        assert_eq!(found[0].name.as_deref(), Some("A"));
        assert_eq!(found[0].discovered_via, DiscoverySource::StructuredData);
    }
}
