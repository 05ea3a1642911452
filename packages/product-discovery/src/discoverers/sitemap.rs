//! Sitemap discovery.
//!
//! Walks `urlset` and `sitemapindex` documents breadth-first from a list of
//! well-known sitemap locations. Nested indexes are followed up to a depth
//! bound; listed page URLs are kept when the path classifier admits them.

use async_trait::async_trait;
use indexmap::IndexMap;
use quick_xml::events::Event as XmlEvent;
use quick_xml::Reader;
use std::collections::{HashSet, VecDeque};
use tracing::{debug, info, warn};
use url::Url;

use super::{Discoverer, DiscoveryContext};
use crate::classify::classify_url;
use crate::error::{DiscoveryError, DiscoveryResult, FetchError};
use crate::fetcher::CachedFetcher;
use crate::types::{DiscoverySource, ProductCandidate, SitemapConfig};
use crate::urls::{same_host, site_url};

/// Child sitemaps whose URL mentions one of these are followed first.
const PRODUCT_SITEMAP_HINTS: &[&str] = &["product", "shop", "store", "coffee", "bean", "catalog"];

#[derive(Debug, Clone, PartialEq)]
struct SitemapEntry {
    loc: String,
    image: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum SitemapDocument {
    UrlSet(Vec<SitemapEntry>),
    Index(Vec<String>),
}

fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

fn parse_sitemap(xml: &str) -> Result<SitemapDocument, String> {
    let mut reader = Reader::from_reader(xml.as_bytes());
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut root: Option<String> = None;
    let mut entries: Vec<SitemapEntry> = Vec::new();
    let mut children: Vec<String> = Vec::new();
    let mut current: Option<SitemapEntry> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(XmlEvent::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if root.is_none() {
                    root = Some(local_name(&name).to_string());
                }
                if name == "url" {
                    current = Some(SitemapEntry {
                        loc: String::new(),
                        image: None,
                    });
                }
                stack.push(name);
            }
            Ok(XmlEvent::End(e)) => {
                if e.name().as_ref() == b"url" {
                    if let Some(entry) = current.take().filter(|entry| !entry.loc.is_empty()) {
                        entries.push(entry);
                    }
                }
                stack.pop();
            }
            Ok(XmlEvent::Text(t)) => {
                let text = t.unescape().map_err(|e| e.to_string())?.trim().to_string();
                record_text(&stack, text, &mut current, &mut children);
            }
            Ok(XmlEvent::CData(c)) => {
                let text = String::from_utf8_lossy(&c.into_inner()).trim().to_string();
                record_text(&stack, text, &mut current, &mut children);
            }
            Ok(XmlEvent::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }

    match root.as_deref() {
        Some("urlset") => Ok(SitemapDocument::UrlSet(entries)),
        Some("sitemapindex") => Ok(SitemapDocument::Index(children)),
        Some(other) => Err(format!("unexpected root element <{}>", other)),
        None => Err("empty document".to_string()),
    }
}

fn record_text(
    stack: &[String],
    text: String,
    current: &mut Option<SitemapEntry>,
    children: &mut Vec<String>,
) {
    let [.., parent, element] = stack else {
        return;
    };
    if text.is_empty() {
        return;
    }
    match (local_name(parent), element.as_str()) {
        ("url", "loc") => {
            if let Some(entry) = current.as_mut() {
                entry.loc = text;
            }
        }
        ("sitemap", "loc") => children.push(text),
        ("image", name) if local_name(name) == "loc" => {
            if let Some(entry) = current.as_mut() {
                entry.image.get_or_insert(text);
            }
        }
        _ => {}
    }
}

fn is_product_sitemap(url: &Url) -> bool {
    let path = url.path().to_ascii_lowercase();
    PRODUCT_SITEMAP_HINTS.iter().any(|hint| path.contains(hint))
}

/// Discovers products listed in the site's XML sitemaps.
pub struct SitemapDiscoverer {
    fetcher: CachedFetcher,
    config: SitemapConfig,
}

impl SitemapDiscoverer {
    pub fn new(fetcher: CachedFetcher, config: SitemapConfig) -> Self {
        Self { fetcher, config }
    }

    /// Walk one sitemap tree, adding accepted URLs to `found`.
    ///
    /// Returns the root fetch error, if the root itself could not be fetched.
    async fn walk(
        &self,
        root: Url,
        ctx: &DiscoveryContext<'_>,
        documents: &mut usize,
        seen: &mut HashSet<String>,
        found: &mut IndexMap<String, ProductCandidate>,
    ) -> Option<FetchError> {
        let mut queue: VecDeque<(Url, usize)> = VecDeque::from([(root, 0)]);

        while let Some((url, depth)) = queue.pop_front() {
            if *documents >= self.config.max_documents {
                debug!(url = %url, "Sitemap document budget exhausted");
                break;
            }
            if !seen.insert(url.as_str().to_string()) {
                continue;
            }
            *documents += 1;

            let page = match self.fetcher.fetch(&url, ctx.refresh).await {
                Ok(page) => page,
                Err(e) if depth == 0 => {
                    debug!(url = %url, error = %e, "Sitemap root unavailable");
                    return Some(e);
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Failed to fetch nested sitemap");
                    continue;
                }
            };
            if !page.is_success() {
                debug!(url = %url, status = page.status, "No sitemap at location");
                continue;
            }

            match parse_sitemap(&page.body) {
                Ok(SitemapDocument::Index(children)) => {
                    if depth >= self.config.max_depth {
                        debug!(url = %url, depth, "Sitemap index beyond max depth, not following");
                        continue;
                    }
                    let children: Vec<Url> = children
                        .iter()
                        .filter_map(|c| url.join(c).ok())
                        .collect();
                    let product_like: Vec<Url> =
                        children.iter().filter(|c| is_product_sitemap(c)).cloned().collect();
                    let follow = if product_like.is_empty() { children } else { product_like };

                    debug!(url = %url, children = follow.len(), "Following sitemap index");
                    for child in follow {
                        queue.push_back((child, depth + 1));
                    }
                }
                Ok(SitemapDocument::UrlSet(entries)) => {
                    let before = found.len();
                    for entry in entries {
                        let Ok(loc) = url.join(&entry.loc) else {
                            continue;
                        };
                        if !same_host(&loc, ctx.base_url) || !classify_url(&loc).is_candidate() {
                            continue;
                        }
                        let Some(mut candidate) = ProductCandidate::new(loc.as_str(), DiscoverySource::Sitemap) else {
                            continue;
                        };
                        if let Some(image) = entry.image {
                            candidate = candidate.with_image_url(image);
                        }
                        found.entry(candidate.url.clone()).or_insert(candidate);
                    }
                    debug!(url = %url, accepted = found.len() - before, "Parsed sitemap urlset");
                }
                Err(reason) => {
                    warn!(url = %url, reason = %reason, "Malformed sitemap, skipping");
                }
            }
        }

        None
    }
}

#[async_trait]
impl Discoverer for SitemapDiscoverer {
    fn source(&self) -> DiscoverySource {
        DiscoverySource::Sitemap
    }

    async fn discover(&self, ctx: &DiscoveryContext<'_>) -> DiscoveryResult<Vec<ProductCandidate>> {
        let mut found: IndexMap<String, ProductCandidate> = IndexMap::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut documents = 0usize;
        let mut roots_tried = 0usize;
        let mut last_error: Option<FetchError> = None;
        let mut root_errors = 0usize;

        for path in &self.config.paths {
            let Some(root) = site_url(ctx.base_url, path) else {
                continue;
            };
            roots_tried += 1;

            if let Some(e) = self.walk(root, ctx, &mut documents, &mut seen, &mut found).await {
                root_errors += 1;
                last_error = Some(e);
            }

            if !found.is_empty() {
                info!(
                    base_url = %ctx.base_url,
                    sitemap = %path,
                    candidates = found.len(),
                    documents,
                    "Sitemap discovery found products"
                );
                break;
            }
        }

        if found.is_empty() && roots_tried > 0 && root_errors == roots_tried {
            if let Some(e) = last_error {
                return Err(DiscoveryError::Fetch(e));
            }
        }

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
    use std::time::Duration;

    fn discoverer(mock: &Arc<MockFetcher>) -> SitemapDiscoverer {
        let fetcher = CachedFetcher::new(mock.clone(), Arc::new(MemoryCache::new()), Duration::from_secs(60));
        SitemapDiscoverer::new(fetcher, SitemapConfig::default())
    }

    fn urlset(urls: &[&str]) -> String {
        let body: String = urls.iter().map(|u| format!("<url><loc>{}</loc></url>", u)).collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{}</urlset>"#,
            body
        )
    }

    #[test]
    fn test_parse_urlset_with_images() {
        let xml = r#"<?xml version="1.0"?>
            <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9" xmlns:image="http://www.google.com/schemas/sitemap-image/1.1">
              <url>
                <loc>https://roaster.in/products/attikan</loc>
                <image:image><image:loc>https://cdn.roaster.in/attikan.jpg</image:loc></image:image>
              </url>
              <url><loc>https://roaster.in/about</loc></url>
            </urlset>"#;

        let SitemapDocument::UrlSet(entries) = parse_sitemap(xml).unwrap() else {
            panic!("expected urlset");
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].image.as_deref(), Some("https://cdn.roaster.in/attikan.jpg"));
        assert!(entries[1].image.is_none());
    }

    #[test]
    fn test_parse_index() {
        let xml = r#"<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
            <sitemap><loc>https://roaster.in/sitemap_products_1.xml?from=1&amp;to=99</loc></sitemap>
            <sitemap><loc>https://roaster.in/sitemap_pages_1.xml</loc></sitemap>
        </sitemapindex>"#;

        assert_eq!(
            parse_sitemap(xml).unwrap(),
            SitemapDocument::Index(vec![
                "https://roaster.in/sitemap_products_1.xml?from=1&to=99".to_string(),
                "https://roaster.in/sitemap_pages_1.xml".to_string(),
            ])
        );
    }

    #[test]
    fn test_parse_rejects_html() {
        assert!(parse_sitemap("<html><body>Not found</body></html>").is_err());
    }

    #[tokio::test]
    async fn test_keeps_only_product_paths() {
        let mock = Arc::new(MockFetcher::new().with_xml(
            "https://roaster.in/sitemap.xml",
            urlset(&[
                "https://roaster.in/collections/all",
                "https://roaster.in/products/dark-roast",
                "https://roaster.in/products/light-roast",
                "https://roaster.in/about",
            ]),
        ));
        let base = Url::parse("https://roaster.in").unwrap();
        let ctx = DiscoveryContext::new(&base, Platform::Unknown);

        let found = discoverer(&mock).discover(&ctx).await.unwrap();
        let urls: Vec<&str> = found.iter().map(|c| c.url.as_str()).collect();

        assert_eq!(
            urls,
            vec!["https://roaster.in/products/dark-roast", "https://roaster.in/products/light-roast"]
        );
        assert!(found.iter().all(|c| c.discovered_via == DiscoverySource::Sitemap));
    }

    #[tokio::test]
    async fn test_follows_product_child_sitemaps_only() {
        let index = r#"<sitemapindex>
            <sitemap><loc>https://roaster.in/sitemap_products_1.xml</loc></sitemap>
            <sitemap><loc>https://roaster.in/sitemap_blogs_1.xml</loc></sitemap>
        </sitemapindex>"#;
        let mock = Arc::new(
            MockFetcher::new()
                .with_xml("https://roaster.in/sitemap.xml", index)
                .with_xml(
                    "https://roaster.in/sitemap_products_1.xml",
                    urlset(&["https://roaster.in/products/monsooned-malabar"]),
                )
                .with_xml(
                    "https://roaster.in/sitemap_blogs_1.xml",
                    urlset(&["https://roaster.in/products/never-seen"]),
                ),
        );
        let base = Url::parse("https://roaster.in").unwrap();
        let ctx = DiscoveryContext::new(&base, Platform::Shopify);

        let found = discoverer(&mock).discover(&ctx).await.unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].url, "https://roaster.in/products/monsooned-malabar");
        assert_eq!(mock.fetch_count("https://roaster.in/sitemap_blogs_1.xml"), 0);
    }

    #[tokio::test]
    async fn test_drops_off_host_urls() {
        let mock = Arc::new(MockFetcher::new().with_xml(
            "https://roaster.in/sitemap.xml",
            urlset(&["https://cdn.other.com/products/x", "https://roaster.in/products/y"]),
        ));
        let base = Url::parse("https://roaster.in").unwrap();
        let ctx = DiscoveryContext::new(&base, Platform::Unknown);

        let found = discoverer(&mock).discover(&ctx).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].url, "https://roaster.in/products/y");
    }

    #[tokio::test]
    async fn test_missing_sitemaps_yield_empty() {
        let mock = Arc::new(MockFetcher::new());
        let base = Url::parse("https://roaster.in").unwrap();
        let ctx = DiscoveryContext::new(&base, Platform::Unknown);

        let found = discoverer(&mock).discover(&ctx).await.unwrap();
        assert!(found.is_empty());
        assert_eq!(mock.distinct_fetches(), SitemapConfig::default().paths.len());
    }

    #[tokio::test]
    async fn test_all_roots_failing_is_an_error() {
        let mut mock = MockFetcher::new();
        for path in &SitemapConfig::default().paths {
            mock = mock.with_error(&format!("https://roaster.in{}", path));
        }
        let mock = Arc::new(mock);
        let base = Url::parse("https://roaster.in").unwrap();
        let ctx = DiscoveryContext::new(&base, Platform::Unknown);

        let result = discoverer(&mock).discover(&ctx).await;
        assert!(matches!(result, Err(DiscoveryError::Fetch(_))));
    }
}
