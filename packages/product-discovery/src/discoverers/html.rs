//! Breadth-first catalog crawl.
//!
//! Seeds the frontier with the home page and well-known catalog paths, then
//! for each page:
//! 1. pulls product links out of teaser containers (or, on pages without
//!    containers, from every anchor with a product-detail path),
//! 2. enqueues same-host pagination and category links one level deeper.
//!
//! The crawl is bounded by a page budget and a depth limit and never aborts
//! because of a single bad page.

use async_trait::async_trait;
use indexmap::IndexMap;
use scraper::{ElementRef, Html, Selector};
use std::collections::{HashSet, VecDeque};
use std::sync::LazyLock;
use tracing::{debug, info, warn};
use url::Url;

use super::{politeness_delay, Discoverer, DiscoveryContext};
use crate::classify::{classify_url, PathClass};
use crate::dom;
use crate::error::DiscoveryResult;
use crate::fetcher::{CachedFetcher, FetchedPage};
use crate::types::{DiscoverySource, HtmlCrawlConfig, ProductCandidate};
use crate::urls::{resolve_href, same_host, site_url, title_from_slug};

/// Elements that typically wrap one product teaser, most specific first.
const CONTAINER_SELECTORS: &[&str] = &[
    ".product-card",
    ".product-item",
    ".grid-product",
    ".product-grid-item",
    ".productitem",
    ".product-block",
    ".card--product",
    ".collection-product",
    "li.product",
    "ul.products > li",
    "[data-product-id]",
    ".product",
];

/// Where the product link sits inside a container.
const LINK_SELECTORS: &[&str] = &[
    "a.product-card__link",
    "a.product-item__link",
    "a.grid-product__link",
    "a.woocommerce-LoopProduct-link",
    "a.full-unstyled-link",
    "a[href*='/products/']",
    "a[href*='/product/']",
    "a[href]",
];

/// Where the product name sits inside a container.
const NAME_SELECTORS: &[&str] = &[
    ".product-card__title",
    ".product-item__title",
    ".grid-product__title",
    ".woocommerce-loop-product__title",
    ".product-title",
    ".card__heading",
    "[itemprop='name']",
    "h2",
    "h3",
    "h4",
    ".title",
];

const PAGINATION_SELECTORS: &[&str] = &[
    ".pagination a",
    ".pager a",
    ".pages a",
    "nav.woocommerce-pagination a",
    "a.page-numbers",
    ".next-page",
    ".paginator a",
    ".pagination-next",
    "a[rel='next']",
];

/// Path fragments of category and collection listings.
const CATEGORY_PATH_MARKERS: &[&str] = &["/collections/", "/product-category/", "/category/", "/coffee/"];

struct Selectors {
    containers: Vec<Selector>,
    links: Vec<Selector>,
    names: Vec<Selector>,
    pagination: Vec<Selector>,
    anchor: Selector,
}

static SELECTORS: LazyLock<Selectors> = LazyLock::new(|| Selectors {
    containers: dom::compile(CONTAINER_SELECTORS),
    links: dom::compile(LINK_SELECTORS),
    names: dom::compile(NAME_SELECTORS),
    pagination: dom::compile(PAGINATION_SELECTORS),
    anchor: Selector::parse("a[href]").unwrap(),
});

/// Frontier identity: the URL without fragment or trailing slash.
///
/// The query is kept so `?page=2` and `?page=3` stay distinct pages.
fn frontier_key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.as_str().trim_end_matches('/').to_string()
}

/// Pending pages of one crawl.
///
/// Every URL ever admitted is remembered, so nothing is queued twice, and
/// admissions stop once visited plus queued pages reach the page budget.
/// Depth never exceeds `max_depth` and every queued URL shares the site's host.
#[derive(Debug)]
pub struct CrawlFrontier {
    site: Url,
    max_depth: usize,
    max_pages: usize,
    seen: HashSet<String>,
    queue: VecDeque<(Url, usize)>,
    visited: usize,
}

impl CrawlFrontier {
    pub fn new(site: &Url, max_depth: usize, max_pages: usize) -> Self {
        Self {
            site: site.clone(),
            max_depth,
            max_pages,
            seen: HashSet::new(),
            queue: VecDeque::new(),
            visited: 0,
        }
    }

    /// Queue `url` at `depth`. Returns whether it was admitted.
    pub fn push(&mut self, url: Url, depth: usize) -> bool {
        if depth > self.max_depth || !same_host(&url, &self.site) {
            return false;
        }
        if self.seen.len() >= self.max_pages {
            return false;
        }
        if !self.seen.insert(frontier_key(&url)) {
            return false;
        }
        self.queue.push_back((url, depth));
        true
    }

    /// Take the next page in BFS order and count it as visited.
    pub fn pop(&mut self) -> Option<(Url, usize)> {
        if self.visited >= self.max_pages {
            return None;
        }
        let next = self.queue.pop_front()?;
        self.visited += 1;
        Some(next)
    }

    /// Distinct pages handed out so far.
    pub fn visited(&self) -> usize {
        self.visited
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// A product link found on a catalog page.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CatalogLink {
    pub url: Url,
    pub name: Option<String>,
}

/// What one catalog page contributes to the crawl.
#[derive(Debug, Default)]
pub(crate) struct CatalogPage {
    pub products: Vec<CatalogLink>,
    pub follow: Vec<Url>,
}

fn href_of(element: ElementRef<'_>) -> Option<&str> {
    element.value().attr("href")
}

fn container_link(container: ElementRef<'_>, selectors: &Selectors) -> Option<String> {
    if container.value().name() == "a" {
        if let Some(href) = href_of(container) {
            return Some(href.to_string());
        }
    }
    selectors
        .links
        .iter()
        .find_map(|sel| container.select(sel).find_map(href_of))
        .map(str::to_string)
}

fn is_category_link(anchor: ElementRef<'_>, url: &Url) -> bool {
    let path = url.path().to_ascii_lowercase();
    if CATEGORY_PATH_MARKERS.iter().any(|m| path.contains(m)) {
        return true;
    }
    anchor
        .value()
        .attr("class")
        .map(|class| {
            let class = class.to_ascii_lowercase();
            class.contains("category") || class.contains("collection")
        })
        .unwrap_or(false)
}

/// Extract product links and follow-up listing links from one page.
pub(crate) fn parse_catalog_page(html: &str, page_url: &Url) -> CatalogPage {
    let document = Html::parse_document(html);
    let selectors = &*SELECTORS;
    let mut page = CatalogPage::default();

    let containers: Vec<ElementRef<'_>> = selectors
        .containers
        .iter()
        .map(|sel| document.select(sel).collect::<Vec<_>>())
        .find(|matches| !matches.is_empty())
        .unwrap_or_default();

    if containers.is_empty() {
        for anchor in document.select(&selectors.anchor) {
            let Some(url) = href_of(anchor).and_then(|h| resolve_href(page_url, h)) else {
                continue;
            };
            if classify_url(&url) != PathClass::Accept {
                continue;
            }
            let text = dom::element_text(anchor);
            let name = if text.is_empty() { title_from_slug(&url) } else { Some(text) };
            page.products.push(CatalogLink { url, name });
        }
    } else {
        for container in containers {
            let Some(url) = container_link(container, selectors).and_then(|h| resolve_href(page_url, &h)) else {
                continue;
            };
            if !classify_url(&url).is_candidate() {
                continue;
            }
            let name = dom::first_text(container, &selectors.names).or_else(|| title_from_slug(&url));
            page.products.push(CatalogLink { url, name });
        }
    }

    for sel in &selectors.pagination {
        for link in document.select(sel) {
            if let Some(url) = href_of(link).and_then(|h| resolve_href(page_url, h)) {
                page.follow.push(url);
            }
        }
    }

    for anchor in document.select(&selectors.anchor) {
        let Some(url) = href_of(anchor).and_then(|h| resolve_href(page_url, h)) else {
            continue;
        };
        if is_category_link(anchor, &url) && classify_url(&url) != PathClass::Accept {
            page.follow.push(url);
        }
    }

    page
}

/// URL the page was served from after redirects, used as the base for
/// relative links. Falls back to the requested URL when unparseable.
fn final_page_url(page: &FetchedPage, requested: &Url) -> Url {
    match Url::parse(&page.url) {
        Ok(url) => url,
        Err(e) => {
            debug!(url = %requested, final_url = %page.url, error = %e, "Unparseable final URL, using requested URL");
            requested.clone()
        }
    }
}

/// Discovers products by crawling catalog pages.
pub struct HtmlDiscoverer {
    fetcher: CachedFetcher,
    config: HtmlCrawlConfig,
}

impl HtmlDiscoverer {
    pub fn new(fetcher: CachedFetcher, config: HtmlCrawlConfig) -> Self {
        Self { fetcher, config }
    }

    fn seed(&self, base_url: &Url) -> CrawlFrontier {
        let mut frontier = CrawlFrontier::new(base_url, self.config.max_depth, self.config.max_pages);
        frontier.push(base_url.clone(), 0);
        for path in &self.config.catalog_paths {
            if let Some(url) = site_url(base_url, path) {
                frontier.push(url, 0);
            }
        }
        frontier
    }
}

#[async_trait]
impl Discoverer for HtmlDiscoverer {
    fn source(&self) -> DiscoverySource {
        DiscoverySource::Html
    }

    async fn discover(&self, ctx: &DiscoveryContext<'_>) -> DiscoveryResult<Vec<ProductCandidate>> {
        info!(
            base_url = %ctx.base_url,
            max_depth = self.config.max_depth,
            max_pages = self.config.max_pages,
            "HTML catalog crawl starting"
        );

        let mut frontier = self.seed(ctx.base_url);
        let mut found: IndexMap<String, ProductCandidate> = IndexMap::new();

        while let Some((url, depth)) = frontier.pop() {
            if frontier.visited() > 1 {
                politeness_delay(self.config.delay).await;
            }

            debug!(url = %url, depth, visited = frontier.visited(), "Fetching catalog page");
            let page = match self.fetcher.fetch(&url, ctx.refresh).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(url = %url, error = %e, "Failed to fetch catalog page");
                    continue;
                }
            };
            if !page.is_success() || !page.is_html() {
                debug!(url = %url, status = page.status, "Skipping non-HTML or failed page");
                continue;
            }

            let page_url = final_page_url(&page, &url);
            let catalog = parse_catalog_page(&page.body, &page_url);

            let mut accepted = 0usize;
            for link in catalog.products {
                if !same_host(&link.url, ctx.base_url) {
                    continue;
                }
                let Some(mut candidate) = ProductCandidate::new(link.url.as_str(), DiscoverySource::Html) else {
                    continue;
                };
                if let Some(name) = link.name {
                    candidate = candidate.with_name(name);
                }
                match found.get_mut(&candidate.url) {
                    Some(existing) => existing.fill_missing_from(&candidate),
                    None => {
                        found.insert(candidate.url.clone(), candidate);
                        accepted += 1;
                    }
                }
            }

            let mut enqueued = 0usize;
            for next in catalog.follow {
                if frontier.push(next, depth + 1) {
                    enqueued += 1;
                }
            }

            debug!(url = %url, new_products = accepted, enqueued, "Parsed catalog page");
        }

        info!(
            base_url = %ctx.base_url,
            pages_visited = frontier.visited(),
            candidates = found.len(),
            "HTML catalog crawl complete"
        );

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

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_final_page_url_follows_redirect_or_falls_back() {
        let requested = url("https://roaster.in/shop");

        let redirected = FetchedPage::html("https://roaster.in/collections/all", "");
        assert_eq!(final_page_url(&redirected, &requested).as_str(), "https://roaster.in/collections/all");

        let garbled = FetchedPage::html("not a url", "");
        assert_eq!(final_page_url(&garbled, &requested), requested);
    }

    fn discoverer(mock: &Arc<MockFetcher>, config: HtmlCrawlConfig) -> HtmlDiscoverer {
        let fetcher = CachedFetcher::new(mock.clone(), Arc::new(MemoryCache::new()), Duration::from_secs(60));
        HtmlDiscoverer::new(fetcher, config.with_delay(Duration::ZERO))
    }

    #[test]
    fn test_frontier_rejects_duplicates_depth_and_hosts() {
        let site = url("https://roaster.in/");
        let mut frontier = CrawlFrontier::new(&site, 2, 50);

        assert!(frontier.push(url("https://roaster.in/shop"), 0));
        assert!(!frontier.push(url("https://roaster.in/shop/"), 1));
        assert!(!frontier.push(url("https://roaster.in/shop#top"), 1));
        assert!(!frontier.push(url("https://roaster.in/deep"), 3));
        assert!(!frontier.push(url("https://other.in/shop"), 1));
        assert!(frontier.push(url("https://roaster.in/shop?page=2"), 1));
        assert_eq!(frontier.queued(), 2);
    }

    #[test]
    fn test_frontier_budget_bounds_queue_and_visits() {
        let site = url("https://roaster.in/");
        let mut frontier = CrawlFrontier::new(&site, 5, 3);
        for i in 0..10 {
            frontier.push(url(&format!("https://roaster.in/collections/all?page={}", i)), 1);
        }
        assert_eq!(frontier.queued(), 3);

        let mut popped = 0;
        while frontier.pop().is_some() {
            popped += 1;
        }
        assert_eq!(popped, 3);
        assert_eq!(frontier.visited(), 3);
    }

    #[test]
    fn test_parse_containers_with_name_fallback() {
        let html = r#"<div class="grid">
            <div class="product-card"><a href="/products/attikan"><h3>Attikan Estate</h3></a></div>
            <div class="product-card"><a href="/products/monsooned-malabar"></a></div>
            <div class="product-card"><a href="/collections/all">All</a></div>
        </div>"#;

        let page = parse_catalog_page(html, &url("https://roaster.in/shop"));

        assert_eq!(page.products.len(), 2);
        assert_eq!(page.products[0].name.as_deref(), Some("Attikan Estate"));
        assert_eq!(page.products[1].name.as_deref(), Some("Monsooned Malabar"));
    }

    #[test]
    fn test_parse_without_containers_keeps_strong_accepts_only() {
        let html = r#"<ul>
            <li><a href="/products/attikan">Attikan</a></li>
            <li><a href="/coffee/single-origin/ratnagiri">Ratnagiri</a></li>
            <li><a href="/blogs/news/harvest">Harvest notes</a></li>
        </ul>"#;

        let page = parse_catalog_page(html, &url("https://roaster.in/"));

        assert_eq!(page.products.len(), 1);
        assert_eq!(page.products[0].url.path(), "/products/attikan");
    }

    #[test]
    fn test_parse_collects_pagination_and_categories() {
        let html = r#"<body>
            <a class="nav-collection" href="/shop/espresso">Espresso</a>
            <a href="/collections/filter-roasts">Filter</a>
            <a href="/collections/all/products/attikan">Attikan</a>
            <nav class="pagination"><a href="?page=2">2</a></nav>
        </body>"#;

        let page = parse_catalog_page(html, &url("https://roaster.in/collections/all"));
        let follow: Vec<String> = page.follow.iter().map(|u| u.to_string()).collect();

        assert!(follow.contains(&"https://roaster.in/collections/all?page=2".to_string()));
        assert!(follow.contains(&"https://roaster.in/collections/filter-roasts".to_string()));
        assert!(follow.contains(&"https://roaster.in/shop/espresso".to_string()));
        assert!(!follow.iter().any(|u| u.contains("/products/")));
    }

    #[tokio::test]
    async fn test_three_teasers_three_candidates() {
        let html = r#"<html><body><main>
            <div class="product-item"><a href="/products/a"><span class="product-item__title">A</span></a></div>
            <div class="product-item"><a href="/products/b"><span class="product-item__title">B</span></a></div>
            <div class="product-item"><a href="/products/c"><span class="product-item__title">C</span></a></div>
        </main></body></html>"#;
        let mock = Arc::new(MockFetcher::new().with_html("https://roaster.in/", html));
        let base = url("https://roaster.in");
        let ctx = DiscoveryContext::new(&base, Platform::Unknown);

        let found = discoverer(&mock, HtmlCrawlConfig::default()).discover(&ctx).await.unwrap();

        assert_eq!(found.len(), 3);
        assert!(found.iter().all(|c| c.discovered_via == DiscoverySource::Html));
    }

    #[tokio::test]
    async fn test_page_budget_caps_distinct_fetches() {
        let links: String = (2..=20)
            .map(|i| format!(r#"<a href="/collections/all?page={}">{}</a>"#, i, i))
            .collect();
        let mut mock = MockFetcher::new().with_html(
            "https://roaster.in/",
            format!(r#"<nav class="pagination">{}</nav>"#, links),
        );
        for i in 2..=20 {
            mock = mock.with_html(
                &format!("https://roaster.in/collections/all?page={}", i),
                format!(r#"<nav class="pagination">{}</nav>"#, links),
            );
        }
        let mock = Arc::new(mock);
        let config = HtmlCrawlConfig::default()
            .with_max_pages(5)
            .with_max_depth(10)
            .with_catalog_paths(Vec::new());
        let base = url("https://roaster.in");
        let ctx = DiscoveryContext::new(&base, Platform::Unknown);

        discoverer(&mock, config).discover(&ctx).await.unwrap();

        assert_eq!(mock.distinct_fetches(), 5);
    }

    #[tokio::test]
    async fn test_bad_pages_do_not_abort_crawl() {
        let mock = Arc::new(
            MockFetcher::new()
                .with_error("https://roaster.in/")
                .with_html("https://roaster.in/shop", r#"<a href="/products/kaapi">Kaapi</a>"#),
        );
        let config = HtmlCrawlConfig::default().with_catalog_paths(vec!["/shop".to_string()]);
        let base = url("https://roaster.in");
        let ctx = DiscoveryContext::new(&base, Platform::Unknown);

        let found = discoverer(&mock, config).discover(&ctx).await.unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name.as_deref(), Some("Kaapi"));
    }
}
