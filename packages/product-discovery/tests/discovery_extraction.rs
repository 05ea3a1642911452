//! End-to-end behaviour of discovery and extraction through the public API.
//!
//! Every test runs against `MockFetcher` routes and a `MockLanguageModel`, so
//! nothing touches the network.

use chrono::Utc;
use product_discovery::{
    discoverers::{Discoverer, DiscoveryContext, HtmlDiscoverer, SitemapDiscoverer},
    testing::{MockFetcher, MockLanguageModel},
    types::{HtmlCrawlConfig, SitemapConfig},
    CacheEntry, CacheStore, CachedFetcher, DiscoveryConfig, DiscoveryManager, DiscoverySource,
    EnrichmentSource, ExtractionConfig, FallbackExtractor, MemoryCache, Platform, ProductCandidate,
    ProductExtractor, RoastLevel,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Helper to wrap a mock in the cache-first fetch path.
fn cached(mock: &Arc<MockFetcher>) -> CachedFetcher {
    CachedFetcher::new(mock.clone(), Arc::new(MemoryCache::new()), Duration::from_secs(3600))
}

fn base() -> Url {
    Url::parse("https://roaster.in").unwrap()
}

fn crawl_config() -> HtmlCrawlConfig {
    HtmlCrawlConfig::default()
        .with_delay(Duration::ZERO)
        .with_catalog_paths(Vec::new())
}

#[tokio::test]
async fn test_sitemap_keeps_only_product_paths() {
    let sitemap = r#"<?xml version="1.0" encoding="UTF-8"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <url><loc>https://roaster.in/collections/all</loc></url>
          <url><loc>https://roaster.in/products/dark-roast</loc></url>
          <url><loc>https://roaster.in/products/light-roast</loc></url>
          <url><loc>https://roaster.in/about</loc></url>
        </urlset>"#;
    let mock = Arc::new(MockFetcher::new().with_xml("https://roaster.in/sitemap.xml", sitemap));
    let base = base();

    let found = SitemapDiscoverer::new(cached(&mock), SitemapConfig::default())
        .discover(&DiscoveryContext::new(&base, Platform::Unknown))
        .await
        .unwrap();

    let urls: Vec<&str> = found.iter().map(|c| c.url.as_str()).collect();
    assert_eq!(
        urls,
        vec!["https://roaster.in/products/dark-roast", "https://roaster.in/products/light-roast"]
    );
    assert!(found.iter().all(|c| c.discovered_via == DiscoverySource::Sitemap));
}

#[tokio::test]
async fn test_html_teasers_become_candidates() {
    let page = r#"<html><body><div class="collection">
        <div class="product-card"><a href="/products/attikan"><h3>Attikan Estate</h3></a></div>
        <div class="product-card"><a href="/products/ratnagiri"><h3>Ratnagiri</h3></a></div>
        <div class="product-card"><a href="/products/baarbara"><h3>Baarbara Estate</h3></a></div>
    </div></body></html>"#;
    let mock = Arc::new(MockFetcher::new().with_html("https://roaster.in/", page));
    let base = base();

    let found = HtmlDiscoverer::new(cached(&mock), crawl_config())
        .discover(&DiscoveryContext::new(&base, Platform::Unknown))
        .await
        .unwrap();

    assert_eq!(found.len(), 3);
    assert!(found.iter().all(|c| c.discovered_via == DiscoverySource::Html));
    let names: HashSet<_> = found.iter().filter_map(|c| c.name.as_deref()).collect();
    assert!(names.contains("Baarbara Estate"));
}

#[tokio::test]
async fn test_html_crawl_respects_page_budget_and_host() {
    let mut mock = MockFetcher::new();
    for i in 1..=20 {
        let links = format!(
            r#"<div class="pagination"><a href="/collections/all?page={}">next</a><a href="/collections/all?page={}">skip</a></div>
               <a href="/products/lot-{}">Lot {}</a>
               <a href="https://other-roaster.in/products/stolen-{}">Elsewhere</a>"#,
            i + 1,
            i + 2,
            i,
            i,
            i
        );
        let url = if i == 1 {
            "https://roaster.in/".to_string()
        } else {
            format!("https://roaster.in/collections/all?page={}", i)
        };
        mock = mock.with_html(&url, links);
    }
    let mock = Arc::new(mock);
    let base = base();

    let found = HtmlDiscoverer::new(cached(&mock), crawl_config().with_max_pages(5).with_max_depth(20))
        .discover(&DiscoveryContext::new(&base, Platform::Unknown))
        .await
        .unwrap();

    assert_eq!(mock.distinct_fetches(), 5);
    assert!(found.iter().all(|c| c.url.starts_with("https://roaster.in/")));
    let unique: HashSet<_> = found.iter().map(|c| c.url.clone()).collect();
    assert_eq!(unique.len(), found.len());
}

#[tokio::test]
async fn test_rediscovery_without_refresh_hits_cache() {
    let page = r#"<div class="product-card"><a href="/products/attikan">Attikan</a></div>"#;
    let mock = Arc::new(MockFetcher::new().with_html("https://roaster.in/", page));
    let discoverer = HtmlDiscoverer::new(cached(&mock), crawl_config());
    let base = base();
    let ctx = DiscoveryContext::new(&base, Platform::Unknown);

    let first = discoverer.discover(&ctx).await.unwrap();
    mock.clear_calls();
    let second = discoverer.discover(&ctx).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(mock.fetch_count("https://roaster.in/"), 0);

    discoverer.discover(&ctx.with_refresh(true)).await.unwrap();
    assert_eq!(mock.fetch_count("https://roaster.in/"), 1);
}

#[tokio::test]
async fn test_manager_dedups_across_strategies() {
    let sitemap = r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <url><loc>https://roaster.in/products/attikan/</loc></url>
        </urlset>"#;
    let home = r#"<div class="product-card"><a href="/products/attikan?variant=1"><h3>Attikan Estate</h3></a></div>
        <div class="product-card"><a href="/products/kaapi"><h3>Kaapi</h3></a></div>"#;
    let mock = Arc::new(
        MockFetcher::new()
            .with_xml("https://roaster.in/sitemap.xml", sitemap)
            .with_html("https://roaster.in/", home),
    );
    let config = DiscoveryConfig::new()
        .without_delays()
        .with_html(crawl_config());

    let found = DiscoveryManager::new(cached(&mock), config)
        .discover("roaster.in", Platform::Unknown, false)
        .await
        .unwrap();

    assert_eq!(found.len(), 2);
    let attikan = found.iter().find(|c| c.url.ends_with("/attikan")).unwrap();
    assert_eq!(attikan.discovered_via, DiscoverySource::Sitemap);
    assert_eq!(attikan.name.as_deref(), Some("Attikan Estate"));
}

fn extractor(mock: &Arc<MockFetcher>, model: &Arc<MockLanguageModel>) -> ProductExtractor {
    ProductExtractor::new(cached(mock), ExtractionConfig::new())
        .with_fallback(FallbackExtractor::new(model.clone(), ExtractionConfig::new()))
}

#[tokio::test]
async fn test_fallback_fills_missing_roast_and_price() {
    let url = "https://roaster.in/products/attikan";
    let page = r#"<html><body><h1>Attikan Estate</h1>
        <div class="description">A washed arabica grown in Chikmagalur.</div></body></html>"#;
    let mock = Arc::new(MockFetcher::new().with_html(url, page));
    let model = Arc::new(MockLanguageModel::new().with_reply(
        r#"Here you go: {"roast_level":"medium","prices":{"250":450}}"#,
    ));
    let candidate = ProductCandidate::new(url, DiscoverySource::Sitemap).unwrap();

    let outcome = extractor(&mock, &model).extract(&candidate, Platform::Unknown, false).await;
    let record = outcome.record;

    assert_eq!(record.roast_level, RoastLevel::Medium);
    assert_eq!(record.prices.get(&250), Some(&450.0));
    assert_eq!(record.enrichment_source, EnrichmentSource::Merged);
    assert_eq!(record.region_name.as_deref(), Some("Chikmagalur"));
}

#[tokio::test]
async fn test_fallback_never_overwrites_definite_roast() {
    let url = "https://roaster.in/products/monsoon";
    let page = r#"<html><body><h1>Monsoon Nights</h1>
        <div class="description">Our darkest, a dark roast for the stove-top.</div></body></html>"#;
    let mock = Arc::new(MockFetcher::new().with_html(url, page));
    let model = Arc::new(MockLanguageModel::new().with_reply(r#"{"roast_level":"medium","bean_type":"robusta"}"#));
    let candidate = ProductCandidate::new(url, DiscoverySource::Html).unwrap();

    let outcome = extractor(&mock, &model).extract(&candidate, Platform::Unknown, false).await;

    assert_eq!(model.call_count(), 1);
    assert_eq!(outcome.record.roast_level, RoastLevel::Dark);
    assert_eq!(outcome.record.bean_type.as_str(), "robusta");
    assert_eq!(outcome.record.enrichment_source, EnrichmentSource::Merged);
}

#[tokio::test]
async fn test_cache_round_trip_and_expiry() {
    let cache = MemoryCache::new();
    cache
        .set(CacheEntry::new("fresh", "payload", Duration::from_secs(60)))
        .await
        .unwrap();
    cache
        .set(
            CacheEntry::new("stale", "payload", Duration::from_secs(60))
                .with_stored_at(Utc::now() - chrono::Duration::seconds(120)),
        )
        .await
        .unwrap();

    let fresh = cache.get("fresh").await.unwrap().unwrap();
    assert_eq!(fresh.payload, "payload");
    assert!(cache.get("stale").await.unwrap().is_none());
}
