//! Discovery orchestration.

use indexmap::IndexMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{
    Discoverer, DiscoveryContext, EndpointDiscoverer, HtmlDiscoverer, SitemapDiscoverer,
    StructuredDataDiscoverer,
};
use crate::cache::{get_json, put_json, CacheStage, CacheStore};
use crate::classify::is_likely_coffee_product;
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::fetcher::CachedFetcher;
use crate::types::{DiscoveryConfig, Platform, ProductCandidate};
use crate::urls::parse_base_url;

/// Runs discovery strategies in priority order and merges their output.
///
/// Strategies run strictly one after another. A failing strategy is logged
/// and skipped; the call fails only when every strategy that ran failed and
/// nothing was found. Candidates are keyed by normalized URL: the first
/// strategy to report a URL owns its provenance, later ones may only fill a
/// missing name, description or image.
pub struct DiscoveryManager {
    strategies: Vec<Box<dyn Discoverer>>,
    cache: Arc<dyn CacheStore>,
    config: DiscoveryConfig,
}

impl DiscoveryManager {
    /// Build the standard strategy chain: endpoint, sitemap, structured data, HTML.
    pub fn new(fetcher: CachedFetcher, config: DiscoveryConfig) -> Self {
        let cache = fetcher.cache().clone();
        let strategies: Vec<Box<dyn Discoverer>> = vec![
            Box::new(EndpointDiscoverer::new(fetcher.clone(), config.endpoint.clone())),
            Box::new(SitemapDiscoverer::new(fetcher.clone(), config.sitemap.clone())),
            Box::new(StructuredDataDiscoverer::new(fetcher.clone(), &config.html)),
            Box::new(HtmlDiscoverer::new(fetcher, config.html.clone())),
        ];
        Self::with_strategies(strategies, cache, config)
    }

    /// Use a custom strategy chain, run in the given order.
    pub fn with_strategies(
        strategies: Vec<Box<dyn Discoverer>>,
        cache: Arc<dyn CacheStore>,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            strategies,
            cache,
            config,
        }
    }

    /// Discover product candidates for one site.
    ///
    /// Unless `refresh` is set, a cached candidate list for the site is
    /// returned as-is.
    pub async fn discover(
        &self,
        base_url: &str,
        platform: Platform,
        refresh: bool,
    ) -> DiscoveryResult<Vec<ProductCandidate>> {
        let base = parse_base_url(base_url).ok_or_else(|| DiscoveryError::InvalidBaseUrl {
            url: base_url.to_string(),
        })?;
        let cache_id = base.as_str().to_string();

        if !refresh {
            match get_json::<Vec<ProductCandidate>>(self.cache.as_ref(), CacheStage::Discovery, &cache_id).await {
                Ok(Some(cached)) => {
                    info!(base_url = %base, candidates = cached.len(), "Using cached discovery result");
                    return Ok(cached);
                }
                Ok(None) => {}
                Err(e) => warn!(base_url = %base, error = %e, "Discovery cache read failed"),
            }
        }

        let ctx = DiscoveryContext::new(&base, platform).with_refresh(refresh);
        let mut merged: IndexMap<String, ProductCandidate> = IndexMap::new();
        let mut ran = 0usize;
        let mut failed = 0usize;

        for strategy in &self.strategies {
            let source = strategy.source();
            if !strategy.applies_to(platform) {
                debug!(base_url = %base, strategy = %source, platform = %platform, "Strategy not applicable");
                continue;
            }

            ran += 1;
            match strategy.discover(&ctx).await {
                Ok(found) => {
                    let mut added = 0usize;
                    for candidate in found {
                        match merged.get_mut(&candidate.url) {
                            Some(existing) => existing.fill_missing_from(&candidate),
                            None => {
                                merged.insert(candidate.url.clone(), candidate);
                                added += 1;
                            }
                        }
                    }
                    info!(base_url = %base, strategy = %source, added, total = merged.len(), "Strategy finished");
                }
                Err(e) => {
                    failed += 1;
                    warn!(base_url = %base, strategy = %source, error = %e, "Discovery strategy failed");
                }
            }

            if ran >= self.config.min_strategies_before_stop && source.is_high_confidence() {
                let confident = merged
                    .values()
                    .filter(|c| c.discovered_via.is_high_confidence())
                    .count();
                if confident >= self.config.early_stop_threshold {
                    info!(
                        base_url = %base,
                        strategy = %source,
                        confident,
                        threshold = self.config.early_stop_threshold,
                        "Stopping discovery early"
                    );
                    break;
                }
            }
        }

        if merged.is_empty() && ran > 0 && failed == ran {
            return Err(DiscoveryError::AllStrategiesFailed {
                base_url: base.to_string(),
            });
        }

        let mut candidates: Vec<ProductCandidate> = merged.into_values().collect();
        if self.config.coffee_only {
            let before = candidates.len();
            candidates.retain(|c| is_likely_coffee_product(c.name.as_deref(), &c.url));
            debug!(base_url = %base, dropped = before - candidates.len(), "Applied coffee-product filter");
        }

        if !candidates.is_empty() {
            if let Err(e) = put_json(
                self.cache.as_ref(),
                CacheStage::Discovery,
                &cache_id,
                &candidates,
                self.config.result_ttl,
            )
            .await
            {
                warn!(base_url = %base, error = %e, "Discovery cache write failed");
            }
        }

        info!(base_url = %base, candidates = candidates.len(), "Discovery complete");
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::error::FetchError;
    use crate::types::DiscoverySource;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Strategy returning a fixed list (or failing), counting its runs.
    struct Scripted {
        source: DiscoverySource,
        urls: Vec<(&'static str, Option<&'static str>)>,
        fail: bool,
        only: Option<Platform>,
        runs: Arc<AtomicUsize>,
    }

    impl Scripted {
        fn new(source: DiscoverySource, urls: Vec<(&'static str, Option<&'static str>)>) -> Self {
            Self {
                source,
                urls,
                fail: false,
                only: None,
                runs: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn failing(source: DiscoverySource) -> Self {
            Self {
                fail: true,
                ..Self::new(source, Vec::new())
            }
        }

        fn only_for(mut self, platform: Platform) -> Self {
            self.only = Some(platform);
            self
        }
    }

    #[async_trait]
    impl Discoverer for Scripted {
        fn source(&self) -> DiscoverySource {
            self.source
        }

        fn applies_to(&self, platform: Platform) -> bool {
            self.only.map_or(true, |only| only == platform)
        }

        async fn discover(&self, _ctx: &DiscoveryContext<'_>) -> DiscoveryResult<Vec<ProductCandidate>> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(DiscoveryError::Fetch(FetchError::Timeout {
                    url: "https://roaster.in".into(),
                }));
            }
            Ok(self
                .urls
                .iter()
                .filter_map(|(url, name)| {
                    let c = ProductCandidate::new(url, self.source)?;
                    Some(match name {
                        Some(n) => c.with_name(*n),
                        None => c,
                    })
                })
                .collect())
        }
    }

    fn manager(strategies: Vec<Box<dyn Discoverer>>, config: DiscoveryConfig) -> DiscoveryManager {
        DiscoveryManager::with_strategies(strategies, Arc::new(MemoryCache::new()), config)
    }

    #[tokio::test]
    async fn test_first_strategy_owns_provenance_later_fills_name() {
        let m = manager(
            vec![
                Box::new(Scripted::new(DiscoverySource::Sitemap, vec![("https://roaster.in/products/a", None)])),
                Box::new(Scripted::new(
                    DiscoverySource::Html,
                    vec![("https://roaster.in/products/a/?ref=nav", Some("Attikan")), ("https://roaster.in/products/b", None)],
                )),
            ],
            DiscoveryConfig::new(),
        );

        let found = m.discover("roaster.in", Platform::Unknown, false).await.unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].discovered_via, DiscoverySource::Sitemap);
        assert_eq!(found[0].name.as_deref(), Some("Attikan"));
    }

    #[tokio::test]
    async fn test_failures_are_skipped() {
        let m = manager(
            vec![
                Box::new(Scripted::failing(DiscoverySource::Sitemap)),
                Box::new(Scripted::new(DiscoverySource::Html, vec![("https://roaster.in/products/a", None)])),
            ],
            DiscoveryConfig::new(),
        );

        let found = m.discover("https://roaster.in", Platform::Unknown, false).await.unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_all_failing_is_an_error() {
        let m = manager(
            vec![
                Box::new(Scripted::failing(DiscoverySource::Sitemap)),
                Box::new(Scripted::failing(DiscoverySource::Html)),
            ],
            DiscoveryConfig::new(),
        );

        let result = m.discover("https://roaster.in", Platform::Unknown, false).await;
        assert!(matches!(result, Err(DiscoveryError::AllStrategiesFailed { .. })));
    }

    #[tokio::test]
    async fn test_early_stop_never_before_second_strategy() {
        let first = Scripted::new(
            DiscoverySource::Endpoint,
            vec![("https://roaster.in/products/a", None), ("https://roaster.in/products/b", None)],
        );
        let second = Scripted::new(DiscoverySource::Sitemap, vec![("https://roaster.in/products/c", None)]);
        let third = Scripted::new(DiscoverySource::Html, vec![("https://roaster.in/products/d", None)]);
        let (second_runs, third_runs) = (second.runs.clone(), third.runs.clone());

        let m = manager(
            vec![Box::new(first), Box::new(second), Box::new(third)],
            DiscoveryConfig::new().with_early_stop_threshold(1),
        );

        let found = m.discover("https://roaster.in", Platform::Unknown, false).await.unwrap();

        assert_eq!(second_runs.load(Ordering::SeqCst), 1);
        assert_eq!(third_runs.load(Ordering::SeqCst), 0);
        assert_eq!(found.len(), 3);
    }

    #[tokio::test]
    async fn test_skipped_strategy_does_not_count_toward_early_stop() {
        let endpoint = Scripted::new(DiscoverySource::Endpoint, vec![("https://roaster.in/products/a", None)])
            .only_for(Platform::Shopify);
        let sitemap = Scripted::new(
            DiscoverySource::Sitemap,
            vec![("https://roaster.in/products/b", None), ("https://roaster.in/products/c", None)],
        );
        let structured = Scripted::new(DiscoverySource::StructuredData, vec![("https://roaster.in/products/d", None)]);
        let html = Scripted::new(DiscoverySource::Html, vec![("https://roaster.in/products/e", None)]);
        let runs = [endpoint.runs.clone(), sitemap.runs.clone(), structured.runs.clone(), html.runs.clone()];

        let m = manager(
            vec![Box::new(endpoint), Box::new(sitemap), Box::new(structured), Box::new(html)],
            DiscoveryConfig::new().with_early_stop_threshold(2),
        );

        let found = m.discover("https://roaster.in", Platform::Unknown, false).await.unwrap();

        let counts: Vec<usize> = runs.iter().map(|r| r.load(Ordering::SeqCst)).collect();
        assert_eq!(counts, vec![0, 1, 1, 0]);
        assert_eq!(found.len(), 3);
    }

    #[tokio::test]
    async fn test_coffee_filter() {
        let m = manager(
            vec![Box::new(Scripted::new(
                DiscoverySource::Sitemap,
                vec![
                    ("https://roaster.in/products/attikan", Some("Attikan Estate")),
                    ("https://roaster.in/products/ceramic-mug", Some("Ceramic Mug")),
                ],
            ))],
            DiscoveryConfig::new().with_coffee_only(true),
        );

        let found = m.discover("https://roaster.in", Platform::Unknown, false).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name.as_deref(), Some("Attikan Estate"));
    }

    #[tokio::test]
    async fn test_result_cache_honours_refresh() {
        let strategy = Scripted::new(DiscoverySource::Sitemap, vec![("https://roaster.in/products/a", None)]);
        let runs = strategy.runs.clone();
        let m = manager(vec![Box::new(strategy)], DiscoveryConfig::new());

        m.discover("https://roaster.in", Platform::Unknown, false).await.unwrap();
        m.discover("https://roaster.in", Platform::Unknown, false).await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        m.discover("https://roaster.in", Platform::Unknown, true).await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalid_base_url() {
        let m = manager(Vec::new(), DiscoveryConfig::new());
        let result = m.discover("   ", Platform::Unknown, false).await;
        assert!(matches!(result, Err(DiscoveryError::InvalidBaseUrl { .. })));
    }
}
