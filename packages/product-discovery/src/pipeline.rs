//! Multi-site discovery and extraction pipeline.
//!
//! Each site is one unit of work: discover candidates, then extract them one
//! by one with a politeness delay. Sites run concurrently up to the configured
//! limit. No failure inside a site escapes it; failures are counted in the
//! site's stats and logged.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::{get_json, put_json, CacheStage, CacheStore};
use crate::discoverers::{politeness_delay, DiscoveryManager};
use crate::extractors::{FallbackExtractor, ProductExtractor};
use crate::fetcher::CachedFetcher;
use crate::llm::LanguageModel;
use crate::types::{
    DiscoveryConfig, ExtractionConfig, PipelineConfig, ProductCandidate, ProductRecord, SiteRequest,
};

/// Counters for one site or a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub sites_processed: usize,
    pub products_discovered: usize,
    pub products_extracted: usize,
    pub products_enriched: usize,
    pub errors: usize,
}

impl PipelineStats {
    /// Add another set of counters into this one.
    pub fn absorb(&mut self, other: &PipelineStats) {
        self.sites_processed += other.sites_processed;
        self.products_discovered += other.products_discovered;
        self.products_extracted += other.products_extracted;
        self.products_enriched += other.products_enriched;
        self.errors += other.errors;
    }
}

/// Everything produced for one site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteReport {
    pub base_url: String,
    pub records: Vec<ProductRecord>,
    pub stats: PipelineStats,
}

/// Result of [`Pipeline::run`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub reports: Vec<SiteReport>,
    pub stats: PipelineStats,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    /// All records of the run, site by site.
    pub fn records(&self) -> impl Iterator<Item = &ProductRecord> {
        self.reports.iter().flat_map(|r| r.records.iter())
    }
}

pub struct Pipeline {
    discovery: DiscoveryManager,
    extractor: ProductExtractor,
    cache: Arc<dyn CacheStore>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        fetcher: CachedFetcher,
        discovery: DiscoveryConfig,
        extraction: ExtractionConfig,
        config: PipelineConfig,
    ) -> Self {
        let cache = fetcher.cache().clone();
        Self {
            discovery: DiscoveryManager::new(fetcher.clone(), discovery),
            extractor: ProductExtractor::new(fetcher, extraction),
            cache,
            config,
        }
    }

    /// Escalate incomplete records to `model`.
    pub fn with_language_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        let fallback = FallbackExtractor::new(model, self.extractor.config().clone());
        self.extractor = self.extractor.with_fallback(fallback);
        self
    }

    /// Replace the discovery manager (custom strategy chains).
    pub fn with_discovery(mut self, discovery: DiscoveryManager) -> Self {
        self.discovery = discovery;
        self
    }

    async fn cached_record(&self, url: &str) -> Option<ProductRecord> {
        match get_json::<ProductRecord>(self.cache.as_ref(), CacheStage::Extraction, url).await {
            Ok(record) => record,
            Err(e) => {
                warn!(url = %url, error = %e, "Record cache read failed");
                None
            }
        }
    }

    async fn store_record(&self, record: &ProductRecord) {
        let ttl = self.extractor.config().record_ttl;
        if let Err(e) = put_json(self.cache.as_ref(), CacheStage::Extraction, &record.url, record, ttl).await {
            warn!(url = %record.url, error = %e, "Record cache write failed");
        }
    }

    async fn extract_all(&self, site: &SiteRequest, candidates: &[ProductCandidate], stats: &mut PipelineStats) -> Vec<ProductRecord> {
        let mut records = Vec::with_capacity(candidates.len());
        let mut fetched_any = false;

        for candidate in candidates {
            if !site.refresh {
                if let Some(record) = self.cached_record(&candidate.url).await {
                    stats.products_extracted += 1;
                    records.push(record);
                    continue;
                }
            }

            if fetched_any {
                politeness_delay(self.config.product_delay).await;
            }
            fetched_any = true;

            let outcome = self.extractor.extract(candidate, site.platform, site.refresh).await;
            stats.products_extracted += 1;
            if outcome.enriched {
                stats.products_enriched += 1;
            }
            if outcome.page_fetched {
                self.store_record(&outcome.record).await;
            } else {
                stats.errors += 1;
            }
            records.push(outcome.record);
        }

        records
    }

    /// Discover and extract every product of one site.
    pub async fn process_site(&self, site: &SiteRequest) -> SiteReport {
        let mut stats = PipelineStats {
            sites_processed: 1,
            ..Default::default()
        };
        info!(base_url = %site.base_url, platform = %site.platform, refresh = site.refresh, "Processing site");

        let candidates = match self
            .discovery
            .discover(&site.base_url, site.platform, site.refresh)
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(base_url = %site.base_url, error = %e, "Discovery failed");
                stats.errors += 1;
                Vec::new()
            }
        };
        stats.products_discovered = candidates.len();

        let records = self.extract_all(site, &candidates, &mut stats).await;

        info!(
            base_url = %site.base_url,
            discovered = stats.products_discovered,
            extracted = stats.products_extracted,
            enriched = stats.products_enriched,
            errors = stats.errors,
            "Site complete"
        );
        SiteReport {
            base_url: site.base_url.clone(),
            records,
            stats,
        }
    }

    /// Process `sites` with bounded concurrency. Report order follows
    /// completion, not input.
    pub async fn run(&self, sites: Vec<SiteRequest>) -> RunSummary {
        let started_at = Utc::now();
        info!(sites = sites.len(), concurrency = self.config.concurrency, "Starting run");

        let reports: Vec<SiteReport> = stream::iter(sites.iter().map(|site| self.process_site(site)))
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        let mut stats = PipelineStats::default();
        for report in &reports {
            stats.absorb(&report.stats);
        }

        let finished_at = Utc::now();
        info!(
            sites = stats.sites_processed,
            products = stats.products_extracted,
            enriched = stats.products_enriched,
            errors = stats.errors,
            elapsed_ms = (finished_at - started_at).num_milliseconds(),
            "Run complete"
        );
        RunSummary {
            reports,
            stats,
            started_at,
            finished_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::testing::{MockFetcher, MockLanguageModel};
    use crate::types::{EnrichmentSource, Platform, RoastLevel};
    use std::time::Duration;

    const SITEMAP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <url><loc>https://roaster.in/products/attikan-estate</loc></url>
          <url><loc>https://roaster.in/products/ratnagiri-coffee</loc></url>
        </urlset>"#;

    const COMPLETE: &str = r#"<html><body><h1>Attikan Estate</h1>
        <div class="description">Washed arabica, medium roast.</div>
        <span class="price">₹450</span></body></html>"#;

    const SPARSE: &str = "<html><body><h1>Ratnagiri Coffee</h1><p>Ask us about this one.</p></body></html>";

    fn mock() -> Arc<MockFetcher> {
        Arc::new(
            MockFetcher::new()
                .with_xml("https://roaster.in/sitemap.xml", SITEMAP)
                .with_html("https://roaster.in/products/attikan-estate", COMPLETE)
                .with_html("https://roaster.in/products/ratnagiri-coffee", SPARSE),
        )
    }

    fn pipeline(mock: Arc<MockFetcher>) -> Pipeline {
        let fetcher = CachedFetcher::new(mock, Arc::new(MemoryCache::new()), Duration::from_secs(3600));
        Pipeline::new(
            fetcher,
            DiscoveryConfig::new().without_delays(),
            ExtractionConfig::new(),
            PipelineConfig::default().with_product_delay(Duration::ZERO),
        )
    }

    #[tokio::test]
    async fn test_process_site_end_to_end() {
        let model = Arc::new(MockLanguageModel::new().with_reply(r#"{"roast_level":"dark","bean_type":"robusta"}"#));
        let pipeline = pipeline(mock()).with_language_model(model.clone());

        let report = pipeline.process_site(&SiteRequest::new("roaster.in")).await;

        assert_eq!(report.stats.products_discovered, 2);
        assert_eq!(report.stats.products_extracted, 2);
        assert_eq!(report.stats.products_enriched, 1);
        assert_eq!(report.stats.errors, 0);
        assert_eq!(model.call_count(), 1);

        let sparse = report
            .records
            .iter()
            .find(|r| r.url.ends_with("ratnagiri-coffee"))
            .unwrap();
        assert_eq!(sparse.roast_level, RoastLevel::Dark);
        assert_eq!(sparse.enrichment_source, EnrichmentSource::Merged);
    }

    #[tokio::test]
    async fn test_second_run_served_from_cache() {
        let mock = mock();
        let pipeline = pipeline(mock.clone());
        let site = SiteRequest::new("https://roaster.in");

        pipeline.process_site(&site).await;
        mock.clear_calls();
        let report = pipeline.process_site(&site).await;

        assert_eq!(report.records.len(), 2);
        assert!(mock.calls().is_empty());

        pipeline.process_site(&site.clone().with_refresh(true)).await;
        assert_eq!(mock.fetch_count("https://roaster.in/products/attikan-estate"), 1);
    }

    #[tokio::test]
    async fn test_unfetched_page_is_not_cached() {
        let mock = Arc::new(
            MockFetcher::new()
                .with_xml("https://roaster.in/sitemap.xml", SITEMAP)
                .with_error("https://roaster.in/products/attikan-estate")
                .with_html("https://roaster.in/products/ratnagiri-coffee", SPARSE),
        );
        let pipeline = pipeline(mock.clone());
        let site = SiteRequest::new("https://roaster.in");

        let first = pipeline.process_site(&site).await;
        assert_eq!(first.stats.errors, 1);

        // Clones share the route table, so this heals the original mock.
        mock.as_ref().clone().with_html("https://roaster.in/products/attikan-estate", COMPLETE);
        mock.clear_calls();
        let second = pipeline.process_site(&site).await;

        assert_eq!(second.stats.errors, 0);
        assert_eq!(mock.fetch_count("https://roaster.in/products/attikan-estate"), 1);
        let attikan = second
            .records
            .iter()
            .find(|r| r.url.ends_with("attikan-estate"))
            .unwrap();
        assert_eq!(attikan.name.as_deref(), Some("Attikan Estate"));
        assert_eq!(attikan.prices.get(&250), Some(&450.0));
    }

    #[tokio::test]
    async fn test_run_aggregates_sites() {
        let pipeline = pipeline(mock());
        let summary = pipeline
            .run(vec![
                SiteRequest::new("https://roaster.in").with_platform(Platform::Unknown),
                SiteRequest::new("https://empty.in"),
            ])
            .await;

        assert_eq!(summary.reports.len(), 2);
        assert_eq!(summary.stats.sites_processed, 2);
        assert_eq!(summary.stats.products_discovered, 2);
        assert_eq!(summary.records().count(), 2);
        assert!(summary.finished_at >= summary.started_at);
    }

    #[test]
    fn test_stats_absorb() {
        let mut total = PipelineStats::default();
        total.absorb(&PipelineStats {
            sites_processed: 1,
            products_discovered: 4,
            products_extracted: 3,
            products_enriched: 1,
            errors: 2,
        });
        total.absorb(&PipelineStats {
            sites_processed: 1,
            ..Default::default()
        });
        assert_eq!(total.sites_processed, 2);
        assert_eq!(total.errors, 2);
    }
}
