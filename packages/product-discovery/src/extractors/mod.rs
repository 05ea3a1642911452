//! Product attribute extraction.
//!
//! A page goes through the declarative [`StructuredExtractor`] first. When it
//! leaves too many critical fields unknown, the [`FallbackExtractor`] asks a
//! language model and [`merge_fallback`] fills only what is still missing.

pub mod fallback;
pub mod merge;
pub mod price;
pub mod structured;

pub use fallback::{FallbackAttributes, FallbackExtractor};
pub use merge::merge_fallback;
pub use structured::{StructuredExtraction, StructuredExtractor};

use tracing::{debug, info, warn};
use url::Url;

use crate::fetcher::CachedFetcher;
use crate::types::{EnrichmentSource, ExtractionConfig, Platform, ProductCandidate, ProductRecord};

/// Whether a record needs the language-model fallback.
///
/// Two or more missing critical fields always escalate. A missing price on its
/// own escalates only when `fallback_on_missing_price` is set.
pub fn needs_fallback(record: &ProductRecord, config: &ExtractionConfig) -> bool {
    record.missing_critical_fields() >= 2 || (config.fallback_on_missing_price && record.prices.is_empty())
}

/// Result of extracting one candidate.
#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    pub record: ProductRecord,

    /// The product page was fetched and parsed
    pub page_fetched: bool,

    /// At least one fallback field was applied
    pub enriched: bool,
}

/// Structured extraction with language-model escalation.
#[derive(Clone)]
pub struct ProductExtractor {
    fetcher: CachedFetcher,
    structured: StructuredExtractor,
    fallback: Option<FallbackExtractor>,
    config: ExtractionConfig,
}

impl ProductExtractor {
    pub fn new(fetcher: CachedFetcher, config: ExtractionConfig) -> Self {
        Self {
            fetcher,
            structured: StructuredExtractor::new(),
            fallback: None,
            config,
        }
    }

    /// Enable escalation to a language model.
    pub fn with_fallback(mut self, fallback: FallbackExtractor) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    async fn fetch_page(&self, url: &str, refresh: bool) -> Option<(Url, String)> {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(url = %url, error = %e, "Unparseable product URL");
                return None;
            }
        };
        match self.fetcher.fetch(&parsed, refresh).await {
            Ok(page) if page.is_success() && page.is_html() => Some((parsed, page.body)),
            Ok(page) => {
                warn!(url = %url, status = page.status, "Product page not usable");
                None
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Product page fetch failed");
                None
            }
        }
    }

    /// Extract one candidate into a record.
    ///
    /// Never fails: an unreachable page yields a record carrying only what
    /// discovery knew, possibly enriched from the known description.
    pub async fn extract(&self, candidate: &ProductCandidate, platform: Platform, refresh: bool) -> ExtractionOutcome {
        let mut record = ProductRecord::from_candidate(candidate, platform);
        let page = self.fetch_page(&candidate.url, refresh).await;
        let page_fetched = page.is_some();

        if let Some((url, html)) = &page {
            let extraction = self.structured.extract(html, url, record);
            record = extraction.record;
        }

        let mut enriched = false;
        if needs_fallback(&record, &self.config) {
            match &self.fallback {
                Some(fallback) => {
                    let html = page.as_ref().map(|(_, html)| html.as_str());
                    if let Some(attrs) = fallback.extract(&record, html).await {
                        enriched = merge_fallback(&mut record, &attrs);
                        if enriched && !page_fetched {
                            record.enrichment_source = EnrichmentSource::LlmFallback;
                        }
                    }
                }
                None => debug!(
                    url = %record.url,
                    missing = record.missing_critical_fields(),
                    "Fallback needed but no language model configured"
                ),
            }
        }

        info!(
            url = %record.url,
            completeness = record.completeness(),
            source = ?record.enrichment_source,
            "Product extracted"
        );
        ExtractionOutcome {
            record,
            page_fetched,
            enriched,
        }
    }
}
