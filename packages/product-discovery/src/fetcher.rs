//! Page fetching: the network seam and the cache-first wrapper around it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::cache::{cache_key, CacheEntry, CacheStage, CacheStore};
use crate::error::{FetchError, FetchResult};
use crate::types::FetchConfig;

/// A fetched document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl FetchedPage {
    /// A 200 `text/html` page.
    pub fn html(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self::with_type(url, "text/html; charset=utf-8", body)
    }

    /// A 200 page with an explicit content type.
    pub fn with_type(url: impl Into<String>, content_type: &str, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: 200,
            content_type: Some(content_type.to_string()),
            body: body.into(),
        }
    }

    /// An empty page with the given status.
    pub fn status(url: impl Into<String>, status: u16) -> Self {
        Self {
            url: url.into(),
            status,
            content_type: None,
            body: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn content_type_contains(&self, needle: &str) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.to_ascii_lowercase().contains(needle))
            .unwrap_or(false)
    }

    /// HTML by header, or by sniffing when no content type was sent.
    pub fn is_html(&self) -> bool {
        if self.content_type.is_none() {
            let head = self.body.trim_start().get(..64).unwrap_or(self.body.trim_start());
            let head = head.to_ascii_lowercase();
            return head.starts_with("<!doctype html") || head.starts_with("<html");
        }
        self.content_type_contains("html")
    }

    pub fn is_xml(&self) -> bool {
        self.content_type_contains("xml") || self.body.trim_start().starts_with("<?xml")
    }
}

/// Network seam: fetch one URL.
///
/// Implementations return non-2xx responses as pages (callers decide what to
/// do with them) and reserve errors for transport failures.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> FetchResult<FetchedPage>;
}

/// `reqwest`-backed fetcher with a per-request timeout and fixed user agent.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> FetchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| FetchError::Http(Box::new(e)))?;
        Ok(Self { client })
    }

    /// Use a preconfigured client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> FetchResult<FetchedPage> {
        debug!(url = %url, "HTTP fetch starting");
        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout { url: url.to_string() }
            } else {
                FetchError::Http(Box::new(e))
            }
        })?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout { url: url.to_string() }
            } else {
                FetchError::Http(Box::new(e))
            }
        })?;

        Ok(FetchedPage {
            url: final_url,
            status,
            content_type,
            body,
        })
    }
}

/// Cache-first fetch path shared by every discoverer and extractor of a run.
///
/// Successful responses are stored under `sha256("page", url)`. A hit is
/// served without touching the network unless `refresh` is set.
#[derive(Clone)]
pub struct CachedFetcher {
    fetcher: Arc<dyn PageFetcher>,
    cache: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl CachedFetcher {
    pub fn new(fetcher: Arc<dyn PageFetcher>, cache: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { fetcher, cache, ttl }
    }

    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        &self.cache
    }

    /// Fetch `url`, consulting the cache first unless `refresh` is set.
    ///
    /// Cache failures are logged and bypassed; they never fail the fetch.
    pub async fn fetch(&self, url: &Url, refresh: bool) -> FetchResult<FetchedPage> {
        let key = cache_key(CacheStage::Page, url.as_str());

        if !refresh {
            match self.cache.get(&key).await {
                Ok(Some(entry)) => match serde_json::from_str::<FetchedPage>(&entry.payload) {
                    Ok(page) => {
                        debug!(url = %url, "Page cache hit");
                        return Ok(page);
                    }
                    Err(e) => warn!(url = %url, error = %e, "Corrupt page cache entry, refetching"),
                },
                Ok(None) => {}
                Err(e) => warn!(url = %url, error = %e, "Page cache read failed"),
            }
        }

        let page = self.fetcher.fetch(url).await?;

        if page.is_success() {
            match serde_json::to_string(&page) {
                Ok(payload) => {
                    if let Err(e) = self.cache.set(CacheEntry::new(key, payload, self.ttl)).await {
                        warn!(url = %url, error = %e, "Page cache write failed");
                    }
                }
                Err(e) => warn!(url = %url, error = %e, "Page not cacheable"),
            }
        }

        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::testing::MockFetcher;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_is_html_sniffs_without_header() {
        let mut page = FetchedPage::status("https://x.in/", 200);
        page.body = "<!DOCTYPE html><html></html>".into();
        assert!(page.is_html());

        let json = FetchedPage::with_type("https://x.in/a.json", "application/json", "{}");
        assert!(!json.is_html());
    }

    #[tokio::test]
    async fn test_second_fetch_served_from_cache() {
        let mock = Arc::new(MockFetcher::new().with_html("https://x.in/shop", "<html>shop</html>"));
        let fetcher = CachedFetcher::new(mock.clone(), Arc::new(MemoryCache::new()), Duration::from_secs(60));

        let first = fetcher.fetch(&url("https://x.in/shop"), false).await.unwrap();
        let second = fetcher.fetch(&url("https://x.in/shop"), false).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(mock.fetch_count("https://x.in/shop"), 1);
    }

    #[tokio::test]
    async fn test_refresh_bypasses_cache() {
        let mock = Arc::new(MockFetcher::new().with_html("https://x.in/shop", "<html>shop</html>"));
        let fetcher = CachedFetcher::new(mock.clone(), Arc::new(MemoryCache::new()), Duration::from_secs(60));

        fetcher.fetch(&url("https://x.in/shop"), false).await.unwrap();
        fetcher.fetch(&url("https://x.in/shop"), true).await.unwrap();

        assert_eq!(mock.fetch_count("https://x.in/shop"), 2);
    }

    #[tokio::test]
    async fn test_error_pages_are_not_cached() {
        let mock = Arc::new(MockFetcher::new());
        let fetcher = CachedFetcher::new(mock.clone(), Arc::new(MemoryCache::new()), Duration::from_secs(60));

        let page = fetcher.fetch(&url("https://x.in/missing"), false).await.unwrap();
        fetcher.fetch(&url("https://x.in/missing"), false).await.unwrap();

        assert_eq!(page.status, 404);
        assert_eq!(mock.fetch_count("https://x.in/missing"), 2);
    }
}
