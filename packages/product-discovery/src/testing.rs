//! Testing utilities including mock implementations.
//!
//! These are useful for exercising discovery and extraction without making
//! real network or language-model calls.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use url::Url;

use crate::error::{ExtractionError, ExtractionResult, FetchError, FetchResult};
use crate::fetcher::{FetchedPage, PageFetcher};
use crate::llm::LanguageModel;

fn route_key(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

#[derive(Debug, Clone)]
enum MockResponse {
    Page(FetchedPage),
    Error,
}

/// A mock fetcher serving canned pages.
///
/// Unknown URLs answer 404. Every call is recorded, so tests can assert how
/// many network fetches a URL received.
#[derive(Default, Clone)]
pub struct MockFetcher {
    routes: Arc<RwLock<HashMap<String, MockResponse>>>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve an arbitrary page at `url`.
    pub fn with_page(self, url: &str, page: FetchedPage) -> Self {
        self.routes
            .write()
            .unwrap()
            .insert(route_key(url), MockResponse::Page(page));
        self
    }

    /// Serve a 200 HTML page at `url`.
    pub fn with_html(self, url: &str, body: impl Into<String>) -> Self {
        let page = FetchedPage::html(url, body);
        self.with_page(url, page)
    }

    /// Serve a 200 XML document at `url`.
    pub fn with_xml(self, url: &str, body: impl Into<String>) -> Self {
        let page = FetchedPage::with_type(url, "application/xml", body);
        self.with_page(url, page)
    }

    /// Serve a 200 JSON document at `url`.
    pub fn with_json(self, url: &str, body: impl Into<String>) -> Self {
        let page = FetchedPage::with_type(url, "application/json", body);
        self.with_page(url, page)
    }

    /// Fail fetches of `url` with a transport error.
    pub fn with_error(self, url: &str) -> Self {
        self.routes
            .write()
            .unwrap()
            .insert(route_key(url), MockResponse::Error);
        self
    }

    /// Every URL fetched, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }

    /// How many times `url` was fetched.
    pub fn fetch_count(&self, url: &str) -> usize {
        let key = route_key(url);
        self.calls.read().unwrap().iter().filter(|c| **c == key).count()
    }

    /// Number of distinct URLs fetched.
    pub fn distinct_fetches(&self) -> usize {
        let calls = self.calls.read().unwrap();
        let mut seen: Vec<&String> = calls.iter().collect();
        seen.sort();
        seen.dedup();
        seen.len()
    }

    pub fn clear_calls(&self) {
        self.calls.write().unwrap().clear();
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(&self, url: &Url) -> FetchResult<FetchedPage> {
        let key = route_key(url.as_str());
        self.calls.write().unwrap().push(key.clone());

        match self.routes.read().unwrap().get(&key).cloned() {
            Some(MockResponse::Page(page)) => Ok(page),
            Some(MockResponse::Error) => Err(FetchError::Http(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                format!("mock connection reset: {}", key),
            )))),
            None => Ok(FetchedPage::status(url.as_str(), 404)),
        }
    }
}

/// Record of a call made to the mock language model.
#[derive(Debug, Clone)]
pub struct MockModelCall {
    pub system: String,
    pub user: String,
}

/// A mock language model with scripted replies.
///
/// Replies are consumed in order; once exhausted the last reply repeats. A
/// model with no replies fails every call.
#[derive(Default, Clone)]
pub struct MockLanguageModel {
    replies: Arc<RwLock<VecDeque<String>>>,
    calls: Arc<RwLock<Vec<MockModelCall>>>,
}

impl MockLanguageModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply.
    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        self.replies.write().unwrap().push_back(reply.into());
        self
    }

    /// Get all calls made to this mock.
    pub fn calls(&self) -> Vec<MockModelCall> {
        self.calls.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn complete(&self, system: &str, user: &str) -> ExtractionResult<String> {
        self.calls.write().unwrap().push(MockModelCall {
            system: system.to_string(),
            user: user.to_string(),
        });

        let mut replies = self.replies.write().unwrap();
        let reply = if replies.len() > 1 {
            replies.pop_front()
        } else {
            replies.front().cloned()
        };

        reply.ok_or_else(|| {
            ExtractionError::Model(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "mock model unavailable",
            )))
        })
    }
}
