//! Discovered product candidates.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::urls::normalize_url;

/// Discovery strategy that produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiscoverySource {
    Endpoint,
    Sitemap,
    StructuredData,
    Html,
}

impl DiscoverySource {
    /// Strategies whose output is trusted enough to justify stopping early.
    pub fn is_high_confidence(self) -> bool {
        !matches!(self, DiscoverySource::Html)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DiscoverySource::Endpoint => "endpoint",
            DiscoverySource::Sitemap => "sitemap",
            DiscoverySource::StructuredData => "structured-data",
            DiscoverySource::Html => "html",
        }
    }
}

impl fmt::Display for DiscoverySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A product URL found during discovery, before attribute extraction.
///
/// Identity is the normalized URL (no query, fragment or trailing slash).
/// Candidates are only built by discoverers; the manager may fill a missing
/// name, description or image from a later strategy but never changes the URL
/// or provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductCandidate {
    /// Absolute, host-qualified, normalized URL
    pub url: String,

    /// Provisional display name
    pub name: Option<String>,

    /// Strategy that first produced this URL
    pub discovered_via: DiscoverySource,

    /// Description known at discovery time (endpoint listings, JSON-LD)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Image known at discovery time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl ProductCandidate {
    /// Build a candidate, normalizing the URL. Returns `None` for unparseable URLs.
    pub fn new(url: &str, discovered_via: DiscoverySource) -> Option<Self> {
        Some(Self {
            url: normalize_url(url)?,
            name: None,
            discovered_via,
            description: None,
            image_url: None,
        })
    }

    /// Set the provisional name; blank names are ignored.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        let name = name.trim();
        if !name.is_empty() {
            self.name = Some(name.to_string());
        }
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        if !description.trim().is_empty() {
            self.description = Some(description);
        }
        self
    }

    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        let image_url = image_url.into();
        if !image_url.trim().is_empty() {
            self.image_url = Some(image_url);
        }
        self
    }

    /// Fill optional fields this candidate lacks from another sighting of the same URL.
    pub(crate) fn fill_missing_from(&mut self, other: &ProductCandidate) {
        if self.name.is_none() {
            self.name = other.name.clone();
        }
        if self.description.is_none() {
            self.description = other.description.clone();
        }
        if self.image_url.is_none() {
            self.image_url = other.image_url.clone();
        }
    }
}
