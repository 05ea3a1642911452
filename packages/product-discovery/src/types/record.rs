//! Extracted product records.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::attributes::{BeanType, ProcessingMethod, RoastLevel};
use super::candidate::{DiscoverySource, ProductCandidate};
use super::platform::Platform;

/// Which extractor(s) contributed a record's attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnrichmentSource {
    /// Structured extraction only
    #[default]
    Structured,
    /// Only the language-model extractor produced data (structured pass found nothing)
    LlmFallback,
    /// Structured extraction plus at least one fallback field
    Merged,
}

/// Price per pack weight: grams → price in the storefront currency.
pub type Prices = BTreeMap<u32, f64>;

/// A fully extracted product, ready for the persistence collaborator.
///
/// Enum attributes are never absent: an attribute nobody could determine is
/// `unknown`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub url: String,
    pub discovered_via: DiscoverySource,
    pub platform: Platform,

    pub name: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,

    pub roast_level: RoastLevel,
    pub bean_type: BeanType,
    pub processing_method: ProcessingMethod,
    pub region_name: Option<String>,
    pub tasting_notes: Option<String>,
    pub varietal: Option<String>,
    pub altitude_min: Option<u32>,
    pub altitude_max: Option<u32>,

    #[serde(default)]
    pub flavor_profiles: BTreeSet<String>,
    #[serde(default)]
    pub brew_methods: BTreeSet<String>,
    #[serde(default)]
    pub prices: Prices,

    pub is_seasonal: Option<bool>,
    pub is_featured: Option<bool>,
    pub is_single_origin: Option<bool>,
    pub is_available: Option<bool>,

    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub external_links: BTreeSet<String>,

    pub enrichment_source: EnrichmentSource,
}

impl ProductRecord {
    /// Start a record from a candidate, carrying over what discovery already knew.
    pub fn from_candidate(candidate: &ProductCandidate, platform: Platform) -> Self {
        Self {
            url: candidate.url.clone(),
            discovered_via: candidate.discovered_via,
            platform,
            name: candidate.name.clone(),
            description: candidate.description.clone(),
            image_url: candidate.image_url.clone(),
            roast_level: RoastLevel::Unknown,
            bean_type: BeanType::Unknown,
            processing_method: ProcessingMethod::Unknown,
            region_name: None,
            tasting_notes: None,
            varietal: None,
            altitude_min: None,
            altitude_max: None,
            flavor_profiles: BTreeSet::new(),
            brew_methods: BTreeSet::new(),
            prices: Prices::new(),
            is_seasonal: None,
            is_featured: None,
            is_single_origin: None,
            is_available: None,
            tags: BTreeSet::new(),
            external_links: BTreeSet::new(),
            enrichment_source: EnrichmentSource::Structured,
        }
    }

    /// Number of critical fields (roast, bean, process, price) still missing.
    pub fn missing_critical_fields(&self) -> usize {
        [
            self.roast_level.is_unknown(),
            self.bean_type.is_unknown(),
            self.processing_method.is_unknown(),
            self.prices.is_empty(),
        ]
        .iter()
        .filter(|missing| **missing)
        .count()
    }

    /// Number of critical fields present.
    pub fn completeness(&self) -> usize {
        4 - self.missing_critical_fields()
    }
}
