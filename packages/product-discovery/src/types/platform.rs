//! Storefront platform hint.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Storefront platform family, as reported by the roaster-metadata collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Shopify,
    #[serde(rename = "woocommerce")]
    WooCommerce,
    Magento,
    #[serde(rename = "bigcommerce")]
    BigCommerce,
    #[serde(rename = "wordpress")]
    WordPress,
    Squarespace,
    Wix,
    Webflow,
    Static,
    Custom,
    #[default]
    Unknown,
}

impl Platform {
    /// Parse a hint case-insensitively; anything unrecognized is `Unknown`.
    pub fn from_hint(hint: &str) -> Self {
        match hint.trim().to_ascii_lowercase().as_str() {
            "shopify" => Platform::Shopify,
            "woocommerce" | "woo" => Platform::WooCommerce,
            "magento" => Platform::Magento,
            "bigcommerce" => Platform::BigCommerce,
            "wordpress" => Platform::WordPress,
            "squarespace" => Platform::Squarespace,
            "wix" => Platform::Wix,
            "webflow" => Platform::Webflow,
            "static" => Platform::Static,
            "custom" => Platform::Custom,
            _ => Platform::Unknown,
        }
    }

    /// Platforms with a known JSON product listing endpoint.
    pub fn has_listing_endpoint(self) -> bool {
        matches!(self, Platform::Shopify | Platform::WooCommerce)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Shopify => "shopify",
            Platform::WooCommerce => "woocommerce",
            Platform::Magento => "magento",
            Platform::BigCommerce => "bigcommerce",
            Platform::WordPress => "wordpress",
            Platform::Squarespace => "squarespace",
            Platform::Wix => "wix",
            Platform::Webflow => "webflow",
            Platform::Static => "static",
            Platform::Custom => "custom",
            Platform::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_hint() {
        assert_eq!(Platform::from_hint("Shopify"), Platform::Shopify);
        assert_eq!(Platform::from_hint(" WooCommerce "), Platform::WooCommerce);
        assert_eq!(Platform::from_hint("tilda"), Platform::Unknown);
    }

    #[test]
    fn test_serde_matches_hint_names() {
        for platform in [Platform::Shopify, Platform::WooCommerce, Platform::BigCommerce, Platform::Unknown] {
            let json = serde_json::to_string(&platform).unwrap();
            assert_eq!(json, format!("\"{}\"", platform.as_str()));
        }
    }
}
