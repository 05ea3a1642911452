//! URL path classification and the coffee-product filter.
//!
//! Path classification is a fixed, ordered rule table: the first rule whose
//! matcher fires decides the verdict, and a path no rule claims is rejected.
//! The same input path always yields the same verdict.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use url::Url;

/// Verdict for a candidate link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PathClass {
    /// Path carries a product-detail marker
    Accept,
    /// Ambiguous slug that is probably a product
    WeakAccept,
    /// Listing, navigation or content page
    Reject,
}

impl PathClass {
    /// Whether the verdict admits the link as a candidate.
    pub fn is_candidate(self) -> bool {
        matches!(self, PathClass::Accept | PathClass::WeakAccept)
    }
}

/// Lowercased, non-empty path segments.
struct PathFacts {
    segments: Vec<String>,
}

impl PathFacts {
    fn new(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        Self {
            segments: path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(|s| s.to_ascii_lowercase())
                .collect(),
        }
    }

    fn has_any(&self, words: &[&str]) -> bool {
        self.segments.iter().any(|s| words.contains(&s.as_str()))
    }

    fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }
}

struct PathRule {
    name: &'static str,
    verdict: PathClass,
    matches: fn(&PathFacts) -> bool,
}

const PRODUCT_MARKERS: &[&str] = &["product", "products", "item", "items", "p"];

const LISTING_SEGMENTS: &[&str] = &[
    "collections",
    "collection",
    "category",
    "categories",
    "product-category",
    "catalog",
    "catalogue",
];

/// Segments that name a listing rather than a product when they end a path.
const LISTING_KEYWORDS: &[&str] = &[
    "all", "shop", "store", "products", "product", "collections", "collection", "catalog",
    "category", "categories", "coffee", "coffees", "beans", "bean", "search", "page", "sale",
    "new", "featured", "frontpage", "home", "index", "merch", "equipment", "gear",
];

const BLOG_SEGMENTS: &[&str] = &[
    "blog", "blogs", "news", "post", "posts", "article", "articles", "author", "journal",
];

const UTILITY_SEGMENTS: &[&str] = &[
    "about", "about-us", "contact", "contact-us", "faq", "faqs", "cart", "checkout", "account",
    "login", "register", "wishlist", "pages", "policies", "policy", "privacy", "terms",
    "shipping", "returns", "refund", "cdn", "wp-admin", "wp-content", "wp-json", "wp-login.php",
];

const ASSET_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".webp", ".svg", ".pdf", ".xml", ".css", ".js",
];

fn is_numeric(segment: &str) -> bool {
    !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit())
}

fn is_slug(segment: &str) -> bool {
    !is_numeric(segment)
        && !LISTING_KEYWORDS.contains(&segment)
        && segment.chars().any(|c| c.is_ascii_alphabetic())
}

fn is_pagination(f: &PathFacts) -> bool {
    f.has_any(&["page"])
}

fn is_search(f: &PathFacts) -> bool {
    f.has_any(&["search"])
}

fn is_tag(f: &PathFacts) -> bool {
    f.has_any(&["tag", "tags", "tagged"])
}

fn is_blog(f: &PathFacts) -> bool {
    f.has_any(BLOG_SEGMENTS)
}

fn is_utility(f: &PathFacts) -> bool {
    f.has_any(UTILITY_SEGMENTS)
}

fn is_asset(f: &PathFacts) -> bool {
    f.last()
        .map(|last| ASSET_EXTENSIONS.iter().any(|ext| last.ends_with(ext)))
        .unwrap_or(false)
}

fn has_product_marker(f: &PathFacts) -> bool {
    f.segments
        .windows(2)
        .any(|w| PRODUCT_MARKERS.contains(&w[0].as_str()) && is_slug(&w[1]))
}

fn is_category_listing(f: &PathFacts) -> bool {
    f.has_any(LISTING_SEGMENTS)
}

fn is_ambiguous_slug(f: &PathFacts) -> bool {
    f.segments.len() >= 2 && f.last().map(is_slug).unwrap_or(false)
}

const RULES: &[PathRule] = &[
    PathRule { name: "pagination", verdict: PathClass::Reject, matches: is_pagination },
    PathRule { name: "search", verdict: PathClass::Reject, matches: is_search },
    PathRule { name: "tag", verdict: PathClass::Reject, matches: is_tag },
    PathRule { name: "blog", verdict: PathClass::Reject, matches: is_blog },
    PathRule { name: "utility", verdict: PathClass::Reject, matches: is_utility },
    PathRule { name: "asset", verdict: PathClass::Reject, matches: is_asset },
    PathRule { name: "product-marker", verdict: PathClass::Accept, matches: has_product_marker },
    PathRule { name: "category-listing", verdict: PathClass::Reject, matches: is_category_listing },
    PathRule { name: "ambiguous-slug", verdict: PathClass::WeakAccept, matches: is_ambiguous_slug },
];

/// Classify a URL path, returning the verdict and the name of the deciding rule.
pub fn explain_path(path: &str) -> (PathClass, &'static str) {
    let facts = PathFacts::new(path);
    RULES
        .iter()
        .find(|rule| (rule.matches)(&facts))
        .map(|rule| (rule.verdict, rule.name))
        .unwrap_or((PathClass::Reject, "no-match"))
}

/// Classify a URL path.
pub fn classify_path(path: &str) -> PathClass {
    explain_path(path).0
}

/// Classify a full URL; `product_id=` style query markers count as a product marker.
pub fn classify_url(url: &Url) -> PathClass {
    let query = url.query().unwrap_or_default().to_ascii_lowercase();
    if query.contains("product_id=") || query.contains("productid=") {
        return PathClass::Accept;
    }
    classify_path(url.path())
}

// =============================================================================
// Coffee product filter
// =============================================================================

const NON_PRODUCT_KEYWORDS: &[&str] = &[
    "mug", "cup", "filter paper", "brewer", "grinder", "equipment", "machine", "maker", "merch",
    "merchandise", "t-shirt", "subscription", "apparel", "accessories", "gift card", "e-gift",
    "voucher", "course", "workshop", "event", "membership", "tumbler", "french press",
    "aeropress", "kalita", "hario", "v60", "chemex", "scale", "kettle", "frother", "capsule",
    "pod", "kit",
];

const NON_PRODUCT_URL_PATTERNS: &[&str] = &[
    "/gift-card", "/gift-cards", "/learn", "/guide", "/recipes", "/events", "/workshops",
    "/wholesale", "/subscriptions",
];

static NON_PRODUCT_RE: LazyLock<Regex> = LazyLock::new(|| {
    let alternation = NON_PRODUCT_KEYWORDS
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{})s?\b", alternation)).unwrap()
});

/// Whether a discovered item looks like roasted coffee rather than gear or merch.
///
/// Errs on the side of inclusion: only a non-product keyword in the name or a
/// known non-product URL pattern excludes an item.
pub fn is_likely_coffee_product(name: Option<&str>, url: &str) -> bool {
    if let Some(name) = name {
        if NON_PRODUCT_RE.is_match(name) {
            return false;
        }
    }
    let url = url.to_ascii_lowercase();
    !NON_PRODUCT_URL_PATTERNS.iter().any(|p| url.contains(p))
}
