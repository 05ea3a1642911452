//! Declarative structured extraction.
//!
//! Each platform profile is an ordered list of field rules. A rule names a
//! field, a selector chain and how to read the match; the first rule that
//! yields a value for a field wins. Embedded JSON (JSON-LD offers, Shopify
//! variant data, Open Graph price tags) and attribute tables fill what the
//! selectors miss, then the raw strings are normalized into record fields.

use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;
use tracing::debug;
use url::Url;

use super::price::{parse_price, parse_price_entry, parse_weight_grams, DEFAULT_WEIGHT_GRAMS};
use crate::discoverers::structured_data::image_field;
use crate::dom;
use crate::types::{BeanType, Platform, ProcessingMethod, ProductRecord, RoastLevel};
use crate::urls::resolve_href;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Field {
    Name,
    Description,
    Image,
    PriceText,
    StockStatus,
    Roast,
    Process,
    Origin,
    Specifications,
}

#[derive(Debug, Clone, Copy)]
enum Read {
    /// Whitespace-collapsed text content
    Text,
    /// First non-empty attribute among the list
    Attr(&'static [&'static str]),
}

struct FieldRule {
    field: Field,
    selectors: &'static [&'static str],
    read: Read,
}

const IMAGE_ATTRS: &[&str] = &["src", "data-src", "content"];

const SHOPIFY_RULES: &[FieldRule] = &[
    FieldRule {
        field: Field::Name,
        selectors: &["h1.product-title", ".product__title h1", ".product-single__title", ".product__title", "h1"],
        read: Read::Text,
    },
    FieldRule {
        field: Field::Description,
        selectors: &[".product-description", ".product__description", ".product-single__description", ".rte"],
        read: Read::Text,
    },
    FieldRule {
        field: Field::Image,
        selectors: &[".product__media img", ".product-featured-img", ".product-single__photo img"],
        read: Read::Attr(IMAGE_ATTRS),
    },
    FieldRule {
        field: Field::PriceText,
        selectors: &[".price .money", ".product__price .money", ".price-item--regular", "span.price", ".product__price"],
        read: Read::Text,
    },
    FieldRule {
        field: Field::StockStatus,
        selectors: &[".product-form__inventory", ".product-inventory", "[data-store-availability-container]", ".product-form__submit"],
        read: Read::Text,
    },
    FieldRule {
        field: Field::Roast,
        selectors: &[".product-roast", ".roast-level", "[data-option='roast']"],
        read: Read::Text,
    },
    FieldRule {
        field: Field::Process,
        selectors: &[".product-process", ".processing-method", "[data-option='process']"],
        read: Read::Text,
    },
    FieldRule {
        field: Field::Origin,
        selectors: &[".product-origin", ".product-single__meta-origin", "[data-option='origin']"],
        read: Read::Text,
    },
    FieldRule {
        field: Field::Specifications,
        selectors: &["#product-specifications", ".product-specifications", ".product-description table", ".product__description table"],
        read: Read::Text,
    },
];

const WOOCOMMERCE_RULES: &[FieldRule] = &[
    FieldRule {
        field: Field::Name,
        selectors: &[".product_title", ".entry-title", "h1"],
        read: Read::Text,
    },
    FieldRule {
        field: Field::Description,
        selectors: &["#tab-description", ".woocommerce-product-details__short-description", ".product-description"],
        read: Read::Text,
    },
    FieldRule {
        field: Field::Image,
        selectors: &[".woocommerce-product-gallery__image img", ".wp-post-image"],
        read: Read::Attr(IMAGE_ATTRS),
    },
    FieldRule {
        field: Field::PriceText,
        selectors: &[".summary .price", "p.price", ".woocommerce-Price-amount"],
        read: Read::Text,
    },
    FieldRule {
        field: Field::StockStatus,
        selectors: &[".stock", ".availability"],
        read: Read::Text,
    },
    FieldRule {
        field: Field::Roast,
        selectors: &[".woocommerce-product-attributes-item--attribute_roast-level .woocommerce-product-attributes-item__value", ".woocommerce-product-attributes-item--attribute_pa_roast-level .woocommerce-product-attributes-item__value"],
        read: Read::Text,
    },
    FieldRule {
        field: Field::Process,
        selectors: &[".woocommerce-product-attributes-item--attribute_processing-method .woocommerce-product-attributes-item__value", ".woocommerce-product-attributes-item--attribute_pa_process .woocommerce-product-attributes-item__value"],
        read: Read::Text,
    },
    FieldRule {
        field: Field::Origin,
        selectors: &[".woocommerce-product-attributes-item--attribute_origin .woocommerce-product-attributes-item__value", ".woocommerce-product-attributes-item--attribute_pa_origin .woocommerce-product-attributes-item__value"],
        read: Read::Text,
    },
    FieldRule {
        field: Field::Specifications,
        selectors: &[".woocommerce-product-attributes", ".shop_attributes", ".woocommerce-Tabs-panel"],
        read: Read::Text,
    },
];

const GENERIC_RULES: &[FieldRule] = &[
    FieldRule {
        field: Field::Name,
        selectors: &[".product-title", ".product-name", ".product_title", ".entry-title", "h1"],
        read: Read::Text,
    },
    FieldRule {
        field: Field::Description,
        selectors: &[".product-description", ".description", ".product-details", ".product-info", "article"],
        read: Read::Text,
    },
    FieldRule {
        field: Field::Image,
        selectors: &[".product-image img", ".product-gallery img", ".product_image img", ".woocommerce-product-gallery__image img"],
        read: Read::Attr(IMAGE_ATTRS),
    },
    FieldRule {
        field: Field::PriceText,
        selectors: &[".price", ".product-price", "span.amount", ".price-container"],
        read: Read::Text,
    },
    FieldRule {
        field: Field::StockStatus,
        selectors: &[".stock-status", ".availability", ".product-availability", ".in-stock", ".out-of-stock"],
        read: Read::Text,
    },
    FieldRule {
        field: Field::Roast,
        selectors: &[".roast-level", ".product-roast", "[data-option='roast']"],
        read: Read::Text,
    },
    FieldRule {
        field: Field::Process,
        selectors: &[".processing-method", ".product-process", "[data-option='process']"],
        read: Read::Text,
    },
    FieldRule {
        field: Field::Origin,
        selectors: &[".origin", ".product-origin"],
        read: Read::Text,
    },
    FieldRule {
        field: Field::Specifications,
        selectors: &[".product-specs", ".specifications", ".product-attributes", ".product-details table", ".details"],
        read: Read::Text,
    },
];

struct CompiledRule {
    field: Field,
    selectors: Vec<Selector>,
    read: Read,
}

fn compile_profile(rules: &[FieldRule]) -> Vec<CompiledRule> {
    rules
        .iter()
        .map(|rule| CompiledRule {
            field: rule.field,
            selectors: dom::compile(rule.selectors),
            read: rule.read,
        })
        .collect()
}

static SHOPIFY_PROFILE: LazyLock<Vec<CompiledRule>> = LazyLock::new(|| compile_profile(SHOPIFY_RULES));
static WOOCOMMERCE_PROFILE: LazyLock<Vec<CompiledRule>> = LazyLock::new(|| compile_profile(WOOCOMMERCE_RULES));
static GENERIC_PROFILE: LazyLock<Vec<CompiledRule>> = LazyLock::new(|| compile_profile(GENERIC_RULES));

/// Selector profile name used for a platform.
pub fn profile_name(platform: Platform) -> &'static str {
    match platform {
        Platform::Shopify => "shopify",
        Platform::WooCommerce => "woocommerce",
        _ => "generic",
    }
}

fn profile(platform: Platform) -> &'static [CompiledRule] {
    match platform {
        Platform::Shopify => &SHOPIFY_PROFILE,
        Platform::WooCommerce => &WOOCOMMERCE_PROFILE,
        _ => &GENERIC_PROFILE,
    }
}

struct PageSelectors {
    json_ld: Selector,
    json_scripts: Selector,
    meta_price: Vec<Selector>,
    meta_image: Vec<Selector>,
    tags: Vec<Selector>,
    rows: Selector,
    cells: Selector,
    lines: Selector,
    anchors: Selector,
}

static PAGE: LazyLock<PageSelectors> = LazyLock::new(|| PageSelectors {
    json_ld: Selector::parse(r#"script[type="application/ld+json"]"#).unwrap(),
    json_scripts: Selector::parse(r#"script[type="application/json"]"#).unwrap(),
    meta_price: dom::compile(&["meta[property='og:price:amount']", "meta[property='product:price:amount']"]),
    meta_image: dom::compile(&["meta[property='og:image']"]),
    tags: dom::compile(&[".product-tags a", ".product__tags a", ".tagged_as a", "a[rel='tag']", ".tags a"]),
    rows: Selector::parse("tr").unwrap(),
    cells: Selector::parse("th, td").unwrap(),
    lines: Selector::parse("li, p, dt, span").unwrap(),
    anchors: Selector::parse("a[href]").unwrap(),
});

/// Utility tags that carry no product information.
const NEGATIVE_TAGS: &[&str] = &[
    "btpicks", "coffeeonly", "coffee packets", "rec_aer", "rec_bla", "rec_col", "rec_com_bl",
    "rec_fre", "rec_hot", "rec_pou", "coffee", "organic", "kerala", "moderate acidity",
    "low bitterness", "tasting notes", "india", "pack", "packet", "blend", "single origin",
    "estate", "beans", "arabica", "robusta",
];

/// Flavor words and the profile they map to.
const FLAVOR_TERMS: &[(&str, &str)] = &[
    ("chocolate", "chocolate"),
    ("cocoa", "chocolate"),
    ("nutty", "nutty"),
    ("nuts", "nutty"),
    ("caramel", "caramel"),
    ("fruity", "fruity"),
    ("citrus", "citrus"),
    ("berry", "berry"),
    ("floral", "floral"),
    ("spice", "spice"),
    ("spicy", "spice"),
    ("earthy", "earthy"),
    ("woody", "woody"),
    ("honey", "honey"),
    ("sweet", "sweet"),
    ("vanilla", "vanilla"),
    ("tropical", "tropical"),
    ("smoky", "smoky"),
    ("tobacco", "tobacco"),
];

const BREW_TERMS: &[(&str, &str)] = &[
    ("espresso", "espresso"),
    ("pour over", "pour-over"),
    ("pour-over", "pour-over"),
    ("v60", "pour-over"),
    ("french press", "french-press"),
    ("french-press", "french-press"),
    ("aeropress", "aeropress"),
    ("moka", "moka-pot"),
    ("cold brew", "cold-brew"),
    ("cold-brew", "cold-brew"),
    ("south indian filter", "south-indian-filter"),
    ("filter coffee", "filter"),
    ("drip", "filter"),
];

/// Hosts whose links are recorded as external purchase options.
const MARKETPLACE_HOSTS: &[&str] = &[
    "amazon.in",
    "amazon.com",
    "flipkart.com",
    "bigbasket.com",
    "jiomart.com",
    "swiggy.com",
    "blinkit.com",
];

static REGION_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b(?:origin|region)\s*:\s*([^,.;|\n]+)",
        r"(?i)\bgrown in\s+([^,.;|\n]+)",
        r"(?i)\bsourced from\s+([^,.;|\n]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static TASTING_NOTES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:tasting notes|flavou?r notes|flavou?r profiles?|notes)\s*:?\s*([^.|\n]{3,160})").unwrap()
});

/// Output of the structured pass.
#[derive(Debug, Clone)]
pub struct StructuredExtraction {
    pub record: ProductRecord,

    /// Critical fields present (0 to 4)
    pub completeness: usize,
}

/// Product details found in JSON-LD.
#[derive(Debug, Default)]
struct JsonLdDetails {
    name: Option<String>,
    description: Option<String>,
    image: Option<String>,
    prices: Vec<(u32, f64)>,
    in_stock: Option<bool>,
}

/// Everything read from one page before normalization.
#[derive(Debug, Default)]
struct PageFacts {
    fields: HashMap<Field, String>,
    labelled: Vec<(String, String)>,
    json_ld: JsonLdDetails,
    variant_prices: Vec<(u32, f64)>,
    json_tags: Vec<String>,
    meta_price: Option<String>,
    meta_image: Option<String>,
    tags: Vec<String>,
    links: Vec<String>,
}

impl PageFacts {
    fn field(&self, field: Field) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    /// Value of the first attribute-table row whose label mentions any key.
    fn labelled(&self, keys: &[&str]) -> Option<&str> {
        self.labelled
            .iter()
            .find(|(label, _)| keys.iter().any(|k| label.contains(k)))
            .map(|(_, value)| value.as_str())
    }
}

fn json_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.replace(',', "").trim().parse().ok(),
        _ => None,
    }
}

fn find_json_ld_product(value: &Value) -> Option<&serde_json::Map<String, Value>> {
    match value {
        Value::Array(items) => items.iter().find_map(find_json_ld_product),
        Value::Object(map) => {
            let is_product = match map.get("@type") {
                Some(Value::String(t)) => t.eq_ignore_ascii_case("product"),
                Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some("Product")),
                _ => false,
            };
            if is_product {
                return Some(map);
            }
            map.get("@graph").and_then(find_json_ld_product)
        }
        _ => None,
    }
}

fn read_json_ld(value: &Value, details: &mut JsonLdDetails) {
    let Some(product) = find_json_ld_product(value) else {
        return;
    };
    let text = |key: &str| product.get(key).and_then(Value::as_str).map(str::to_string);
    details.name = details.name.take().or_else(|| text("name"));
    details.description = details.description.take().or_else(|| text("description"));
    details.image = details.image.take().or_else(|| image_field(product.get("image")));

    let product_weight = text("name").as_deref().and_then(parse_weight_grams);
    let offers: Vec<&Value> = match product.get("offers") {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(offer @ Value::Object(_)) => vec![offer],
        _ => Vec::new(),
    };
    for offer in offers {
        let price = offer
            .get("price")
            .or_else(|| offer.get("lowPrice"))
            .and_then(json_number)
            .filter(|p| *p > 0.0);
        let weight = ["name", "sku", "description"]
            .iter()
            .filter_map(|k| offer.get(*k).and_then(Value::as_str))
            .find_map(parse_weight_grams)
            .or(product_weight)
            .unwrap_or(DEFAULT_WEIGHT_GRAMS);
        if let Some(price) = price {
            details.prices.push((weight, price));
        }
        if let Some(availability) = offer.get("availability").and_then(Value::as_str) {
            let availability = availability.to_ascii_lowercase();
            let in_stock = availability.contains("instock") || availability.contains("limitedavailability");
            details.in_stock = Some(details.in_stock.unwrap_or(false) || in_stock);
        }
    }
}

/// Variant prices from Shopify product JSON.
///
/// Theme JSON (`product | json`) reports integer cents; the storefront API
/// reports decimal strings.
/// Shopify theme product JSON carries integer cents, including its
/// `price_min`/`price_max` summary and variant `compare_at_price`. Other
/// inline blobs with integer prices are taken at face value.
fn prices_in_cents(product: &Value, variants: &[Value]) -> bool {
    ["price_min", "price_max", "compare_at_price_min", "compare_at_price_max"]
        .iter()
        .any(|k| product.get(*k).is_some_and(Value::is_u64))
        || variants
            .iter()
            .any(|v| v.get("compare_at_price").is_some_and(Value::is_u64))
}

fn read_shopify_json(value: &Value, prices: &mut Vec<(u32, f64)>, tags: &mut Vec<String>) {
    let product = value.get("product").unwrap_or(value);
    let Some(variants) = product.get("variants").and_then(Value::as_array) else {
        return;
    };
    let cents = prices_in_cents(product, variants);

    let mut weighed = Vec::new();
    let mut first_price = None;
    for variant in variants {
        let price = match variant.get("price") {
            Some(Value::Number(n)) if cents && n.is_u64() => n.as_f64().map(|c| c / 100.0),
            Some(other) => json_number(other),
            None => None,
        };
        let Some(price) = price.filter(|p| *p > 0.0) else {
            continue;
        };
        first_price.get_or_insert(price);
        let weight = ["title", "public_title", "option1", "option2"]
            .iter()
            .filter_map(|k| variant.get(*k).and_then(Value::as_str))
            .find_map(parse_weight_grams);
        if let Some(weight) = weight {
            weighed.push((weight, price));
        }
    }

    if weighed.is_empty() {
        if let Some(price) = first_price {
            weighed.push((DEFAULT_WEIGHT_GRAMS, price));
        }
    }
    prices.extend(weighed);

    match product.get("tags") {
        Some(Value::Array(items)) => tags.extend(items.iter().filter_map(Value::as_str).map(str::to_string)),
        Some(Value::String(s)) => tags.extend(s.split(',').map(str::to_string)),
        _ => {}
    }
}

fn collect_facts(html: &str, platform: Platform) -> PageFacts {
    let document = Html::parse_document(html);
    let root = document.root_element();
    let page = &*PAGE;
    let mut facts = PageFacts::default();

    for rule in profile(platform) {
        if facts.fields.contains_key(&rule.field) {
            continue;
        }
        let value = match rule.read {
            Read::Text => dom::first_text(root, &rule.selectors),
            Read::Attr(attrs) => attrs.iter().find_map(|a| dom::first_attr(root, &rule.selectors, a)),
        };
        if let Some(value) = value {
            facts.fields.insert(rule.field, value);
        }
    }

    for row in document.select(&page.rows) {
        let cells: Vec<String> = row.select(&page.cells).map(dom::element_text).collect();
        if let [label, .., value] = cells.as_slice() {
            facts.labelled.push((label.to_lowercase(), value.clone()));
        }
    }
    for line in document.select(&page.lines) {
        let text = dom::element_text(line);
        if let Some((label, value)) = text.split_once(':') {
            let (label, value) = (label.trim(), value.trim());
            if !label.is_empty() && label.len() <= 30 && !value.is_empty() {
                facts.labelled.push((label.to_lowercase(), value.to_string()));
            }
        }
    }

    for script in document.select(&page.json_ld) {
        let raw = script.text().collect::<String>();
        if let Ok(value) = serde_json::from_str::<Value>(raw.trim()) {
            read_json_ld(&value, &mut facts.json_ld);
        }
    }
    for script in document.select(&page.json_scripts) {
        let raw = script.text().collect::<String>();
        if !raw.contains("variants") {
            continue;
        }
        match serde_json::from_str::<Value>(raw.trim()) {
            Ok(value) => read_shopify_json(&value, &mut facts.variant_prices, &mut facts.json_tags),
            Err(e) => debug!(error = %e, "Skipping unparseable product JSON"),
        }
    }

    facts.meta_price = dom::first_attr(root, &page.meta_price, "content");
    facts.meta_image = dom::first_attr(root, &page.meta_image, "content");

    for sel in &page.tags {
        facts.tags.extend(document.select(sel).map(dom::element_text));
    }
    facts.links = document
        .select(&page.anchors)
        .filter_map(|a| a.value().attr("href"))
        .map(str::to_string)
        .collect();

    facts
}

fn normalize_tag(tag: &str) -> String {
    tag.trim()
        .to_lowercase()
        .replace(['-', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn clean_region(raw: &str) -> Option<String> {
    let value = raw.split_once(':').map(|(_, v)| v).unwrap_or(raw);
    let value = value.split([',', ';', '|', '.']).next().unwrap_or_default().trim();
    (!value.is_empty() && value.chars().count() <= 60).then(|| title_case(value))
}

fn region_from_text(text: &str) -> Option<String> {
    REGION_RES
        .iter()
        .find_map(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .and_then(|m| clean_region(m.as_str()))
}

fn scan_terms(text: &str, terms: &[(&str, &str)]) -> BTreeSet<String> {
    let text = text.to_lowercase();
    terms
        .iter()
        .filter(|(term, _)| text.contains(term))
        .map(|(_, normalized)| normalized.to_string())
        .collect()
}

fn is_marketplace(url: &Url) -> bool {
    url.host_str()
        .map(|host| {
            let host = host.to_ascii_lowercase();
            MARKETPLACE_HOSTS
                .iter()
                .any(|m| host == *m || host.ends_with(&format!(".{}", m)))
        })
        .unwrap_or(false)
}

/// Declarative, platform-aware structured extractor.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredExtractor;

impl StructuredExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Fill `record` from a product page.
    ///
    /// Only fields the page says something about are touched. The record's
    /// platform picks the selector profile.
    pub fn extract(&self, html: &str, page_url: &Url, mut record: ProductRecord) -> StructuredExtraction {
        let facts = collect_facts(html, record.platform);

        if record.name.is_none() {
            record.name = facts
                .field(Field::Name)
                .map(str::to_string)
                .or_else(|| facts.json_ld.name.clone());
        }
        if let Some(description) = facts
            .field(Field::Description)
            .map(str::to_string)
            .or_else(|| facts.json_ld.description.clone())
            .filter(|d| !d.trim().is_empty())
        {
            record.description = Some(description);
        }
        if record.image_url.is_none() {
            record.image_url = facts
                .field(Field::Image)
                .map(str::to_string)
                .or_else(|| facts.json_ld.image.clone())
                .or_else(|| facts.meta_image.clone())
                .and_then(|src| resolve_href(page_url, &src))
                .map(|u| u.to_string());
        }

        let name = record.name.clone().unwrap_or_default();
        let description = record.description.clone().unwrap_or_default();
        let specs = facts.field(Field::Specifications).unwrap_or_default().to_string();
        let prose = format!("{} {} {}", name, description, specs);

        // Prices: variants, then the visible price, then JSON-LD, then Open Graph.
        let prices: Vec<(u32, f64)> = if !facts.variant_prices.is_empty() {
            facts.variant_prices.clone()
        } else if let Some(entry) = facts.field(Field::PriceText).and_then(|t| {
            let (grams, price) = parse_price_entry(t)?;
            let grams = if parse_weight_grams(t).is_none() {
                parse_weight_grams(&name).unwrap_or(grams)
            } else {
                grams
            };
            Some((grams, price))
        }) {
            vec![entry]
        } else if !facts.json_ld.prices.is_empty() {
            facts.json_ld.prices.clone()
        } else {
            facts
                .meta_price
                .as_deref()
                .and_then(parse_price)
                .map(|p| vec![(DEFAULT_WEIGHT_GRAMS, p)])
                .unwrap_or_default()
        };
        for (grams, price) in prices {
            record.prices.entry(grams).or_insert(price);
        }

        if record.roast_level.is_unknown() {
            record.roast_level = facts
                .field(Field::Roast)
                .or_else(|| facts.labelled(&["roast"]))
                .map(RoastLevel::from_text)
                .filter(|r| !r.is_unknown())
                .unwrap_or_else(|| RoastLevel::from_description(&prose));
        }
        if record.processing_method.is_unknown() {
            record.processing_method = facts
                .field(Field::Process)
                .or_else(|| facts.labelled(&["process"]))
                .map(ProcessingMethod::from_text)
                .filter(|p| !p.is_unknown())
                .unwrap_or_else(|| ProcessingMethod::from_text(&prose));
        }
        if record.bean_type.is_unknown() {
            record.bean_type = facts
                .labelled(&["bean", "species", "variety"])
                .map(BeanType::from_text)
                .filter(|b| !b.is_unknown())
                .unwrap_or_else(|| BeanType::from_text(&prose));
        }

        if record.region_name.is_none() {
            record.region_name = facts
                .field(Field::Origin)
                .or_else(|| facts.labelled(&["origin", "region"]))
                .and_then(clean_region)
                .or_else(|| region_from_text(&format!("{} {}", specs, description)));
        }
        if record.varietal.is_none() {
            record.varietal = facts
                .labelled(&["varietal", "cultivar"])
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty() && v.chars().count() <= 80);
        }

        let notes = TASTING_NOTES_RE
            .captures(&description)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string());
        if record.tasting_notes.is_none() {
            record.tasting_notes = facts
                .labelled(&["tasting notes", "flavour notes", "flavor notes"])
                .map(str::to_string)
                .or_else(|| notes.clone());
        }
        if record.flavor_profiles.is_empty() {
            let source = notes.as_deref().unwrap_or(&description);
            record.flavor_profiles = scan_terms(source, FLAVOR_TERMS);
        }
        if record.brew_methods.is_empty() {
            record.brew_methods = scan_terms(&format!("{} {}", description, specs), BREW_TERMS);
        }

        if record.is_available.is_none() {
            record.is_available = facts
                .field(Field::StockStatus)
                .map(|status| {
                    let status = status.to_lowercase();
                    !(status.contains("out of stock") || status.contains("sold out") || status.contains("unavailable"))
                })
                .or(facts.json_ld.in_stock);
        }

        let tags: BTreeSet<String> = facts
            .tags
            .iter()
            .chain(facts.json_tags.iter())
            .map(|t| normalize_tag(t))
            .filter(|t| !t.is_empty() && !NEGATIVE_TAGS.iter().any(|n| normalize_tag(n) == *t))
            .collect();
        record.tags.extend(tags);

        let lowered = format!("{} {}", prose, record.tags.iter().cloned().collect::<Vec<_>>().join(" ")).to_lowercase();
        if record.is_seasonal.is_none() && (lowered.contains("seasonal") || lowered.contains("limited edition") || lowered.contains("limited release")) {
            record.is_seasonal = Some(true);
        }
        if record.is_featured.is_none()
            && record
                .tags
                .iter()
                .any(|t| t == "featured" || t == "bestseller" || t == "best seller")
        {
            record.is_featured = Some(true);
        }
        if record.is_single_origin.is_none() {
            let blended = matches!(
                record.bean_type,
                BeanType::Blend | BeanType::ArabicaRobusta | BeanType::MixedArabica
            ) || lowered.contains("blend");
            if blended {
                record.is_single_origin = Some(false);
            } else if lowered.contains("single origin") || lowered.contains("single-origin") || lowered.contains("single estate") {
                record.is_single_origin = Some(true);
            }
        }

        for href in &facts.links {
            if let Some(link) = resolve_href(page_url, href) {
                if is_marketplace(&link) {
                    record.external_links.insert(link.to_string());
                }
            }
        }

        let completeness = record.completeness();
        debug!(
            url = %record.url,
            profile = profile_name(record.platform),
            completeness,
            "Structured extraction finished"
        );
        StructuredExtraction { record, completeness }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DiscoverySource, ProductCandidate};

    fn record(platform: Platform) -> ProductRecord {
        let candidate = ProductCandidate::new("https://roaster.in/products/attikan", DiscoverySource::Sitemap).unwrap();
        ProductRecord::from_candidate(&candidate, platform)
    }

    fn page_url() -> Url {
        Url::parse("https://roaster.in/products/attikan").unwrap()
    }

    const SHOPIFY_PAGE: &str = r#"<html><body>
        <h1 class="product__title">Attikan Estate</h1>
        <div class="product__description rte">
          <p>A medium dark roast from Chikmagalur.</p>
          <p>Tasting notes: dark chocolate, orange and jaggery.</p>
          <ul><li>Origin: Chikmagalur, Karnataka</li><li>Process: Washed</li><li>Varietal: SLN 795</li></ul>
          <p>Great as espresso or in a french press.</p>
        </div>
        <div class="product__media"><img src="//cdn.shopify.com/attikan.jpg"></div>
        <script type="application/json" data-product-json>
          {"product":{"tags":["Featured","coffee","Rec_Aer"],"price_min":45000,"price_max":160000,"variants":[
            {"title":"250g / Whole Bean","price":45000},
            {"title":"1kg / Whole Bean","price":160000}]}}
        </script>
        <button class="product-form__submit">Add to cart</button>
        <a href="https://www.amazon.in/dp/B0ATTIKAN">Buy on Amazon</a>
    </body></html>"#;

    #[test]
    fn test_shopify_profile_extracts_core_fields() {
        let out = StructuredExtractor::new().extract(SHOPIFY_PAGE, &page_url(), record(Platform::Shopify));
        let r = out.record;

        assert_eq!(r.name.as_deref(), Some("Attikan Estate"));
        assert_eq!(r.roast_level, RoastLevel::MediumDark);
        assert_eq!(r.processing_method, ProcessingMethod::Washed);
        assert_eq!(r.prices.get(&250), Some(&450.0));
        assert_eq!(r.prices.get(&1000), Some(&1600.0));
        assert_eq!(r.region_name.as_deref(), Some("Chikmagalur"));
        assert_eq!(r.varietal.as_deref(), Some("SLN 795"));
        assert!(r.flavor_profiles.contains("chocolate"));
        assert!(r.brew_methods.contains("espresso"));
        assert!(r.brew_methods.contains("french-press"));
        assert_eq!(r.image_url.as_deref(), Some("https://cdn.shopify.com/attikan.jpg"));
        assert_eq!(r.is_available, Some(true));
        assert_eq!(r.is_featured, Some(true));
        assert!(r.tags.contains("featured"));
        assert!(!r.tags.contains("coffee"));
        assert!(!r.tags.contains("rec aer"));
        assert!(r.external_links.contains("https://www.amazon.in/dp/B0ATTIKAN"));
        assert_eq!(out.completeness, 3);
    }

    #[test]
    fn test_woocommerce_attribute_table() {
        let html = r#"<html><body>
            <h1 class="product_title">Monsooned Malabar</h1>
            <p class="price"><span class="woocommerce-Price-amount">₹520.00</span></p>
            <table class="woocommerce-product-attributes">
              <tr class="woocommerce-product-attributes-item--attribute_roast-level">
                <th>Roast Level</th><td class="woocommerce-product-attributes-item__value">Dark</td></tr>
              <tr><th>Bean</th><td>100% Arabica</td></tr>
            </table>
            <p class="stock out-of-stock">Out of stock</p>
        </body></html>"#;

        let out = StructuredExtractor::new().extract(html, &page_url(), record(Platform::WooCommerce));
        let r = out.record;

        assert_eq!(r.roast_level, RoastLevel::Dark);
        assert_eq!(r.bean_type, BeanType::Arabica);
        assert_eq!(r.processing_method, ProcessingMethod::Monsooned);
        assert_eq!(r.prices.get(&250), Some(&520.0));
        assert_eq!(r.is_available, Some(false));
        assert_eq!(out.completeness, 4);
    }

    #[test]
    fn test_generic_json_ld_offers() {
        let html = r#"<html><head>
            <script type="application/ld+json">
              {"@context":"https://schema.org","@type":"Product","name":"Ratnagiri Estate 500g",
               "offers":{"@type":"Offer","price":"780","availability":"https://schema.org/InStock"}}
            </script></head><body><h1>Ratnagiri Estate</h1></body></html>"#;

        let out = StructuredExtractor::new().extract(html, &page_url(), record(Platform::Unknown));

        assert_eq!(out.record.prices.get(&500), Some(&780.0));
        assert_eq!(out.record.is_available, Some(true));
        assert_eq!(out.completeness, 1);
    }

    #[test]
    fn test_inline_variant_json_in_rupees() {
        let html = r#"<html><body><h1>Baarbara Estate</h1>
            <script type="application/json">
              {"variants":[{"title":"250 g","price":450},{"title":"500 g","price":"820.00"}]}
            </script></body></html>"#;

        let out = StructuredExtractor::new().extract(html, &page_url(), record(Platform::Unknown));

        assert_eq!(out.record.prices.get(&250), Some(&450.0));
        assert_eq!(out.record.prices.get(&500), Some(&820.0));
    }

    #[test]
    fn test_og_price_fallback() {
        let html = r#"<html><head><meta property="og:price:amount" content="1,150.00"></head><body></body></html>"#;
        let out = StructuredExtractor::new().extract(html, &page_url(), record(Platform::Squarespace));
        assert_eq!(out.record.prices.get(&250), Some(&1150.0));
    }

    #[test]
    fn test_bare_page_is_incomplete() {
        let html = "<html><body><h1>Gift box</h1></body></html>";
        let out = StructuredExtractor::new().extract(html, &page_url(), record(Platform::Unknown));
        assert_eq!(out.completeness, 0);
        assert_eq!(out.record.name.as_deref(), Some("Gift box"));
    }
}
