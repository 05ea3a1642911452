//! Language-model fallback extraction.
//!
//! The page is rendered to plain text, sent with a fixed instruction to a
//! [`LanguageModel`], and the first JSON object in the reply is validated
//! field by field. Nothing here returns an error: a failed call, a reply with
//! no JSON or a malformed field all degrade to "no enrichment".

use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

use super::price::parse_weight_grams;
use crate::dom::render_page_text;
use crate::llm::LanguageModel;
use crate::types::{BeanType, ExtractionConfig, Prices, ProcessingMethod, ProductRecord, RoastLevel};

/// System instruction sent with every request.
pub const SYSTEM_PROMPT: &str =
    "You are a coffee expert who extracts structured attributes from product descriptions.";

fn members<T: Copy>(all: &[T], name: impl Fn(T) -> &'static str) -> String {
    all.iter().map(|m| name(*m)).collect::<Vec<_>>().join(", ")
}

/// Field instruction appended to the product context.
pub fn instruction() -> String {
    format!(
        "Extract the following attributes from the coffee product above:\n\
         1. roast_level: one of [{roast}]\n\
         2. bean_type: one of [{bean}]\n\
         3. processing_method: one of [{process}]\n\
         4. region_name: growing region or estate, as a short string\n\
         5. tasting_notes: the tasting notes as written\n\
         6. flavor_profiles: array of flavor words (e.g. chocolate, nutty, fruity)\n\
         7. brew_methods: array of recommended brew methods (e.g. espresso, pour-over, french-press)\n\
         8. prices: object mapping pack weight in grams to price, e.g. {{\"250\": 450}}\n\
         9. altitude_min and altitude_max: integers in meters\n\
         10. varietal: coffee varietal or cultivar\n\
         11. is_blend: true or false\n\
         12. is_seasonal: true or false\n\n\
         DO NOT infer or guess. Use \"unknown\" or omit a field when the text does not state it.\n\
         Return ONLY a valid JSON object with these keys and no other text.",
        roast = members(RoastLevel::ALL, RoastLevel::as_str),
        bean = members(BeanType::ALL, BeanType::as_str),
        process = members(ProcessingMethod::ALL, ProcessingMethod::as_str),
    )
}

/// Span of the first balanced `{...}` in `reply`, ignoring braces inside strings.
pub fn first_balanced_json(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in reply[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&reply[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Attributes recovered from a language-model reply. Every field is optional;
/// enum values that did not validate are `None`, never `Unknown`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FallbackAttributes {
    pub roast_level: Option<RoastLevel>,
    pub bean_type: Option<BeanType>,
    pub processing_method: Option<ProcessingMethod>,
    pub region_name: Option<String>,
    pub tasting_notes: Option<String>,
    pub varietal: Option<String>,
    pub flavor_profiles: BTreeSet<String>,
    pub brew_methods: BTreeSet<String>,
    pub prices: Prices,
    pub altitude_min: Option<u32>,
    pub altitude_max: Option<u32>,
    pub is_blend: Option<bool>,
    pub is_seasonal: Option<bool>,
}

const EMPTY_MARKERS: &[&str] = &["", "unknown", "null", "none", "n/a", "na", "not specified"];

fn clean_string(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        _ => return None,
    };
    (!EMPTY_MARKERS.contains(&text.to_lowercase().as_str())).then_some(text)
}

fn string_set(value: &Value) -> BTreeSet<String> {
    let items: Vec<&str> = match value {
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        Value::String(s) => s.split(',').collect(),
        _ => Vec::new(),
    };
    items
        .into_iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !EMPTY_MARKERS.contains(&s.as_str()))
        .collect()
}

fn enum_field<T: Copy>(value: &Value, parse: fn(&str) -> Option<T>, is_unknown: fn(T) -> bool) -> Option<T> {
    value.as_str().and_then(parse).filter(|v| !is_unknown(*v))
}

fn integer(value: &Value) -> Option<u32> {
    let number = match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64)),
        Value::String(s) => {
            let digits: String = s
                .replace(',', "")
                .chars()
                .skip_while(|c| !c.is_ascii_digit())
                .take_while(|c| c.is_ascii_digit())
                .collect();
            digits.parse().ok()
        }
        _ => None,
    };
    number.and_then(|n| u32::try_from(n).ok()).filter(|n| *n > 0)
}

fn boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn price_value(value: &Value) -> Option<f64> {
    let price: Option<f64> = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.replace(',', "").trim().trim_start_matches('₹').trim().parse().ok(),
        _ => None,
    };
    price.filter(|p| p.is_finite() && *p > 0.0)
}

fn prices(value: &Value) -> Prices {
    let Some(map) = value.as_object() else {
        return Prices::new();
    };
    map.iter()
        .filter_map(|(key, value)| {
            let grams = key
                .trim()
                .parse::<u32>()
                .ok()
                .or_else(|| parse_weight_grams(key))?;
            Some((grams, price_value(value)?))
        })
        .collect()
}

impl FallbackAttributes {
    /// Validate a parsed reply object field by field.
    pub fn from_value(object: &Map<String, Value>) -> Self {
        let field = |key: &str| object.get(key).unwrap_or(&Value::Null);
        Self {
            roast_level: enum_field(field("roast_level"), RoastLevel::parse, RoastLevel::is_unknown),
            bean_type: enum_field(field("bean_type"), BeanType::parse, BeanType::is_unknown),
            processing_method: enum_field(
                field("processing_method"),
                ProcessingMethod::parse,
                ProcessingMethod::is_unknown,
            ),
            region_name: clean_string(field("region_name")),
            tasting_notes: clean_string(field("tasting_notes")),
            varietal: clean_string(field("varietal")),
            flavor_profiles: string_set(field("flavor_profiles")),
            brew_methods: string_set(field("brew_methods")),
            prices: prices(field("prices")),
            altitude_min: integer(field("altitude_min")),
            altitude_max: integer(field("altitude_max")),
            is_blend: boolean(field("is_blend")),
            is_seasonal: boolean(field("is_seasonal")),
        }
    }

    /// Parse a raw reply, tolerating prose around the JSON object.
    pub fn from_reply(reply: &str) -> Option<Self> {
        let span = first_balanced_json(reply)?;
        match serde_json::from_str::<Value>(span) {
            Ok(Value::Object(object)) => Some(Self::from_value(&object)),
            Ok(_) => None,
            Err(e) => {
                debug!(error = %e, "Fallback reply is not valid JSON");
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Escalation extractor backed by a language model.
#[derive(Clone)]
pub struct FallbackExtractor {
    model: Arc<dyn LanguageModel>,
    config: ExtractionConfig,
}

impl FallbackExtractor {
    pub fn new(model: Arc<dyn LanguageModel>, config: ExtractionConfig) -> Self {
        Self { model, config }
    }

    /// Text handed to the model: the page rendering, or the known description
    /// when the rendering is near-empty.
    fn page_text(&self, record: &ProductRecord, page_html: Option<&str>) -> Option<String> {
        let rendered = page_html
            .map(|html| render_page_text(html, self.config.max_text_chars))
            .unwrap_or_default();
        if rendered.chars().count() >= self.config.min_text_chars {
            return Some(rendered);
        }
        record
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(|d| d.chars().take(self.config.max_text_chars).collect())
            .or_else(|| (!rendered.is_empty()).then_some(rendered))
    }

    fn user_message(&self, record: &ProductRecord, text: &str) -> String {
        format!(
            "Product Name: {}\nOriginal Description: {}\n\nProduct Page Content:\n{}\n\n{}",
            record.name.as_deref().unwrap_or(""),
            record.description.as_deref().unwrap_or(""),
            text,
            instruction()
        )
    }

    /// Ask the model for the attributes of one product.
    ///
    /// Returns `None` when there is nothing to send, the call fails, or the
    /// reply holds no usable JSON object.
    pub async fn extract(&self, record: &ProductRecord, page_html: Option<&str>) -> Option<FallbackAttributes> {
        let Some(text) = self.page_text(record, page_html) else {
            debug!(url = %record.url, "No page text for fallback extraction");
            return None;
        };

        let reply = match self.model.complete(SYSTEM_PROMPT, &self.user_message(record, &text)).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(url = %record.url, error = %e, "Fallback extraction call failed");
                return None;
            }
        };

        let attributes = FallbackAttributes::from_reply(&reply);
        if attributes.is_none() {
            warn!(url = %record.url, reply_chars = reply.len(), "Fallback reply held no JSON object");
        }
        attributes
    }
}
