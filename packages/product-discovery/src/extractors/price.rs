//! Price and pack-weight parsing.

use regex::Regex;
use std::sync::LazyLock;

/// Pack weight assumed when a price names none.
pub const DEFAULT_WEIGHT_GRAMS: u32 = 250;

static WEIGHT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(kgs?|kilos?|grams?|gms?|g)\b").unwrap());

static CURRENCY_PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:₹|\brs\.?|\binr)\s*(\d[\d,]*(?:\.\d+)?)").unwrap());

static PLAIN_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d[\d,]*(?:\.\d+)?").unwrap());

fn to_number(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse::<f64>().ok().filter(|n| n.is_finite())
}

/// First pack weight mentioned in `text`, in grams (`1kg` → 1000).
pub fn parse_weight_grams(text: &str) -> Option<u32> {
    let caps = WEIGHT_RE.captures(text)?;
    let value = caps.get(1)?.as_str().parse::<f64>().ok()?;
    let unit = caps.get(2)?.as_str().to_ascii_lowercase();
    let grams = if unit.starts_with('k') { value * 1000.0 } else { value };
    (grams >= 1.0).then(|| grams.round() as u32)
}

/// First price in `text`.
///
/// Amounts with a currency marker (₹, Rs, INR) win; otherwise the first
/// number that is not part of a weight is used.
pub fn parse_price(text: &str) -> Option<f64> {
    if let Some(caps) = CURRENCY_PRICE_RE.captures(text) {
        return caps.get(1).and_then(|m| to_number(m.as_str())).filter(|p| *p > 0.0);
    }
    let without_weights = WEIGHT_RE.replace_all(text, " ");
    PLAIN_NUMBER_RE
        .find_iter(&without_weights)
        .filter_map(|m| to_number(m.as_str()))
        .find(|p| *p > 0.0)
}

/// A `(grams, price)` pair from one price string; no weight means 250 g.
pub fn parse_price_entry(text: &str) -> Option<(u32, f64)> {
    let price = parse_price(text)?;
    let grams = parse_weight_grams(text).unwrap_or(DEFAULT_WEIGHT_GRAMS);
    Some((grams, price))
}
