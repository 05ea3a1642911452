//! Fill-only merge of fallback attributes into a record.

use super::fallback::FallbackAttributes;
use crate::types::{BeanType, EnrichmentSource, ProcessingMethod, ProductRecord, RoastLevel};

fn fill<T: Clone>(slot: &mut Option<T>, value: &Option<T>) -> bool {
    match (slot.as_ref(), value) {
        (None, Some(v)) => {
            *slot = Some(v.clone());
            true
        }
        _ => false,
    }
}

fn fill_text(slot: &mut Option<String>, value: &Option<String>) -> bool {
    if slot.as_deref().map(str::trim).is_some_and(|s| !s.is_empty()) {
        return false;
    }
    match value {
        Some(v) => {
            *slot = Some(v.clone());
            true
        }
        None => false,
    }
}

fn fill_enum<T: Copy>(slot: &mut T, value: Option<T>, is_unknown: fn(T) -> bool) -> bool {
    match value {
        Some(v) if is_unknown(*slot) && !is_unknown(v) => {
            *slot = v;
            true
        }
        _ => false,
    }
}

fn fill_collection<C: Clone>(slot: &mut C, value: &C, is_empty: fn(&C) -> bool) -> bool {
    if is_empty(slot) && !is_empty(value) {
        *slot = value.clone();
        true
    } else {
        false
    }
}

/// Apply fallback attributes to fields that are missing, empty or unknown.
///
/// A definite value is never replaced. Returns whether any field changed;
/// when one did the record is tagged [`EnrichmentSource::Merged`].
pub fn merge_fallback(record: &mut ProductRecord, attrs: &FallbackAttributes) -> bool {
    let mut applied = false;

    applied |= fill_enum(&mut record.roast_level, attrs.roast_level, RoastLevel::is_unknown);
    applied |= fill_enum(&mut record.bean_type, attrs.bean_type, BeanType::is_unknown);
    applied |= fill_enum(&mut record.processing_method, attrs.processing_method, ProcessingMethod::is_unknown);

    applied |= fill_text(&mut record.region_name, &attrs.region_name);
    applied |= fill_text(&mut record.tasting_notes, &attrs.tasting_notes);
    applied |= fill_text(&mut record.varietal, &attrs.varietal);

    applied |= fill_collection(&mut record.flavor_profiles, &attrs.flavor_profiles, |s| s.is_empty());
    applied |= fill_collection(&mut record.brew_methods, &attrs.brew_methods, |s| s.is_empty());
    applied |= fill_collection(&mut record.prices, &attrs.prices, |p| p.is_empty());

    applied |= fill(&mut record.altitude_min, &attrs.altitude_min);
    applied |= fill(&mut record.altitude_max, &attrs.altitude_max);
    applied |= fill(&mut record.is_seasonal, &attrs.is_seasonal);
    applied |= fill(&mut record.is_single_origin, &attrs.is_blend.map(|blend| !blend));

    if applied {
        record.enrichment_source = EnrichmentSource::Merged;
    }
    applied
}
