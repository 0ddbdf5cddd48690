use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::review_record::ReviewRecord;

/// Joins the parts of a correlation key. Normalized text can never contain
/// this sequence next to the part boundaries, so differently-shaped inputs
/// can not collide by accident.
pub const KEY_SEPARATOR: &str = "::";

/// Produces a comparison-safe string from arbitrary user text.
///
/// Decomposes to NFD, strips combining diacritical marks, lowercases and
/// collapses whitespace runs to single spaces (which also trims the ends).
/// Total and deterministic, independent of platform locale; `normalize` of an
/// already normalized string is the string itself.
pub fn normalize(input: &str) -> String {
    let stripped: String = input.nfd().filter(|c| !is_combining_mark(*c)).collect();
    stripped
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// The strict identity key of a record:
/// `type :: name :: breeder :: farm`, all parts normalized.
///
/// Two records with equal strict keys are considered the same real-world
/// review. Must be recomputed whenever any of the source fields changes.
pub fn strict_key(record: &ReviewRecord) -> String {
    let parts = [
        normalize(&record.product_type),
        normalize(name_field(record)),
        normalize(record.breeder.as_deref().unwrap_or("")),
        normalize(record.farm.as_deref().unwrap_or("")),
    ];
    parts.join(KEY_SEPARATOR)
}

/// The loose identity key of a record: `type :: name`.
///
/// Early drafts often carry the name before breeder/farm are known. Without
/// this key such drafts would never match their later, fuller versions.
pub fn loose_key(record: &ReviewRecord) -> String {
    let parts = [
        normalize(&record.product_type),
        normalize(name_field(record)),
    ];
    parts.join(KEY_SEPARATOR)
}

/// The first non-empty value among `product_name`, `cultivars` and the
/// generic "strain"/"title"/"name" entries of the open field bag, in that
/// priority order.
fn name_field(record: &ReviewRecord) -> &str {
    if let Some(name) = non_empty(record.product_name.as_deref()) {
        return name;
    }
    if let Some(cultivars) = non_empty(record.cultivars.as_deref()) {
        return cultivars;
    }
    for fallback in &["strain", "title", "name"] {
        let value = record.extra.get(*fallback).and_then(|v| v.as_str());
        if let Some(value) = non_empty(value) {
            return value;
        }
    }
    ""
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}
