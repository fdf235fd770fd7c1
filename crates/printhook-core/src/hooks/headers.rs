//! Header template resolution and normalization.

use std::collections::BTreeMap;

use crate::context::Context;
use crate::template::{ResolveError, resolve_text};

/// Resolve every header value against the context.
pub fn resolve_headers(
    headers: &BTreeMap<String, String>,
    context: &Context,
) -> Result<BTreeMap<String, String>, ResolveError> {
    headers
        .iter()
        .map(|(name, value)| Ok((name.clone(), resolve_text(value, context)?)))
        .collect()
}

/// Ensure `name` is present exactly once with a value containing `value`.
///
/// Names compare case-insensitively and duplicates that differ only in case
/// collapse into one entry. An existing header whose value already contains
/// `value` (case-insensitively) is kept as written, so parameters such as
/// `; charset=utf-8` survive.
pub fn normalize_header(
    mut headers: BTreeMap<String, String>,
    name: &str,
    value: &str,
) -> BTreeMap<String, String> {
    let wanted = value.to_ascii_lowercase();
    let matching: Vec<String> = headers
        .keys()
        .filter(|key| key.eq_ignore_ascii_case(name))
        .cloned()
        .collect();

    let Some(first) = matching.first() else {
        headers.insert(name.to_string(), value.to_string());
        return headers;
    };

    let kept = matching
        .iter()
        .find(|key| headers[key.as_str()].to_ascii_lowercase().contains(&wanted))
        .cloned();
    let (key, current) = match kept {
        Some(key) => {
            let current = headers[key.as_str()].clone();
            (key, current)
        }
        None => (first.clone(), value.to_string()),
    };

    for duplicate in &matching {
        headers.remove(duplicate);
    }
    headers.insert(key, current);
    headers
}
