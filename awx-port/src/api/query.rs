//! URL and filter-query construction

use serde_json::{Map, Value};

use crate::transfer::UNSAFE_FILTER_FIELDS;

/// Normalize a configured store address into a URL root without trailing slash
///
/// Bare host names get an `https://` scheme.
pub fn normalize_root(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

/// Resolve a store-relative locator (or pass through an absolute URL)
pub fn join_url(root: &str, locator: &str) -> String {
    if locator.starts_with("http://") || locator.starts_with("https://") {
        locator.to_string()
    } else if locator.starts_with('/') {
        format!("{}{}", root, locator)
    } else {
        format!("{}/{}", root, locator)
    }
}

/// Append query parameters to a URL that may already carry some
pub fn append_query(url: &str, query: &str) -> String {
    if query.is_empty() {
        url.to_string()
    } else if url.contains('?') {
        format!("{}&{}", url, query)
    } else {
        format!("{}?{}", url, query)
    }
}

/// Build an equality-filter query string from entity fields
///
/// Unsafe fields and non-scalar values are skipped; nulls become
/// `__isnull` filters. Keys come out sorted so equal filters produce
/// equal strings.
pub fn build_filter_query(filters: &Map<String, Value>) -> String {
    let mut pairs: Vec<(&String, String)> = filters
        .iter()
        .filter(|(key, _)| !UNSAFE_FILTER_FIELDS.contains(&key.as_str()))
        .filter_map(|(key, value)| match value {
            Value::Null => Some((key, "__isnull=true".to_string())),
            Value::String(s) => Some((key, format!("={}", urlencoding::encode(s)))),
            Value::Bool(b) => Some((key, format!("={}", b))),
            Value::Number(n) => Some((key, format!("={}", n))),
            Value::Array(_) | Value::Object(_) => None,
        })
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));

    pairs
        .into_iter()
        .map(|(key, rest)| format!("{}{}", key, rest))
        .collect::<Vec<_>>()
        .join("&")
}
