//! Tolerant extraction rules for provider payloads.
//!
//! Upstreams disagree on where a figure lives (`liquidity.usd` vs
//! `liquidityUsd` vs `lockedUsd`) and whether numbers arrive as JSON numbers
//! or decimal strings. Each canonical field is read through an explicit,
//! ordered list of dot-paths; the first present path wins.

use serde_json::Value;

use crate::error::FetchError;

/// Resolves the first of `paths` present in `value`. A path is a
/// dot-separated chain of object keys; `null` counts as absent.
pub fn probe<'a>(value: &'a Value, paths: &[&str]) -> Option<&'a Value> {
    paths.iter().find_map(|path| {
        let mut current = value;
        for key in path.split('.') {
            current = current.get(key)?;
        }
        (!current.is_null()).then_some(current)
    })
}

/// Coerces a JSON number or numeric string into a finite f64. Non-finite
/// results are a provider contract violation, never passed through.
pub fn coerce_f64(value: &Value) -> Result<f64, FetchError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(n) if n.is_finite() => Ok(n),
        Some(n) => Err(FetchError::Malformed(format!(
            "non-finite numeric value: {n}"
        ))),
        None => Err(FetchError::Malformed(format!(
            "expected a number, got: {value}"
        ))),
    }
}

/// Like [`coerce_f64`] but for non-negative integers (counts, unix seconds).
pub fn coerce_u64(value: &Value) -> Result<u64, FetchError> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| FetchError::Malformed(format!("expected an unsigned integer: {n}"))),
        Value::String(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| FetchError::Malformed(format!("expected an unsigned integer: '{s}'"))),
        _ => Err(FetchError::Malformed(format!(
            "expected an unsigned integer, got: {value}"
        ))),
    }
}

/// Reads a string field, tolerating absence.
pub fn probe_str<'a>(value: &'a Value, paths: &[&str]) -> Option<&'a str> {
    probe(value, paths).and_then(Value::as_str)
}

/// Selects the element of `items` whose `field` equals `target`
/// case-insensitively. When nothing matches and `fallback_first` is set, the
/// first element is returned instead — a best-effort policy for upstreams
/// that reorder or slightly rewrite identifiers, not a correctness
/// guarantee.
pub fn select_by_id<'a>(
    items: &'a [Value],
    field: &str,
    target: &str,
    fallback_first: bool,
) -> Option<&'a Value> {
    items
        .iter()
        .find(|item| {
            item.get(field)
                .and_then(Value::as_str)
                .is_some_and(|id| id.eq_ignore_ascii_case(target))
        })
        .or_else(|| fallback_first.then(|| items.first()).flatten())
}
