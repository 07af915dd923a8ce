//! Deterministic JSON re-encoding.
//!
//! Used to suppress diffs between a caller-supplied JSON payload and what the
//! API echoes back, and to derive stable ids from response bodies. Numbers are
//! kept verbatim (`serde_json`'s `arbitrary_precision`), so snowflakes and
//! 64-bit permission values never pass through `f64`.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Canonical text for `input`: object keys sorted, insignificant whitespace
/// removed. Blank input stays blank.
pub fn canonicalize(input: &str) -> Result<String> {
    if input.trim().is_empty() {
        return Ok(String::new());
    }
    let value: Value = serde_json::from_str(input)?;
    Ok(serde_json::to_string(&canonicalize_value(value))?)
}

/// Rebuild `value` with every object's keys inserted in sorted order.
///
/// Insertion order is what the map preserves if `preserve_order` is ever
/// enabled by another crate in the graph, so sorting here keeps the output
/// stable either way.
pub fn canonicalize_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (key, child) in entries {
                sorted.insert(key, canonicalize_value(child));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize_value).collect()),
        other => other,
    }
}

/// True when both texts canonicalize to the same bytes. Unparseable input
/// only matches itself.
pub fn equivalent(a: &str, b: &str) -> bool {
    match (canonicalize(a), canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Stable identifier for resources whose create call returns no `id`:
/// hex SHA-256 of `path` followed by the canonical body.
pub fn stable_hash_id(path: &str, body: &str) -> String {
    let canonical = canonicalize(body).unwrap_or_else(|_| body.to_string());
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}
