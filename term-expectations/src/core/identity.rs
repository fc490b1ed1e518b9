//! Canonical JSON rendering and content hashing.
//!
//! Metric, domain and batch identities are all derived from the same rule:
//! render the value as key-sorted compact JSON, then hash it with SHA-256.
//! The rendering sorts keys itself, so the result does not depend on whether
//! `serde_json` preserves insertion order in this build.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Renders a JSON value with object keys sorted at every level.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Returns the lowercase hex SHA-256 of the canonical rendering of `value`.
pub fn content_id(value: &Value) -> String {
    hash_bytes(canonical_json(value).as_bytes())
}

/// Returns the lowercase hex SHA-256 of raw bytes.
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Drops null-valued entries at the top level of a kwargs map.
///
/// An explicit `null` means "not set", so `{"row_condition": null}` and `{}`
/// describe the same thing and must hash the same.
pub fn without_nulls(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
