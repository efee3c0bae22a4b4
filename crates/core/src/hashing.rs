//! Content hashing for configuration blobs.
//!
//! Working copies and releases store a `config_hash` alongside the config
//! blob. The hash is a pure function of the *canonicalized* JSON (object
//! keys recursively sorted), so two configs that differ only in key order
//! hash identically. Used for change detection and idempotent re-publish
//! avoidance.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Serialize a JSON value with all object keys sorted, recursively.
///
/// Arrays keep their order (order is semantically meaningful there);
/// scalars serialize via `serde_json`'s standard formatting.
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
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Keys serialize as JSON strings (handles escaping).
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[*key], out);
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

/// Compute the content digest of a config blob.
///
/// `config_hash(a) == config_hash(b)` iff `a` and `b` are deep-equal under
/// key-order-independent comparison.
pub fn config_hash(config: &Value) -> String {
    sha256_hex(canonical_json(config).as_bytes())
}
