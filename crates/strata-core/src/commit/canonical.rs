//! Canonical JSON for commit hashing.
//!
//! The same logical commit must always produce the same byte sequence, no
//! matter how its payload collaborator happened to build the JSON tree.
//!
//! Rules:
//! - Compact: no whitespace between tokens.
//! - Object keys sorted lexicographically at every depth.
//! - Arrays keep their element order. Callers sort id sets before building
//!   the tree (see [`super::hash::commit_id_for`]).
//! - Scalars are written with `serde_json`'s own formatting and escaping.

use serde_json::Value;

/// Produce the canonical JSON string for a value.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use strata_core::commit::canonicalize_json;
///
/// let val = json!({"source": {"z": 1, "a": 2}, "date": 5});
/// assert_eq!(canonicalize_json(&val), r#"{"date":5,"source":{"a":2,"z":1}}"#);
/// ```
#[must_use]
pub fn canonicalize_json(value: &Value) -> String {
    let mut buf = String::new();
    write_canonical(value, &mut buf);
    buf
}

/// Canonical JSON as UTF-8 bytes, ready for a digest.
#[must_use]
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    canonicalize_json(value).into_bytes()
}

fn write_canonical(value: &Value, buf: &mut String) {
    match value {
        Value::Array(items) => {
            buf.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    buf.push(',');
                }
                write_canonical(item, buf);
            }
            buf.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            buf.push('{');
            for (i, (key, val)) in entries.into_iter().enumerate() {
                if i > 0 {
                    buf.push(',');
                }
                write_string(key, buf);
                buf.push(':');
                write_canonical(val, buf);
            }
            buf.push('}');
        }
        Value::String(s) => write_string(s, buf),
        // Null, booleans and numbers have a single compact rendering.
        scalar => buf.push_str(&scalar.to_string()),
    }
}

fn write_string(s: &str, buf: &mut String) {
    // Display on a string Value is serde_json's escaped form.
    buf.push_str(&Value::String(s.to_owned()).to_string());
}
