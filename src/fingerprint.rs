//! Canonical request fingerprints.
//!
//! A fingerprint is the canonical JSON rendering of a request descriptor:
//! object keys sorted recursively, array order preserved. Two descriptors
//! that differ only in key insertion order produce the same fingerprint;
//! swapping two conversation turns does not.
//!
//! Keys are sorted explicitly rather than relying on `serde_json::Map`
//! ordering, which becomes insertion order when any crate in the build
//! enables `serde_json/preserve_order`.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

/// Derive the fingerprint of any serializable request descriptor.
///
/// Total: never fails. If the descriptor cannot be serialized, a unique
/// degraded fingerprint is returned (coarse timestamp plus random suffix),
/// which defeats caching for that one call instead of blocking it.
pub fn fingerprint<T: Serialize + ?Sized>(descriptor: &T) -> String {
    match serde_json::to_value(descriptor) {
        Ok(value) => canonical_json(&value),
        Err(e) => {
            let fp = degraded_fingerprint();
            warn!(error = %e, fingerprint = %fp, "descriptor not serializable, caching disabled for this call");
            fp
        }
    }
}

/// Whether `fp` came from the degraded path of [`fingerprint`].
pub fn is_degraded(fp: &str) -> bool {
    fp.starts_with(DEGRADED_PREFIX)
}

const DEGRADED_PREFIX: &str = "degraded:";

fn degraded_fingerprint() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("{DEGRADED_PREFIX}{secs}:{:016x}", rand::random::<u64>())
}

/// Render a JSON value with recursively sorted object keys.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, val)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(val, out);
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn key_order_is_irrelevant() {
        let a = json!({"subject": "Math", "topic": "Fractions", "gradeLevel": "4-6"});
        let b = json!({"gradeLevel": "4-6", "topic": "Fractions", "subject": "Math"});
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn nested_objects_are_sorted() {
        let a = json!({"outer": {"b": 1, "a": [{"y": 2, "x": 1}]}});
        assert_eq!(canonical_json(&a), r#"{"outer":{"a":[{"x":1,"y":2}],"b":1}}"#);
    }

    #[test]
    fn array_order_is_significant() {
        let a = json!({"turns": ["hi", "hello"]});
        let b = json!({"turns": ["hello", "hi"]});
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn strings_are_escaped() {
        let a = json!({"q": "say \"hi\""});
        assert_eq!(canonical_json(&a), r#"{"q":"say \"hi\""}"#);
    }

    #[test]
    fn unserializable_descriptor_degrades() {
        // Non-string map keys cannot be represented as a JSON object.
        let mut bad = HashMap::new();
        bad.insert((1, 2), "x");
        let a = fingerprint(&bad);
        let b = fingerprint(&bad);
        assert!(is_degraded(&a));
        assert_ne!(a, b);
    }
}
