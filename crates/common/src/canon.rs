//! Determinism kernel: canonical JSON, stable sort, content hashing.
//!
//! Every byte that leaves the pipeline (facts, witnesses, explain bundles,
//! cache entries) is produced here, never by ad-hoc formatting. Canonical
//! JSON writes object keys in code-point order with no whitespace; absent
//! optional fields are skipped in objects (serde `skip_serializing_if`)
//! and serialized as `null` inside arrays, matching standard JSON
//! semantics for elided values.

use crate::error::{FlowfactError, Result};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::cmp::Ordering;

/// Render a JSON value in canonical form.
///
/// Accepts only what `serde_json::Value` can hold (plain records, arrays
/// and primitives), so cycles and exotic types are unrepresentable by
/// construction. `serde_json` cannot hold a non-finite number either (it
/// degrades to null at conversion); the writer still guards against one
/// ever reaching it as a `Number`.
pub fn to_canonical_json(value: &Value) -> Result<String> {
    let mut out = String::new();
    write_value(value, &mut out)?;
    Ok(out)
}

/// Serialize any value and render it canonically.
pub fn canonical_string<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_value(value)
        .map_err(|e| FlowfactError::Schema(format!("canonicalization failed: {e}")))?;
    to_canonical_json(&json)
}

/// Lowercase-hex SHA-256 of the canonical JSON of `value`.
pub fn canonical_hash<T: Serialize>(value: &T) -> Result<String> {
    let canon = canonical_string(value)?;
    Ok(hex::encode(Sha256::digest(canon.as_bytes())))
}

fn write_value(value: &Value, out: &mut String) -> Result<()> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                if !f.is_finite() {
                    return Err(FlowfactError::Schema(format!(
                        "non-finite number {f} is not serializable"
                    )));
                }
            }
            out.push_str(&n.to_string());
        }
        Value::String(s) => {
            // serde_json's escaping is stable; reuse it for string atoms.
            out.push_str(&serde_json::to_string(s).expect("string serialization is infallible"));
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out)?;
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(
                    &serde_json::to_string(key).expect("string serialization is infallible"),
                );
                out.push(':');
                write_value(&map[key.as_str()], out)?;
            }
            out.push('}');
        }
    }
    Ok(())
}

/// Stable sort: comparator result with original-index tiebreak, so equal
/// elements keep their input order no matter what the backing sort does.
pub fn stable_sort_by<T, F>(items: &mut Vec<T>, cmp: F)
where
    F: Fn(&T, &T) -> Ordering,
{
    let mut decorated: Vec<(usize, T)> = std::mem::take(items).into_iter().enumerate().collect();
    decorated.sort_by(|(ia, a), (ib, b)| cmp(a, b).then_with(|| ia.cmp(ib)));
    *items = decorated.into_iter().map(|(_, item)| item).collect();
}
