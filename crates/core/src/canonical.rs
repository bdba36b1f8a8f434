// Copyright 2025 Benchstore Contributors
// SPDX-License-Identifier: Apache-2.0

//! Canonical encoding of structured values.
//!
//! Two halves live here:
//!
//! - **Normalization** ([`normalize_value`], [`normalize_map`]) runs when a
//!   document is constructed. It collapses integral floats into integers so
//!   that `1`, `1.0` and `1.00` coming from different parsers end up as the
//!   same value before anything is hashed.
//! - **Encoding** ([`to_canonical_bytes`]) turns a value into a byte string
//!   with object keys sorted at every level and no insignificant whitespace.
//!
//! Encoding does not normalize. A value that was not normalized at
//! construction time encodes exactly as it is.

use crate::error::Result;
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// Largest magnitude at which every integer is exactly representable as `f64`.
pub const MAX_EXACT_FLOAT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Normalize a single value, recursing into arrays and objects.
pub fn normalize_value(value: Value) -> Value {
    match value {
        Value::Number(n) => Value::Number(normalize_number(n)),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_value).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, normalize_value(v)))
                .collect::<Map<String, Value>>(),
        ),
        other => other,
    }
}

/// Normalize every value of a free-form map.
pub fn normalize_map(map: BTreeMap<String, Value>) -> BTreeMap<String, Value> {
    map.into_iter()
        .map(|(k, v)| (k, normalize_value(v)))
        .collect()
}

fn normalize_number(n: Number) -> Number {
    if !n.is_f64() {
        return n;
    }
    match n.as_f64() {
        Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() <= MAX_EXACT_FLOAT_INTEGER => {
            Number::from(f as i64)
        }
        _ => n,
    }
}

/// Encode a value as canonical bytes.
pub fn to_canonical_bytes(value: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(256);
    write_value(&mut out, value)?;
    Ok(out)
}

/// Encode a value as a canonical UTF-8 string.
pub fn to_canonical_string(value: &Value) -> Result<String> {
    let bytes = to_canonical_bytes(value)?;
    // serde_json only emits valid UTF-8.
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn write_value(out: &mut Vec<u8>, value: &Value) -> Result<()> {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(n) => serde_json::to_writer(&mut *out, n)?,
        Value::String(s) => serde_json::to_writer(&mut *out, s)?,
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(out, item)?;
            }
            out.push(b']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
            out.push(b'{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                serde_json::to_writer(&mut *out, key)?;
                out.push(b':');
                write_value(out, item)?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keys_sorted_at_every_level() {
        let value = json!({"b": {"z": 1, "a": 2}, "a": [ {"y": true, "x": null} ]});
        let encoded = to_canonical_string(&value).unwrap();
        assert_eq!(encoded, r#"{"a":[{"x":null,"y":true}],"b":{"a":2,"z":1}}"#);
    }

    #[test]
    fn test_insertion_order_does_not_matter() {
        let mut first = Map::new();
        first.insert("threads".to_string(), json!(8));
        first.insert("duration".to_string(), json!(60));
        let mut second = Map::new();
        second.insert("duration".to_string(), json!(60));
        second.insert("threads".to_string(), json!(8));

        assert_eq!(
            to_canonical_bytes(&Value::Object(first)).unwrap(),
            to_canonical_bytes(&Value::Object(second)).unwrap()
        );
    }

    #[test]
    fn test_integral_floats_normalize_to_integers() {
        let parsed_a: Value = serde_json::from_str("1.0").unwrap();
        let parsed_b: Value = serde_json::from_str("1.00").unwrap();
        let parsed_c: Value = serde_json::from_str("1").unwrap();

        let a = normalize_value(parsed_a);
        let b = normalize_value(parsed_b);
        let c = normalize_value(parsed_c);

        assert_eq!(a, c);
        assert_eq!(b, c);
        assert_eq!(to_canonical_string(&a).unwrap(), "1");
    }

    #[test]
    fn test_fractional_and_huge_floats_are_kept() {
        assert_eq!(normalize_value(json!(2.5)), json!(2.5));
        assert_eq!(normalize_value(json!(-0.0)), json!(0));
        let huge = json!(1.0e300);
        assert_eq!(normalize_value(huge.clone()), huge);
    }

    #[test]
    fn test_normalization_recurses() {
        let value = json!({"outer": {"inner": [1.0, 2.5, {"deep": 3.0}]}});
        assert_eq!(
            normalize_value(value),
            json!({"outer": {"inner": [1, 2.5, {"deep": 3}]}})
        );
    }

    #[test]
    fn test_encoding_does_not_normalize() {
        assert_eq!(to_canonical_string(&json!(1.0)).unwrap(), "1.0");
    }

    #[test]
    fn test_strings_are_escaped() {
        let value = json!({"quote\"key": "line\nbreak"});
        assert_eq!(
            to_canonical_string(&value).unwrap(),
            r#"{"quote\"key":"line\nbreak"}"#
        );
    }
}
