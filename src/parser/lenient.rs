//! Lenient numeric decoding shared by every numeric template field
//!
//! Template producers encode numbers either as JSON numbers (`5`) or as JSON
//! strings (`"5"`). Both are accepted. Anything else decodes to `None`, which
//! the field's default then replaces, so a single malformed value never
//! invalidates the whole template.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Coerce a JSON value into an integer.
///
/// Strings are trimmed and parsed as integers first, then as finite floats
/// (truncated). Numbers use their integer form when available, else their
/// truncated float form.
pub fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        }
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite())
                .map(|f| f.trunc() as i64)
        }),
        _ => None,
    }
}

/// Coerce a JSON value into an integer, falling back to `0`
pub fn coerce_int_or_zero(value: &Value) -> i64 {
    coerce_int(value).unwrap_or(0)
}

/// `deserialize_with` adapter for required-with-default integer fields
pub fn int<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_int_or_zero(&value))
}

/// `deserialize_with` adapter for optional integer fields
///
/// A present-but-malformed value decodes to `None`, so the caller's default
/// applies exactly as if the field were absent.
pub fn opt_int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_int(&value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Sample {
        #[serde(default, deserialize_with = "int")]
        value: i64,
        #[serde(default, deserialize_with = "opt_int")]
        size: Option<i64>,
    }

    fn sample(json: Value) -> Sample {
        serde_json::from_value(json).expect("lenient decode never fails")
    }

    #[test]
    fn test_string_number() {
        assert_eq!(sample(json!({"value": "5"})).value, 5);
    }

    #[test]
    fn test_native_number() {
        assert_eq!(sample(json!({"value": 5})).value, 5);
    }

    #[test]
    fn test_garbage_string_defaults_to_zero() {
        assert_eq!(sample(json!({"value": "abc"})).value, 0);
    }

    #[test]
    fn test_float_values_truncate() {
        assert_eq!(sample(json!({"value": 12.9})).value, 12);
        assert_eq!(sample(json!({"value": " 7.5 "})).value, 7);
    }

    #[test]
    fn test_other_json_types_default() {
        assert_eq!(sample(json!({"value": true})).value, 0);
        assert_eq!(sample(json!({"value": null})).value, 0);
        assert_eq!(sample(json!({"value": [1]})).value, 0);
        assert_eq!(sample(json!({"value": {"n": 1}})).value, 0);
    }

    #[test]
    fn test_optional_fields() {
        assert_eq!(sample(json!({})).size, None);
        assert_eq!(sample(json!({"size": "18"})).size, Some(18));
        assert_eq!(sample(json!({"size": "big"})).size, None);
    }
}
