//! Lenient deserializers for server payloads.
//!
//! The backend is PHP-flavoured: booleans arrive as `true`, `1` or `"1"`,
//! lists arrive as `null`, and timestamps come either as RFC 3339 or as
//! `YYYY-MM-DD HH:MM:SS`. These helpers fold those variations into one shape.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Deserialize `null` as `T::default()`.
///
/// Combine with `#[serde(default)]` so that a missing key also yields the default.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Interpret a loosely-typed JSON value as a boolean flag.
///
/// Returns `None` for `null` and for shapes that carry no boolean meaning.
pub fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|n| n != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Boolean flag that defaults to `false` when missing, `null` or unrecognised.
pub fn bool_or_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_bool(&value).unwrap_or(false))
}

/// Boolean flag that defaults to `true` when missing, `null` or unrecognised.
pub fn bool_or_true<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_bool(&value).unwrap_or(true))
}

/// `true`, used as a `#[serde(default = ...)]` target.
pub fn default_true() -> bool {
    true
}

/// Parse a timestamp in either RFC 3339 or `YYYY-MM-DD HH:MM:SS` (assumed UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Optional timestamp that degrades to `None` instead of failing the payload.
pub fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(raw)) => parse_timestamp(&raw),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    #[test]
    fn test_coerce_bool_variants() {
        assert_eq!(coerce_bool(&json!(true)), Some(true));
        assert_eq!(coerce_bool(&json!(1)), Some(true));
        assert_eq!(coerce_bool(&json!(0)), Some(false));
        assert_eq!(coerce_bool(&json!("1")), Some(true));
        assert_eq!(coerce_bool(&json!("TRUE")), Some(true));
        assert_eq!(coerce_bool(&json!("false")), Some(false));
        assert_eq!(coerce_bool(&json!(null)), None);
        assert_eq!(coerce_bool(&json!("maybe")), None);
        assert_eq!(coerce_bool(&json!([true])), None);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let rfc = parse_timestamp("2024-03-01T09:30:00Z").unwrap();
        assert_eq!((rfc.year(), rfc.month(), rfc.hour()), (2024, 3, 9));

        let offset = parse_timestamp("2024-03-01T09:30:00+02:00").unwrap();
        assert_eq!(offset.hour(), 7);

        let laravel = parse_timestamp("2024-03-01 09:30:00").unwrap();
        assert_eq!(laravel.minute(), 30);

        assert!(parse_timestamp("yesterday").is_none());
    }
}
