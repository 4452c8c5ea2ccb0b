//! Typed extraction of server value records.
//!
//! Each field kind has one resolver registered in [`resolver_for`]. Resolvers
//! are total: malformed input degrades to the kind's empty value.

use serde_json::Value;
use tracing::warn;

use custom_fields_shared::{FieldDefinition, FieldKind, TypedValue, ValueRecord};

/// Converts a present record into a typed value for one field kind.
pub type Resolver = fn(&ValueRecord) -> TypedValue;

/// The value a field holds when it has no stored record.
pub fn empty_value(kind: FieldKind) -> TypedValue {
    match kind {
        FieldKind::Boolean => TypedValue::Boolean(false),
        FieldKind::Multiselect => TypedValue::List(Vec::new()),
        FieldKind::File | FieldKind::Compliance => TypedValue::Empty,
        FieldKind::Text
        | FieldKind::Email
        | FieldKind::Phone
        | FieldKind::Textarea
        | FieldKind::Number
        | FieldKind::Decimal
        | FieldKind::Date
        | FieldKind::Datetime
        | FieldKind::Time
        | FieldKind::Select
        | FieldKind::Dropdown
        | FieldKind::Radio
        | FieldKind::Json
        | FieldKind::Unknown => TypedValue::Text(String::new()),
    }
}

/// The resolver registered for a field kind.
pub fn resolver_for(kind: FieldKind) -> Resolver {
    match kind {
        FieldKind::Boolean => resolve_boolean,
        FieldKind::Number | FieldKind::Decimal => resolve_number,
        FieldKind::Date | FieldKind::Datetime | FieldKind::Time => resolve_text,
        FieldKind::File => resolve_file,
        FieldKind::Select | FieldKind::Dropdown | FieldKind::Radio => resolve_text,
        FieldKind::Multiselect => resolve_multiselect,
        FieldKind::Json => resolve_json,
        FieldKind::Compliance => resolve_compliance,
        FieldKind::Text
        | FieldKind::Email
        | FieldKind::Phone
        | FieldKind::Textarea
        | FieldKind::Unknown => resolve_text,
    }
}

/// Convert a field's stored record into its in-memory typed value.
///
/// A missing record yields [`empty_value`]; this never fails.
pub fn extract_value(field: &FieldDefinition, record: Option<&ValueRecord>) -> TypedValue {
    match record {
        None => empty_value(field.kind),
        Some(record) => resolver_for(field.kind)(record),
    }
}

/// Bring an edited value into the shape `kind` stores.
///
/// Unambiguous inputs are converted (`"42"` on a number field becomes
/// `Number(42)`, `"true"` on a boolean becomes `Boolean(true)`, blanks become
/// the kind's empty value). Anything else is kept as given so validation can
/// report it; see [`accepts`].
pub fn coerce_edit(kind: FieldKind, value: TypedValue) -> TypedValue {
    let value = match value {
        TypedValue::Number(n) if !n.is_finite() => TypedValue::Text(String::new()),
        other => other,
    };
    if value.is_blank() && !text_valued(kind) {
        return empty_value(kind);
    }

    match (kind, value) {
        (FieldKind::Compliance, value) => value,
        (FieldKind::Number | FieldKind::Decimal, TypedValue::Text(text)) => {
            match text.trim().parse::<f64>() {
                Ok(n) if n.is_finite() => TypedValue::Number(n),
                _ => TypedValue::Text(text),
            }
        }
        (FieldKind::Boolean, TypedValue::Text(text)) => match text.trim().to_lowercase().as_str() {
            "true" => TypedValue::Boolean(true),
            "false" => TypedValue::Boolean(false),
            _ => TypedValue::Text(text),
        },
        (FieldKind::Multiselect, TypedValue::Text(text)) => TypedValue::List(vec![text]),
        (FieldKind::File, TypedValue::Text(text)) => match text.trim().parse::<i64>() {
            Ok(file_id) => TypedValue::File(file_id),
            Err(_) => TypedValue::Text(text),
        },
        (FieldKind::File, TypedValue::Number(n)) if n.fract() == 0.0 => {
            TypedValue::File(n as i64)
        }
        (FieldKind::Json, TypedValue::Text(text)) => TypedValue::Json(
            serde_json::from_str(&text).unwrap_or(Value::String(text)),
        ),
        (FieldKind::Json, TypedValue::Json(value)) => TypedValue::Json(value),
        (FieldKind::Json, other) => TypedValue::Json(other.to_json()),
        (kind, value @ (TypedValue::Number(_) | TypedValue::Boolean(_)))
            if text_valued(kind) =>
        {
            TypedValue::Text(scalar_text(&value.to_json()))
        }
        (_, value) => value,
    }
}

/// Kinds whose values are held as plain text.
fn text_valued(kind: FieldKind) -> bool {
    matches!(empty_value(kind), TypedValue::Text(_))
        && !matches!(kind, FieldKind::Number | FieldKind::Decimal | FieldKind::Json)
}

/// Whether `value` has a variant `kind` can hold.
///
/// Number fields accept text here; whether that text parses is a separate check.
pub fn accepts(kind: FieldKind, value: &TypedValue) -> bool {
    match (kind, value) {
        (_, TypedValue::Empty) => true,
        (FieldKind::Boolean, TypedValue::Boolean(_)) => true,
        (FieldKind::Number | FieldKind::Decimal, TypedValue::Number(_) | TypedValue::Text(_)) => {
            true
        }
        (FieldKind::Multiselect, TypedValue::List(_)) => true,
        (FieldKind::File, TypedValue::File(_)) => true,
        (FieldKind::Json, TypedValue::Json(_) | TypedValue::Text(_)) => true,
        (FieldKind::Compliance, _) => true,
        (kind, TypedValue::Text(_)) => text_valued(kind),
        _ => false,
    }
}

/// Stringify a scalar JSON value; `null` becomes the empty string.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn resolve_text(record: &ValueRecord) -> TypedValue {
    TypedValue::Text(record.value.as_ref().map(scalar_text).unwrap_or_default())
}

fn resolve_boolean(record: &ValueRecord) -> TypedValue {
    let truthy = match &record.value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    };
    TypedValue::Boolean(truthy)
}

fn resolve_number(record: &ValueRecord) -> TypedValue {
    let parsed = match &record.value {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(Value::Bool(b)) => Some(if *b { 1.0 } else { 0.0 }),
        Some(_) => None,
    };
    match parsed {
        Some(n) if n.is_finite() => TypedValue::Number(n),
        _ => TypedValue::Text(String::new()),
    }
}

fn resolve_file(record: &ValueRecord) -> TypedValue {
    if let Some(file_id) = record.file_id {
        return TypedValue::File(file_id);
    }
    // Legacy records carried the file reference in `value`.
    let legacy = match &record.value {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    match legacy {
        Some(file_id) => TypedValue::File(file_id),
        None => {
            if record.value.as_ref().is_some_and(|v| !v.is_null()) {
                warn!("Unrecognised file reference in value record");
            }
            TypedValue::Empty
        }
    }
}

fn resolve_multiselect(record: &ValueRecord) -> TypedValue {
    let items = match &record.value {
        Some(Value::Array(items)) => items
            .iter()
            .filter(|item| !item.is_null())
            .map(scalar_text)
            .collect(),
        Some(scalar) => {
            let text = scalar_text(scalar);
            if text.is_empty() {
                Vec::new()
            } else {
                vec![text]
            }
        }
        None => Vec::new(),
    };
    TypedValue::List(items)
}

fn resolve_json(record: &ValueRecord) -> TypedValue {
    match &record.value {
        None | Some(Value::Null) => TypedValue::Text(String::new()),
        Some(value) => TypedValue::Json(value.clone()),
    }
}

fn resolve_compliance(_record: &ValueRecord) -> TypedValue {
    TypedValue::Empty
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ALL_KINDS: [FieldKind; 18] = [
        FieldKind::Text,
        FieldKind::Email,
        FieldKind::Phone,
        FieldKind::Number,
        FieldKind::Decimal,
        FieldKind::Textarea,
        FieldKind::Date,
        FieldKind::Datetime,
        FieldKind::Time,
        FieldKind::Boolean,
        FieldKind::Select,
        FieldKind::Dropdown,
        FieldKind::Radio,
        FieldKind::Multiselect,
        FieldKind::File,
        FieldKind::Json,
        FieldKind::Compliance,
        FieldKind::Unknown,
    ];

    fn field(kind: FieldKind) -> FieldDefinition {
        FieldDefinition::new(1, "f", kind)
    }

    fn extract(kind: FieldKind, value: Value) -> TypedValue {
        extract_value(&field(kind), Some(&ValueRecord::new(value)))
    }

    #[test]
    fn test_missing_record_yields_canonical_empty() {
        for kind in ALL_KINDS {
            let first = extract_value(&field(kind), None);
            assert_eq!(first, empty_value(kind), "kind {:?}", kind);
            assert_eq!(extract_value(&field(kind), None), first);
            assert!(!matches!(first, TypedValue::Json(Value::Null)));
        }
        assert_eq!(empty_value(FieldKind::Boolean), TypedValue::Boolean(false));
        assert_eq!(empty_value(FieldKind::Multiselect), TypedValue::List(vec![]));
        assert_eq!(empty_value(FieldKind::File), TypedValue::Empty);
        assert_eq!(empty_value(FieldKind::Text), TypedValue::Text(String::new()));
    }

    #[test]
    fn test_boolean_coercion() {
        assert_eq!(extract(FieldKind::Boolean, json!(true)), TypedValue::Boolean(true));
        assert_eq!(extract(FieldKind::Boolean, json!("true")), TypedValue::Boolean(true));
        assert_eq!(extract(FieldKind::Boolean, json!("yes")), TypedValue::Boolean(false));
        assert_eq!(extract(FieldKind::Boolean, json!(1)), TypedValue::Boolean(false));
        assert_eq!(extract(FieldKind::Boolean, json!(null)), TypedValue::Boolean(false));
    }

    #[test]
    fn test_number_never_yields_nan() {
        assert_eq!(extract(FieldKind::Number, json!(42)), TypedValue::Number(42.0));
        assert_eq!(extract(FieldKind::Decimal, json!("3.5")), TypedValue::Number(3.5));
        assert_eq!(
            extract(FieldKind::Number, json!("abc")),
            TypedValue::Text(String::new())
        );
        assert_eq!(
            extract(FieldKind::Number, json!("NaN")),
            TypedValue::Text(String::new())
        );
        assert_eq!(extract(FieldKind::Number, json!("")), TypedValue::Text(String::new()));
        assert_eq!(extract(FieldKind::Number, json!([1])), TypedValue::Text(String::new()));
    }

    #[test]
    fn test_dates_pass_through_unmodified() {
        assert_eq!(
            extract(FieldKind::Datetime, json!("2024-03-01T10:00:00+02:00")),
            TypedValue::Text("2024-03-01T10:00:00+02:00".to_string())
        );
        assert_eq!(extract(FieldKind::Time, json!("09:30")), TypedValue::from("09:30"));
    }

    #[test]
    fn test_file_prefers_file_id_then_legacy_value() {
        let record = ValueRecord {
            value: Some(json!(5)),
            file_id: Some(9),
        };
        assert_eq!(
            extract_value(&field(FieldKind::File), Some(&record)),
            TypedValue::File(9)
        );
        assert_eq!(extract(FieldKind::File, json!(5)), TypedValue::File(5));
        assert_eq!(extract(FieldKind::File, json!("7")), TypedValue::File(7));
        assert_eq!(extract(FieldKind::File, json!({"x": 1})), TypedValue::Empty);
    }

    #[test]
    fn test_multiselect_wraps_scalars() {
        assert_eq!(
            extract(FieldKind::Multiselect, json!(["a", "b"])),
            TypedValue::List(vec!["a".into(), "b".into()])
        );
        assert_eq!(
            extract(FieldKind::Multiselect, json!("a")),
            TypedValue::List(vec!["a".into()])
        );
        assert_eq!(extract(FieldKind::Multiselect, json!("")), TypedValue::List(vec![]));
        assert_eq!(extract(FieldKind::Multiselect, json!(null)), TypedValue::List(vec![]));
    }

    #[test]
    fn test_select_and_unknown_stringify() {
        assert_eq!(extract(FieldKind::Select, json!("gold")), TypedValue::from("gold"));
        assert_eq!(extract(FieldKind::Unknown, json!(12)), TypedValue::from("12"));
        assert_eq!(extract(FieldKind::Text, json!(null)), TypedValue::from(""));
    }

    #[test]
    fn test_json_passthrough() {
        assert_eq!(
            extract(FieldKind::Json, json!({"a": [1, 2]})),
            TypedValue::Json(json!({"a": [1, 2]}))
        );
        assert_eq!(extract(FieldKind::Json, json!(null)), TypedValue::from(""));
    }

    #[test]
    fn test_edits_follow_field_kind() {
        assert_eq!(
            coerce_edit(FieldKind::Number, TypedValue::from("42")),
            TypedValue::Number(42.0)
        );
        assert_eq!(
            coerce_edit(FieldKind::Number, TypedValue::from("4x")),
            TypedValue::from("4x")
        );
        assert_eq!(
            coerce_edit(FieldKind::Boolean, TypedValue::from(" TRUE ")),
            TypedValue::Boolean(true)
        );
        assert_eq!(
            coerce_edit(FieldKind::Boolean, TypedValue::from("banana")),
            TypedValue::from("banana")
        );
        assert_eq!(
            coerce_edit(FieldKind::Boolean, TypedValue::from("")),
            TypedValue::Boolean(false)
        );
        assert_eq!(
            coerce_edit(FieldKind::Text, TypedValue::Number(7.0)),
            TypedValue::from("7")
        );
        assert_eq!(
            coerce_edit(FieldKind::Multiselect, TypedValue::from("a")),
            TypedValue::List(vec!["a".into()])
        );
        assert_eq!(
            coerce_edit(FieldKind::File, TypedValue::from("")),
            TypedValue::Empty
        );
        assert_eq!(
            coerce_edit(FieldKind::Json, TypedValue::from("{\"a\":1}")),
            TypedValue::Json(json!({"a": 1}))
        );
        assert_eq!(
            coerce_edit(FieldKind::Text, TypedValue::Number(f64::NAN)),
            TypedValue::from("")
        );
    }

    #[test]
    fn test_accepts_matching_variants_only() {
        assert!(accepts(FieldKind::Boolean, &TypedValue::Boolean(true)));
        assert!(!accepts(FieldKind::Boolean, &TypedValue::from("banana")));
        assert!(accepts(FieldKind::Number, &TypedValue::from("12")));
        assert!(!accepts(FieldKind::Number, &TypedValue::Boolean(true)));
        assert!(accepts(FieldKind::Email, &TypedValue::from("a@b.co")));
        assert!(!accepts(FieldKind::Email, &TypedValue::List(vec![])));
        assert!(!accepts(FieldKind::Multiselect, &TypedValue::from("a")));
        assert!(!accepts(FieldKind::File, &TypedValue::from("doc.pdf")));
    }

    #[test]
    fn test_compliance_never_extracts_scalar() {
        assert_eq!(extract(FieldKind::Compliance, json!("x")), TypedValue::Empty);
    }
}
