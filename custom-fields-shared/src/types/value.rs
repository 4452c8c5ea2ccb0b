//! Value types: raw server records, typed in-memory values and updates.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::serde_helpers::null_as_default;
use crate::types::field::{EntryId, FieldId, SubsectionId};

/// The raw, server-shaped value payload for one field on one entity.
///
/// The canonical shape is `{ "value": .. }` (or `{ "fileId": .. }` for file
/// fields). Older servers returned the bare scalar instead; both parse into
/// the same record. An absent record means the field has no stored value,
/// which is not the same as an explicit `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value")]
#[serde(rename_all = "camelCase")]
pub struct ValueRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<i64>,
}

const RECORD_KEYS: [&str; 3] = ["value", "fileId", "file_id"];

impl From<Value> for ValueRecord {
    fn from(raw: Value) -> Self {
        match raw {
            Value::Null => Self::default(),
            Value::Object(mut map)
                if map.is_empty() || RECORD_KEYS.iter().any(|key| map.contains_key(*key)) =>
            {
                let file_id = map
                    .remove("fileId")
                    .or_else(|| map.remove("file_id"))
                    .and_then(|id| id.as_i64().or_else(|| id.as_str()?.trim().parse().ok()));
                Self {
                    value: map.remove("value"),
                    file_id,
                }
            }
            // Legacy servers send the bare value instead of a record.
            other => Self {
                value: Some(other),
                file_id: None,
            },
        }
    }
}

impl ValueRecord {
    pub fn new(value: Value) -> Self {
        Self {
            value: Some(value),
            file_id: None,
        }
    }

    pub fn file(file_id: i64) -> Self {
        Self {
            value: None,
            file_id: Some(file_id),
        }
    }

    /// Whether the record carries nothing usable (`null` value and no file).
    pub fn is_blank(&self) -> bool {
        let value_blank = match &self.value {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty(),
            Some(Value::Array(items)) => items.is_empty(),
            Some(_) => false,
        };
        value_blank && self.file_id.is_none()
    }
}

/// An in-memory field value, typed according to the field's declared kind.
///
/// Serializes to the natural JSON form (`Empty` becomes `null`).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TypedValue {
    /// No value at all (an undefined file reference, or an explicit clear).
    Empty,
    Text(String),
    Boolean(bool),
    Number(f64),
    List(Vec<String>),
    File(i64),
    Json(Value),
}

impl TypedValue {
    /// Normalised view used for change detection.
    ///
    /// `Empty`, JSON `null` and the empty string collapse to `None`, so an empty
    /// string and an absent value never register as different.
    pub fn normalized(&self) -> Option<&TypedValue> {
        match self {
            Self::Empty => None,
            Self::Text(s) if s.is_empty() => None,
            Self::Json(Value::Null) => None,
            Self::Json(Value::String(s)) if s.is_empty() => None,
            other => Some(other),
        }
    }

    /// Whether two values are equal after normalisation.
    pub fn same_as(&self, other: &TypedValue) -> bool {
        self.normalized() == other.normalized()
    }

    /// Whether the value counts as "not filled in" for required-field checks.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Json(Value::Null) => true,
            Self::Boolean(_) | Self::Number(_) | Self::File(_) | Self::Json(_) => false,
        }
    }

    /// Convert to the JSON value sent to the server.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Empty => Value::Null,
            Self::Text(s) => Value::String(s.clone()),
            Self::Boolean(b) => Value::Bool(*b),
            Self::Number(n) => {
                if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                    Value::from(*n as i64)
                } else {
                    serde_json::Number::from_f64(*n)
                        .map(Value::Number)
                        .unwrap_or(Value::Null)
                }
            }
            Self::List(items) => Value::Array(items.iter().cloned().map(Value::String).collect()),
            Self::File(id) => Value::from(*id),
            Self::Json(value) => value.clone(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl Default for TypedValue {
    fn default() -> Self {
        Self::Empty
    }
}

impl From<&str> for TypedValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for TypedValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for TypedValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<f64> for TypedValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<Vec<String>> for TypedValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

/// One repetition of a repeatable subsection (one address, one DBS check).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupEntry {
    #[serde(alias = "entryId", alias = "entry_id")]
    pub id: EntryId,
    #[serde(default)]
    pub subsection_id: SubsectionId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub entity_type: String,
    #[serde(default)]
    pub entity_id: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub label: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub values: BTreeMap<FieldId, ValueRecord>,
}

impl GroupEntry {
    pub fn new(id: EntryId, subsection_id: SubsectionId, label: impl Into<String>) -> Self {
        Self {
            id,
            subsection_id,
            entity_type: String::new(),
            entity_id: None,
            label: label.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, field_id: FieldId, record: ValueRecord) -> Self {
        self.values.insert(field_id, record);
        self
    }
}

/// One `(slug, value)` pair of a submission diff.
///
/// `value` is `null` when the field is being cleared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldUpdate {
    pub slug: String,
    pub value: Value,
}

impl FieldUpdate {
    pub fn new(slug: impl Into<String>, value: Value) -> Self {
        Self {
            slug: slug.into(),
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_record_shapes() {
        let canonical: ValueRecord = serde_json::from_value(json!({ "value": "Acme" })).unwrap();
        assert_eq!(canonical.value, Some(json!("Acme")));

        let file: ValueRecord = serde_json::from_value(json!({ "fileId": 55 })).unwrap();
        assert_eq!(file.file_id, Some(55));
        assert!(file.value.is_none());

        let legacy: ValueRecord = serde_json::from_value(json!(["a", "b"])).unwrap();
        assert_eq!(legacy.value, Some(json!(["a", "b"])));

        let scalar: ValueRecord = serde_json::from_value(json!(false)).unwrap();
        assert_eq!(scalar.value, Some(json!(false)));

        let string_file: ValueRecord = serde_json::from_value(json!({ "file_id": "12" })).unwrap();
        assert_eq!(string_file.file_id, Some(12));

        let bare_object: ValueRecord = serde_json::from_value(json!({ "street": "1 High St" })).unwrap();
        assert_eq!(bare_object.value, Some(json!({ "street": "1 High St" })));
    }

    #[test]
    fn test_value_record_blank() {
        assert!(ValueRecord::default().is_blank());
        assert!(ValueRecord::new(json!("")).is_blank());
        assert!(ValueRecord::new(json!([])).is_blank());
        assert!(!ValueRecord::new(json!(0)).is_blank());
        assert!(!ValueRecord::file(3).is_blank());
    }

    #[test]
    fn test_normalisation_collapses_empty_forms() {
        assert!(TypedValue::Empty.same_as(&TypedValue::Text(String::new())));
        assert!(!TypedValue::Text(" ".into()).same_as(&TypedValue::Empty));
        assert!(!TypedValue::Boolean(false).same_as(&TypedValue::Empty));
        assert!(!TypedValue::List(vec![]).same_as(&TypedValue::Empty));
        assert!(TypedValue::Number(2.5).same_as(&TypedValue::Number(2.5)));
    }

    #[test]
    fn test_to_json() {
        assert_eq!(TypedValue::Number(3.0).to_json(), json!(3));
        assert_eq!(TypedValue::Number(2.5).to_json(), json!(2.5));
        assert_eq!(TypedValue::File(8).to_json(), json!(8));
        assert_eq!(
            TypedValue::List(vec!["a".into(), "b".into()]).to_json(),
            json!(["a", "b"])
        );
        assert_eq!(TypedValue::Empty.to_json(), Value::Null);
    }

    #[test]
    fn test_typed_value_serializes_naturally() {
        let encoded = serde_json::to_value(vec![
            TypedValue::Empty,
            TypedValue::Text("x".into()),
            TypedValue::Boolean(true),
        ])
        .unwrap();
        assert_eq!(encoded, json!([null, "x", true]));
    }

    #[test]
    fn test_blank_values() {
        assert!(TypedValue::Text("   ".into()).is_blank());
        assert!(TypedValue::List(vec![]).is_blank());
        assert!(!TypedValue::Boolean(false).is_blank());
        assert!(!TypedValue::File(1).is_blank());
    }
}
