//! Change detection between the load snapshot and the edited state.

use std::collections::BTreeMap;

use serde_json::Value;

use custom_fields_shared::{FieldId, FieldUpdate, TypedValue};

/// Field values keyed by field id.
pub type ValueMap = BTreeMap<FieldId, TypedValue>;

/// Field id to persistence slug, for the fields that take part in a diff.
pub type SlugMap = BTreeMap<FieldId, String>;

fn normalized(map: &ValueMap, id: FieldId) -> Option<&TypedValue> {
    map.get(&id).and_then(TypedValue::normalized)
}

/// Whether one field differs between the two maps after normalisation.
pub fn field_changed(initial: &ValueMap, current: &ValueMap, id: FieldId) -> bool {
    normalized(initial, id) != normalized(current, id)
}

/// The minimal set of `(slug, value)` updates turning `initial` into `current`.
///
/// Only fields present in `field_id_to_slug` are considered. An empty or
/// absent current value is emitted as an explicit JSON `null`. Updates are
/// ordered by field id.
pub fn compute_diff(
    initial: &ValueMap,
    current: &ValueMap,
    field_id_to_slug: &SlugMap,
) -> Vec<FieldUpdate> {
    field_id_to_slug
        .iter()
        .filter(|(id, _)| field_changed(initial, current, **id))
        .map(|(id, slug)| {
            let value = normalized(current, *id)
                .map(TypedValue::to_json)
                .unwrap_or(Value::Null);
            FieldUpdate::new(slug.clone(), value)
        })
        .collect()
}

/// Whether [`compute_diff`] would produce at least one update.
pub fn has_changes(initial: &ValueMap, current: &ValueMap, field_id_to_slug: &SlugMap) -> bool {
    field_id_to_slug
        .keys()
        .any(|id| field_changed(initial, current, *id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn slugs(ids: &[FieldId]) -> SlugMap {
        ids.iter().map(|id| (*id, format!("f{}", id))).collect()
    }

    #[test]
    fn test_unchanged_maps_produce_no_diff() {
        let map: ValueMap = [(1, TypedValue::from("a")), (2, TypedValue::Boolean(true))].into();
        assert!(compute_diff(&map, &map.clone(), &slugs(&[1, 2])).is_empty());
        assert!(!has_changes(&map, &map, &slugs(&[1, 2])));
    }

    #[test]
    fn test_empty_forms_are_equivalent() {
        let initial: ValueMap = [
            (1, TypedValue::from("")),
            (2, TypedValue::Empty),
            (4, TypedValue::Json(Value::Null)),
        ]
        .into();
        let current: ValueMap = [
            (1, TypedValue::Empty),
            (3, TypedValue::from("")),
            (4, TypedValue::from("")),
        ]
        .into();

        assert!(compute_diff(&initial, &current, &slugs(&[1, 2, 3, 4])).is_empty());
    }

    #[test]
    fn test_cleared_field_emits_explicit_null() {
        let initial: ValueMap = [(1, TypedValue::from("Acme"))].into();
        let current: ValueMap = [(1, TypedValue::from(""))].into();

        let diff = compute_diff(&initial, &current, &slugs(&[1]));
        assert_eq!(diff, vec![FieldUpdate::new("f1", Value::Null)]);
    }

    #[test]
    fn test_only_mapped_fields_are_diffed() {
        let initial = ValueMap::new();
        let current: ValueMap = [
            (1, TypedValue::from("x")),
            (2, TypedValue::Number(3.0)),
            (9, TypedValue::from("compliance")),
        ]
        .into();

        let diff = compute_diff(&initial, &current, &slugs(&[1, 2]));
        assert_eq!(
            diff,
            vec![
                FieldUpdate::new("f1", json!("x")),
                FieldUpdate::new("f2", json!(3)),
            ]
        );
    }

    #[test]
    fn test_boolean_and_list_changes() {
        let initial: ValueMap = [
            (1, TypedValue::Boolean(false)),
            (2, TypedValue::List(vec!["a".into()])),
        ]
        .into();
        let current: ValueMap = [
            (1, TypedValue::Boolean(true)),
            (2, TypedValue::List(vec![])),
        ]
        .into();

        let diff = compute_diff(&initial, &current, &slugs(&[1, 2]));
        assert_eq!(
            diff,
            vec![
                FieldUpdate::new("f1", json!(true)),
                FieldUpdate::new("f2", json!([])),
            ]
        );
    }
}
