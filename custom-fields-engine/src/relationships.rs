//! Mirror-field relationships: read-fallback, write-propagation and grouping.
//!
//! Propagation is strictly one hop. A field that both mirrors another and is
//! itself mirrored is not chased further: relationship chains and cycles are
//! unsupported and degrade to one-hop behavior.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use custom_fields_shared::{FieldId, TypedValue};

use crate::schema::SchemaIndex;
use crate::values::ValueMap;

/// Mirror relationships declared by the indexed fields.
#[derive(Debug, Clone, Default)]
pub struct RelationshipIndex {
    target_of: HashMap<FieldId, FieldId>,
    mirrors_of: BTreeMap<FieldId, Vec<FieldId>>,
}

impl RelationshipIndex {
    /// Collect every declared relationship, inactive fields included.
    pub fn build(schema: &SchemaIndex) -> Self {
        let mut index = Self::default();
        let mut fields: Vec<_> = schema.all_fields().collect();
        fields.sort_by_key(|field| field.id);

        for field in fields {
            let Some(target) = field.mirror_target() else {
                continue;
            };
            if target == field.id {
                continue;
            }
            index.target_of.insert(field.id, target);
            index.mirrors_of.entry(target).or_default().push(field.id);
        }
        index
    }

    /// The field a mirror copies from.
    pub fn target_of(&self, id: FieldId) -> Option<FieldId> {
        self.target_of.get(&id).copied()
    }

    /// Every field mirroring `id`, by ascending id.
    pub fn mirrors_of(&self, id: FieldId) -> &[FieldId] {
        self.mirrors_of.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_targeted(&self, id: FieldId) -> bool {
        self.mirrors_of.contains_key(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.target_of.is_empty()
    }

    /// Fill empty mirrors from their targets' loaded values.
    ///
    /// `stored_blank` reports whether a mirror had no usable record of its
    /// own. Targets are read from the values as loaded, before any fallback,
    /// so the fill never travels more than one hop. Returns the filled ids.
    pub fn apply_read_fallback(
        &self,
        values: &mut ValueMap,
        stored_blank: impl Fn(FieldId) -> bool,
    ) -> Vec<FieldId> {
        let fills: Vec<(FieldId, TypedValue)> = self
            .target_of
            .iter()
            .filter(|(mirror, _)| values.contains_key(*mirror) && stored_blank(**mirror))
            .filter_map(|(mirror, target)| {
                values
                    .get(target)
                    .filter(|value| !value.is_blank())
                    .map(|value| (*mirror, value.clone()))
            })
            .collect();

        let mut filled: Vec<FieldId> = fills.iter().map(|(id, _)| *id).collect();
        for (mirror, value) in fills {
            values.insert(mirror, value);
        }
        filled.sort_unstable();
        filled
    }

    /// Copy `value` into every mirror of `source` that holds a value slot.
    ///
    /// One hop only: mirrors of the mirrors are left alone. Returns the
    /// updated mirror ids.
    pub fn propagate(
        &self,
        values: &mut ValueMap,
        source: FieldId,
        value: &TypedValue,
    ) -> Vec<FieldId> {
        let mut updated = Vec::new();
        for mirror in self.mirrors_of(source) {
            if let Some(slot) = values.get_mut(mirror) {
                *slot = value.clone();
                updated.push(*mirror);
            }
        }
        updated
    }

    /// Partition a container's fields for presentation.
    ///
    /// Fields with no relationship in either direction stay standalone. The
    /// others gather into one group per target, placed where the group's first
    /// field appears. A group carries its target only when the target is in
    /// `field_ids` and is not itself a mirror; groups left with neither target
    /// nor members are dropped.
    pub fn partition(&self, field_ids: &[FieldId]) -> Vec<FieldGroup> {
        let mut groups: Vec<FieldGroup> = Vec::new();
        let mut group_slot: HashMap<FieldId, usize> = HashMap::new();

        for &id in field_ids {
            let key = match self.target_of(id) {
                Some(target) => target,
                None if self.is_targeted(id) => id,
                None => {
                    groups.push(FieldGroup::Standalone(id));
                    continue;
                }
            };

            let slot = *group_slot.entry(key).or_insert_with(|| {
                groups.push(FieldGroup::Related {
                    target_field_id: key,
                    target: None,
                    members: Vec::new(),
                });
                groups.len() - 1
            });

            if let FieldGroup::Related {
                target, members, ..
            } = &mut groups[slot]
            {
                if id == key {
                    *target = Some(id);
                } else {
                    members.push(id);
                }
            }
        }

        groups.retain(|group| match group {
            FieldGroup::Standalone(_) => true,
            FieldGroup::Related {
                target, members, ..
            } => target.is_some() || !members.is_empty(),
        });
        groups
    }
}

/// One presentation unit produced by [`RelationshipIndex::partition`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldGroup {
    Standalone(FieldId),
    Related {
        target_field_id: FieldId,
        /// The target field, when it is rendered in the same container.
        target: Option<FieldId>,
        members: Vec<FieldId>,
    },
}
