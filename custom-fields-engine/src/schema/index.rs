//! In-memory index over the section/subsection/field tree.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::{debug, warn};

use custom_fields_shared::{
    FieldDefinition, FieldId, HierarchyResponse, SectionDefinition, SectionId,
    SubsectionDefinition, SubsectionId,
};

/// Display name of the synthetic section holding orphaned fields.
pub const GENERAL_SECTION_NAME: &str = "General Information";

/// Where a rendered section comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "origin", content = "id", rename_all = "snake_case")]
pub enum SectionOrigin {
    /// A section defined in the hierarchy response.
    Schema(SectionId),
    /// The synthetic bucket of orphaned fields, always rendered last.
    General,
}

/// Where a field sits in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldPlacement {
    pub section: SectionOrigin,
    pub subsection: Option<SubsectionId>,
    /// Whether the field lives in a repeatable subsection and so is stored per entry.
    pub repeatable: bool,
    /// Whether the field and its section are both active.
    pub renderable: bool,
}

#[derive(Debug, Clone)]
pub struct IndexedSubsection {
    pub id: SubsectionId,
    pub label: String,
    pub description: Option<String>,
    pub is_repeatable: bool,
    /// Active fields, ordered by `sort_order`.
    pub field_ids: Vec<FieldId>,
}

#[derive(Debug, Clone)]
pub struct IndexedSection {
    pub origin: SectionOrigin,
    pub name: String,
    pub description: Option<String>,
    pub is_collapsible: bool,
    pub collapsed_by_default: bool,
    /// Active direct fields, ordered by `sort_order`.
    pub direct_field_ids: Vec<FieldId>,
    pub subsections: Vec<IndexedSubsection>,
}

/// Immutable-per-load index of every field definition.
///
/// Inactive fields and fields of inactive sections stay addressable through
/// [`SchemaIndex::field`] so relationships can resolve against them, but they
/// never appear in [`SchemaIndex::sections`] or in the slug map.
#[derive(Debug, Clone, Default)]
pub struct SchemaIndex {
    fields: HashMap<FieldId, FieldDefinition>,
    placements: HashMap<FieldId, FieldPlacement>,
    repeatable_subsections: HashMap<SubsectionId, bool>,
    sections: Vec<IndexedSection>,
}

fn sorted_fields(fields: &[FieldDefinition]) -> Vec<&FieldDefinition> {
    let mut sorted: Vec<&FieldDefinition> = fields.iter().collect();
    // `sort_by_key` is stable: equal sort orders keep response order.
    sorted.sort_by_key(|field| field.sort_order);
    sorted
}

impl SchemaIndex {
    /// Build the index from a hierarchy and the reconciled orphan list.
    ///
    /// The first definition seen for an id wins; later duplicates are dropped
    /// with a warning. Orphans become a trailing "General Information" section.
    pub fn build(hierarchy: &HierarchyResponse, orphans: &[FieldDefinition]) -> Self {
        let mut index = Self::default();

        let mut sections: Vec<&SectionDefinition> = hierarchy.sections.iter().collect();
        sections.sort_by_key(|section| section.sort_order);

        for section in sections {
            let origin = SectionOrigin::Schema(section.id);
            let direct_field_ids =
                index.insert_fields(&section.direct_fields, origin, None, false, section.is_active);

            let mut subsections: Vec<&SubsectionDefinition> = section.subsections.iter().collect();
            subsections.sort_by_key(|subsection| subsection.sort_order);

            let subsections = subsections
                .into_iter()
                .map(|subsection| {
                    index
                        .repeatable_subsections
                        .entry(subsection.id)
                        .or_insert(subsection.is_repeatable);
                    IndexedSubsection {
                        id: subsection.id,
                        label: subsection.label.clone(),
                        description: subsection.description.clone(),
                        is_repeatable: subsection.is_repeatable,
                        field_ids: index.insert_fields(
                            &subsection.fields,
                            origin,
                            Some(subsection.id),
                            subsection.is_repeatable,
                            section.is_active,
                        ),
                    }
                })
                .collect();

            if section.is_active {
                index.sections.push(IndexedSection {
                    origin,
                    name: section.name.clone(),
                    description: section.description.clone(),
                    is_collapsible: section.is_collapsible,
                    collapsed_by_default: section.collapsed_by_default,
                    direct_field_ids,
                    subsections,
                });
            }
        }

        let general_ids = index.insert_fields(orphans, SectionOrigin::General, None, false, true);
        if !general_ids.is_empty() {
            index.sections.push(IndexedSection {
                origin: SectionOrigin::General,
                name: GENERAL_SECTION_NAME.to_string(),
                description: None,
                is_collapsible: false,
                collapsed_by_default: false,
                direct_field_ids: general_ids,
                subsections: Vec::new(),
            });
        }

        debug!(
            field_count = index.fields.len(),
            section_count = index.sections.len(),
            "Built schema index"
        );
        index
    }

    /// Insert a container's fields and return the ids of the renderable ones in order.
    fn insert_fields(
        &mut self,
        fields: &[FieldDefinition],
        section: SectionOrigin,
        subsection: Option<SubsectionId>,
        repeatable: bool,
        section_active: bool,
    ) -> Vec<FieldId> {
        let mut rendered = Vec::new();
        for field in sorted_fields(fields) {
            if self.fields.contains_key(&field.id) {
                warn!(
                    field_id = field.id,
                    slug = %field.slug,
                    "Duplicate field id in hierarchy, keeping the first definition"
                );
                continue;
            }

            let renderable = section_active && field.is_active;
            self.fields.insert(field.id, field.clone());
            self.placements.insert(
                field.id,
                FieldPlacement {
                    section,
                    subsection,
                    repeatable,
                    renderable,
                },
            );
            if renderable {
                rendered.push(field.id);
            }
        }
        rendered
    }

    pub fn field(&self, id: FieldId) -> Option<&FieldDefinition> {
        self.fields.get(&id)
    }

    pub fn contains(&self, id: FieldId) -> bool {
        self.fields.contains_key(&id)
    }

    pub fn placement(&self, id: FieldId) -> Option<&FieldPlacement> {
        self.placements.get(&id)
    }

    /// The subsection a field belongs to, or `None` for direct and orphaned fields.
    pub fn parent_of(&self, id: FieldId) -> Option<SubsectionId> {
        self.placements.get(&id).and_then(|p| p.subsection)
    }

    /// Whether `id` names a repeatable subsection.
    pub fn is_repeatable_subsection(&self, id: SubsectionId) -> bool {
        self.repeatable_subsections.get(&id).copied().unwrap_or(false)
    }

    /// Active sections in render order, the general bucket last.
    pub fn sections(&self) -> &[IndexedSection] {
        &self.sections
    }

    /// Every indexed definition, including inactive ones.
    pub fn all_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.values()
    }

    /// Renderable field ids in render order, repeatable subsections included.
    pub fn render_order(&self) -> impl Iterator<Item = FieldId> + '_ {
        self.sections.iter().flat_map(|section| {
            section.direct_field_ids.iter().copied().chain(
                section
                    .subsections
                    .iter()
                    .flat_map(|subsection| subsection.field_ids.iter().copied()),
            )
        })
    }

    /// Renderable fields of one repeatable subsection, in order.
    pub fn subsection_fields(&self, id: SubsectionId) -> Vec<&FieldDefinition> {
        self.sections
            .iter()
            .flat_map(|section| section.subsections.iter())
            .find(|subsection| subsection.id == id)
            .map(|subsection| {
                subsection
                    .field_ids
                    .iter()
                    .filter_map(|field_id| self.fields.get(field_id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether a field holds an entity-level scalar value: not compliance and
    /// not stored per group entry. Inactive fields still hold values so mirrors
    /// can read from them.
    pub fn holds_scalar(&self, id: FieldId) -> bool {
        match (self.fields.get(&id), self.placements.get(&id)) {
            (Some(field), Some(placement)) => field.kind.is_scalar() && !placement.repeatable,
            _ => false,
        }
    }

    /// The field id to slug map used for scalar diffing.
    ///
    /// Contains exactly the renderable, entity-level, non-compliance fields.
    pub fn field_id_to_slug(&self) -> BTreeMap<FieldId, String> {
        self.placements
            .iter()
            .filter(|(id, placement)| placement.renderable && self.holds_scalar(**id))
            .filter_map(|(id, _)| self.fields.get(id).map(|field| (*id, field.slug.clone())))
            .collect()
    }
}
