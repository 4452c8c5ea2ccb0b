//! Projection of the engine state into a serializable render model.

use serde::Serialize;

use custom_fields_shared::{
    FieldDefinition, FieldId, FieldKind, FieldOption, SubsectionId, TypedValue,
};

use crate::compliance::ComplianceCard;
use crate::relationships::FieldGroup;
use crate::schema::{IndexedSection, IndexedSubsection, OrphanSource, SectionOrigin};
use crate::state::{EngineState, EntryState, SessionStatus};
use crate::values::field_changed;

/// Everything a UI needs to draw the form.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderModel {
    pub status: SessionStatus,
    pub has_unsaved_changes: bool,
    pub orphan_source: Option<OrphanSource>,
    pub sections: Vec<RenderSection>,
}

impl RenderModel {
    pub fn field_count(&self) -> usize {
        self.sections.iter().map(RenderSection::field_count).sum()
    }

    pub fn compliance_cards(&self) -> impl Iterator<Item = &ComplianceCard> {
        self.sections
            .iter()
            .flat_map(|section| {
                section
                    .items
                    .iter()
                    .chain(section.subsections.iter().flat_map(|s| s.items.iter()))
            })
            .filter_map(|item| match item {
                RenderItem::Compliance(card) => Some(card),
                _ => None,
            })
    }

    /// Find a rendered scalar field by id.
    pub fn field(&self, field_id: FieldId) -> Option<&RenderField> {
        self.sections
            .iter()
            .flat_map(|section| {
                section
                    .items
                    .iter()
                    .chain(section.subsections.iter().flat_map(|s| s.items.iter()))
            })
            .flat_map(RenderItem::fields)
            .find(|field| field.id == field_id)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderSection {
    /// Stable key: the section id, or `general` for orphans.
    pub key: String,
    pub origin: SectionOrigin,
    pub name: String,
    pub description: Option<String>,
    pub is_collapsible: bool,
    pub collapsed_by_default: bool,
    pub items: Vec<RenderItem>,
    pub subsections: Vec<RenderSubsection>,
}

impl RenderSection {
    fn field_count(&self) -> usize {
        let direct: usize = self.items.iter().map(RenderItem::field_count).sum();
        let nested: usize = self
            .subsections
            .iter()
            .map(|subsection| {
                subsection
                    .items
                    .iter()
                    .map(RenderItem::field_count)
                    .sum::<usize>()
                    + subsection.entries.iter().map(|e| e.fields.len()).sum::<usize>()
            })
            .sum();
        direct + nested
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderSubsection {
    pub id: SubsectionId,
    pub label: String,
    pub description: Option<String>,
    pub is_repeatable: bool,
    /// Fields of a non-repeatable subsection.
    pub items: Vec<RenderItem>,
    /// Entries of a repeatable subsection.
    pub entries: Vec<RenderEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RenderItem {
    Field(RenderField),
    /// A target and the fields mirroring it, drawn together.
    Group {
        target_field_id: FieldId,
        target: Option<RenderField>,
        members: Vec<RenderField>,
    },
    Compliance(ComplianceCard),
}

impl RenderItem {
    fn fields(&self) -> Box<dyn Iterator<Item = &RenderField> + '_> {
        match self {
            Self::Field(field) => Box::new(std::iter::once(field)),
            Self::Group {
                target, members, ..
            } => Box::new(target.iter().chain(members.iter())),
            Self::Compliance(_) => Box::new(std::iter::empty()),
        }
    }

    fn field_count(&self) -> usize {
        match self {
            Self::Compliance(_) => 1,
            other => other.fields().count(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderField {
    pub id: FieldId,
    pub slug: String,
    pub label: String,
    pub kind: FieldKind,
    pub is_required: bool,
    pub description: Option<String>,
    pub options: Vec<FieldOption>,
    pub value: TypedValue,
    /// The field this one mirrors, if any.
    pub mirrors: Option<FieldId>,
    pub is_dirty: bool,
    pub upload_in_progress: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderEntry {
    pub id: i64,
    pub label: String,
    pub is_dirty: bool,
    pub save_in_progress: bool,
    pub fields: Vec<RenderField>,
}

/// Build the render model for the current state.
///
/// Nothing is rendered until a load has succeeded.
pub fn build_render_model(state: &EngineState) -> RenderModel {
    let sections = if state.is_loaded() {
        state
            .schema()
            .sections()
            .iter()
            .map(|section| render_section(state, section))
            .collect()
    } else {
        Vec::new()
    };

    RenderModel {
        status: state.status(),
        has_unsaved_changes: state.has_unsaved_changes(),
        orphan_source: state.loaded.orphan_source,
        sections,
    }
}

fn render_section(state: &EngineState, section: &IndexedSection) -> RenderSection {
    RenderSection {
        key: match section.origin {
            SectionOrigin::Schema(id) => id.to_string(),
            SectionOrigin::General => "general".to_string(),
        },
        origin: section.origin,
        name: section.name.clone(),
        description: section.description.clone(),
        is_collapsible: section.is_collapsible,
        collapsed_by_default: section.collapsed_by_default,
        items: render_items(state, &section.direct_field_ids),
        subsections: section
            .subsections
            .iter()
            .map(|subsection| render_subsection(state, subsection))
            .collect(),
    }
}

fn render_subsection(state: &EngineState, subsection: &IndexedSubsection) -> RenderSubsection {
    let (items, entries) = if subsection.is_repeatable {
        let entries = state
            .entries
            .values()
            .filter(|entry| entry.entry.subsection_id == subsection.id)
            .map(|entry| render_entry(state, subsection, entry))
            .collect();
        (Vec::new(), entries)
    } else {
        (render_items(state, &subsection.field_ids), Vec::new())
    };

    RenderSubsection {
        id: subsection.id,
        label: subsection.label.clone(),
        description: subsection.description.clone(),
        is_repeatable: subsection.is_repeatable,
        items,
        entries,
    }
}

/// Compliance fields become cards in place; the rest are partitioned into
/// standalone fields and relationship groups.
fn render_items(state: &EngineState, field_ids: &[FieldId]) -> Vec<RenderItem> {
    let schema = state.schema();
    let mut items = Vec::new();
    let mut pending: Vec<FieldId> = Vec::new();

    for &id in field_ids {
        let Some(field) = schema.field(id) else {
            continue;
        };
        if field.is_compliance() {
            items.extend(flush(state, &mut pending));
            let in_flight = state.uploads_in_flight.contains(&id);
            items.push(RenderItem::Compliance(state.compliance.card(field, in_flight)));
        } else {
            pending.push(id);
        }
    }
    items.extend(flush(state, &mut pending));
    items
}

fn flush(state: &EngineState, pending: &mut Vec<FieldId>) -> Vec<RenderItem> {
    if pending.is_empty() {
        return Vec::new();
    }
    let ids = std::mem::take(pending);
    state
        .loaded
        .relationships
        .partition(&ids)
        .into_iter()
        .filter_map(|group| match group {
            FieldGroup::Standalone(id) => scalar_field(state, id).map(RenderItem::Field),
            FieldGroup::Related {
                target_field_id,
                target,
                members,
            } => Some(RenderItem::Group {
                target_field_id,
                target: target.and_then(|id| scalar_field(state, id)),
                members: members
                    .into_iter()
                    .filter_map(|id| scalar_field(state, id))
                    .collect(),
            }),
        })
        .collect()
}

fn field_view(field: &FieldDefinition, value: TypedValue) -> RenderField {
    RenderField {
        id: field.id,
        slug: field.slug.clone(),
        label: field.display_label().to_string(),
        kind: field.kind,
        is_required: field.is_required,
        description: field.description.clone(),
        options: field.options.clone(),
        value,
        mirrors: field.mirror_target(),
        is_dirty: false,
        upload_in_progress: false,
    }
}

fn scalar_field(state: &EngineState, id: FieldId) -> Option<RenderField> {
    let field = state.schema().field(id)?;
    let value = state.snapshot.current.get(&id).cloned().unwrap_or_default();
    let mut view = field_view(field, value);
    view.is_dirty = field_changed(&state.snapshot.initial, &state.snapshot.current, id);
    view.upload_in_progress = state.uploads_in_flight.contains(&id);
    Some(view)
}

fn render_entry(
    state: &EngineState,
    subsection: &IndexedSubsection,
    entry: &EntryState,
) -> RenderEntry {
    let fields = subsection
        .field_ids
        .iter()
        .filter_map(|id| state.schema().field(*id))
        .filter(|field| field.kind.is_scalar())
        .map(|field| {
            let value = entry.snapshot.current.get(&field.id).cloned().unwrap_or_default();
            let mut view = field_view(field, value);
            view.is_dirty = field_changed(&entry.snapshot.initial, &entry.snapshot.current, field.id);
            view
        })
        .collect();

    RenderEntry {
        id: entry.entry.id,
        label: entry.entry.label.clone(),
        is_dirty: state.entry_is_dirty(entry),
        save_in_progress: state.entries_in_flight.contains(&entry.entry.id),
        fields,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{apply_field_change, apply_load_success, LoadPayload};
    use custom_fields_shared::{
        HierarchyResponse, ManagementField, SectionDefinition, ValueRecord, ValuedField,
        ValuedSection, ValuesResponse,
    };
    use serde_json::json;

    fn text(id: FieldId) -> FieldDefinition {
        FieldDefinition::new(id, format!("f{}", id), FieldKind::Text)
    }

    fn state() -> EngineState {
        let fields = vec![
            text(1).with_label("Company"),
            text(2).mirroring(1),
            FieldDefinition::new(3, "dbs", FieldKind::Compliance),
            text(4),
        ];
        let hierarchy =
            HierarchyResponse::new(vec![SectionDefinition::new(1, "Main").with_fields(fields)]);
        let values = ValuesResponse {
            sections: vec![ValuedSection {
                id: 1,
                direct_fields: vec![ValuedField::new(
                    text(1),
                    Some(ValueRecord::new(json!("Acme"))),
                )],
                subsections: vec![],
            }],
            fields: None,
        };
        apply_load_success(LoadPayload {
            hierarchy,
            values,
            management: Some(vec![ManagementField::unassigned(text(9).with_label("Extra"))]),
            compliance: vec![],
        })
    }

    #[test]
    fn test_unloaded_state_renders_nothing() {
        let model = build_render_model(&EngineState::default());
        assert!(model.sections.is_empty());
        assert_eq!(model.status, SessionStatus::Idle);
    }

    #[test]
    fn test_items_split_around_compliance_cards() {
        let model = build_render_model(&state());
        let main = &model.sections[0];

        assert_eq!(main.items.len(), 3);
        assert!(matches!(
            &main.items[0],
            RenderItem::Group { target_field_id: 1, target: Some(_), members } if members.len() == 1
        ));
        assert!(matches!(&main.items[1], RenderItem::Compliance(card) if card.field_id == 3));
        assert!(matches!(&main.items[2], RenderItem::Field(field) if field.id == 4));
        assert_eq!(model.compliance_cards().count(), 1);
    }

    #[test]
    fn test_orphans_render_last_in_general_section() {
        let model = build_render_model(&state());
        let general = model.sections.last().unwrap();

        assert_eq!(general.key, "general");
        assert_eq!(general.origin, SectionOrigin::General);
        assert!(matches!(&general.items[0], RenderItem::Field(field) if field.label == "Extra"));
        assert_eq!(model.orphan_source, Some(OrphanSource::ManagementListing));
    }

    #[test]
    fn test_dirty_flags_follow_edits() {
        let edited = apply_field_change(&state(), 1, TypedValue::from("Acme Ltd")).unwrap();
        let model = build_render_model(&edited);

        assert!(model.has_unsaved_changes);
        assert_eq!(model.status, SessionStatus::Dirty);
        assert!(model.field(1).unwrap().is_dirty);
        assert_eq!(model.field(2).unwrap().value, TypedValue::from("Acme Ltd"));
        assert!(!model.field(4).unwrap().is_dirty);
    }
}
