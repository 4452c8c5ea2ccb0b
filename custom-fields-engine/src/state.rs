//! Engine state and the pure reducers that transform it.
//!
//! `EngineState` is a value: every transition takes the current state by
//! reference and returns the next one. The load-time structures live behind
//! `Arc`, so a transition only copies the value maps it touches.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use custom_fields_shared::{
    ComplianceFieldValue, EntryId, FieldDefinition, FieldId, FieldKind, FieldUpdate, GroupEntry,
    HierarchyResponse, ManagementField, SubsectionId, TypedValue, ValueRecord, ValuesResponse,
};

use crate::compliance::ComplianceIndex;
use crate::errors::EngineError;
use crate::relationships::RelationshipIndex;
use crate::schema::{reconcile_orphans, OrphanSource, SchemaIndex};
use crate::validation::validate_fields;
use crate::values::{coerce_edit, compute_diff, extract_value, has_changes, SlugMap, ValueMap};

/// Lifecycle phase of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Phase {
    /// Nothing requested yet.
    #[default]
    Idle,
    Loading,
    LoadFailed(String),
    Ready,
    Submitting,
}

/// Phase as seen by the embedding UI, with `Ready` split by dirtiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Loading,
    LoadFailed,
    Clean,
    Dirty,
    Submitting,
}

/// Everything fetched by one load.
#[derive(Debug, Clone, Default)]
pub struct LoadPayload {
    pub hierarchy: HierarchyResponse,
    pub values: ValuesResponse,
    pub management: Option<Vec<ManagementField>>,
    pub compliance: Vec<ComplianceFieldValue>,
}

/// Structures fixed for the lifetime of one load.
#[derive(Debug, Clone, Default)]
pub struct LoadedSchema {
    pub schema: SchemaIndex,
    pub relationships: RelationshipIndex,
    pub field_id_to_slug: SlugMap,
    pub orphan_source: Option<OrphanSource>,
    pub orphan_count: usize,
}

impl LoadedSchema {
    /// Slug map for the scalar fields of one repeatable subsection.
    pub fn entry_slugs(&self, subsection_id: SubsectionId) -> SlugMap {
        self.schema
            .subsection_fields(subsection_id)
            .into_iter()
            .filter(|field| field.kind.is_scalar())
            .map(|field| (field.id, field.slug.clone()))
            .collect()
    }
}

/// Initial and current values, captured at load and reset on save.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditSnapshot {
    pub initial: ValueMap,
    pub current: ValueMap,
}

impl EditSnapshot {
    fn captured(values: ValueMap) -> Self {
        Self {
            initial: values.clone(),
            current: values,
        }
    }

    pub fn diff(&self, slugs: &SlugMap) -> Vec<FieldUpdate> {
        compute_diff(&self.initial, &self.current, slugs)
    }

    pub fn is_dirty(&self, slugs: &SlugMap) -> bool {
        has_changes(&self.initial, &self.current, slugs)
    }
}

/// Working copy of one group entry.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryState {
    pub entry: GroupEntry,
    pub snapshot: EditSnapshot,
}

/// What a submission should send, decided before any request.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitPlan {
    NothingToUpdate,
    Send {
        updates: Vec<FieldUpdate>,
        /// The values being persisted; they become the new initial snapshot on success.
        submitted: ValueMap,
    },
}

#[derive(Debug, Clone, Default)]
pub struct EngineState {
    pub phase: Phase,
    pub loaded: Arc<LoadedSchema>,
    pub snapshot: EditSnapshot,
    pub entries: BTreeMap<EntryId, EntryState>,
    pub compliance: Arc<ComplianceIndex>,
    /// File and compliance fields with an upload outstanding.
    pub uploads_in_flight: BTreeSet<FieldId>,
    /// Group entries with a save or delete outstanding.
    pub entries_in_flight: BTreeSet<EntryId>,
    /// Repeatable subsections with an entry creation outstanding.
    pub subsections_in_flight: BTreeSet<SubsectionId>,
}

impl EngineState {
    /// Whether the schema and values are available.
    pub fn is_loaded(&self) -> bool {
        matches!(self.phase, Phase::Ready | Phase::Submitting)
    }

    pub fn require_loaded(&self) -> Result<(), EngineError> {
        if self.is_loaded() {
            Ok(())
        } else {
            Err(EngineError::NotReady)
        }
    }

    pub fn schema(&self) -> &SchemaIndex {
        &self.loaded.schema
    }

    /// Pending scalar updates.
    pub fn pending_updates(&self) -> Vec<FieldUpdate> {
        self.snapshot.diff(&self.loaded.field_id_to_slug)
    }

    pub fn entry_is_dirty(&self, entry: &EntryState) -> bool {
        entry
            .snapshot
            .is_dirty(&self.loaded.entry_slugs(entry.entry.subsection_id))
    }

    /// True when the scalar diff or any entry diff is non-empty.
    pub fn has_unsaved_changes(&self) -> bool {
        self.is_loaded()
            && (self.snapshot.is_dirty(&self.loaded.field_id_to_slug)
                || self.entries.values().any(|entry| self.entry_is_dirty(entry)))
    }

    pub fn status(&self) -> SessionStatus {
        match &self.phase {
            Phase::Idle => SessionStatus::Idle,
            Phase::Loading => SessionStatus::Loading,
            Phase::LoadFailed(_) => SessionStatus::LoadFailed,
            Phase::Submitting => SessionStatus::Submitting,
            Phase::Ready if self.has_unsaved_changes() => SessionStatus::Dirty,
            Phase::Ready => SessionStatus::Clean,
        }
    }

    /// A renderable field that holds an entity-level scalar value.
    fn editable_field(&self, field_id: FieldId) -> Result<&FieldDefinition, EngineError> {
        let schema = self.schema();
        let field = schema
            .field(field_id)
            .filter(|_| schema.placement(field_id).is_some_and(|p| p.renderable))
            .ok_or(EngineError::UnknownField(field_id))?;
        if field.is_compliance() {
            return Err(EngineError::compliance(
                field_id,
                "compliance fields change only through compliance actions",
            ));
        }
        if !schema.holds_scalar(field_id) {
            return Err(EngineError::UnknownField(field_id));
        }
        Ok(field)
    }

    /// A loaded compliance field.
    pub fn compliance_field(&self, field_id: FieldId) -> Result<&FieldDefinition, EngineError> {
        self.require_loaded()?;
        let field = self
            .schema()
            .field(field_id)
            .ok_or(EngineError::UnknownField(field_id))?;
        if !field.is_compliance() {
            return Err(EngineError::compliance(field_id, "not a compliance field"));
        }
        Ok(field)
    }
}

/// Enter `Loading`, discarding any previous load.
pub fn begin_load(state: &EngineState) -> Result<EngineState, EngineError> {
    match state.phase {
        Phase::Loading => return Err(EngineError::busy("a load is already in progress")),
        Phase::Submitting => return Err(EngineError::busy("a submission is in progress")),
        Phase::Idle | Phase::Ready | Phase::LoadFailed(_) => {}
    }
    if !state.uploads_in_flight.is_empty()
        || !state.entries_in_flight.is_empty()
        || !state.subsections_in_flight.is_empty()
    {
        return Err(EngineError::busy("uploads or entry requests are in progress"));
    }
    Ok(EngineState {
        phase: Phase::Loading,
        ..EngineState::default()
    })
}

pub fn apply_load_failure(message: impl Into<String>) -> EngineState {
    EngineState {
        phase: Phase::LoadFailed(message.into()),
        ..EngineState::default()
    }
}

/// Build the ready state from a successful load.
///
/// Reconciles orphans, indexes the schema, extracts every scalar value,
/// applies read-fallback and captures the result as both snapshots.
pub fn apply_load_success(payload: LoadPayload) -> EngineState {
    let LoadPayload {
        hierarchy,
        values,
        management,
        compliance,
    } = payload;

    let reconciliation = reconcile_orphans(&hierarchy, &values, management.as_deref());
    let schema = SchemaIndex::build(&hierarchy, &reconciliation.orphans);
    let relationships = RelationshipIndex::build(&schema);

    let mut stored: HashMap<FieldId, &ValueRecord> = HashMap::new();
    for valued in values.all_fields() {
        if let Some(record) = &valued.value {
            stored.entry(valued.definition.id).or_insert(record);
        }
    }

    let mut current: ValueMap = schema
        .all_fields()
        .filter(|field| schema.holds_scalar(field.id))
        .map(|field| (field.id, extract_value(field, stored.get(&field.id).copied())))
        .collect();

    let filled = relationships.apply_read_fallback(&mut current, |id| {
        stored.get(&id).map_or(true, |record| record.is_blank())
    });
    if !filled.is_empty() {
        debug!(filled = ?filled, "Mirror fields filled from their targets");
    }

    let mut entries = BTreeMap::new();
    for section in &values.sections {
        for subsection in &section.subsections {
            for entry in &subsection.entries {
                let subsection_id = if entry.subsection_id == 0 {
                    subsection.id
                } else {
                    entry.subsection_id
                };
                if !schema.is_repeatable_subsection(subsection_id) {
                    warn!(
                        entry_id = entry.id,
                        subsection_id, "Group entry for an unknown or non-repeatable subsection"
                    );
                    continue;
                }
                if entries.contains_key(&entry.id) {
                    warn!(entry_id = entry.id, "Duplicate group entry id");
                    continue;
                }
                let entry_values: ValueMap = schema
                    .subsection_fields(subsection_id)
                    .into_iter()
                    .filter(|field| field.kind.is_scalar())
                    .map(|field| (field.id, extract_value(field, entry.values.get(&field.id))))
                    .collect();
                let mut meta = entry.clone();
                meta.subsection_id = subsection_id;
                meta.values.clear();
                entries.insert(
                    entry.id,
                    EntryState {
                        entry: meta,
                        snapshot: EditSnapshot::captured(entry_values),
                    },
                );
            }
        }
    }

    let field_id_to_slug = schema.field_id_to_slug();
    let loaded = LoadedSchema {
        field_id_to_slug,
        orphan_source: Some(reconciliation.source),
        orphan_count: reconciliation.orphans.len(),
        relationships,
        schema,
    };

    EngineState {
        phase: Phase::Ready,
        loaded: Arc::new(loaded),
        snapshot: EditSnapshot::captured(current),
        entries,
        compliance: Arc::new(ComplianceIndex::build(&compliance)),
        uploads_in_flight: BTreeSet::new(),
        entries_in_flight: BTreeSet::new(),
        subsections_in_flight: BTreeSet::new(),
    }
}

/// Set a field's current value and propagate it one hop to its mirrors.
pub fn apply_field_change(
    state: &EngineState,
    field_id: FieldId,
    value: TypedValue,
) -> Result<EngineState, EngineError> {
    state.require_loaded()?;
    let field = state.editable_field(field_id)?;

    let value = coerce_edit(field.kind, value);
    let mut next = state.clone();
    let propagated = next
        .loaded
        .relationships
        .propagate(&mut next.snapshot.current, field_id, &value);
    next.snapshot.current.insert(field_id, value);
    if !propagated.is_empty() {
        debug!(field_id, mirrors = ?propagated, "Propagated field change");
    }
    Ok(next)
}

/// Decide what a submission sends and enter `Submitting` if anything.
///
/// An empty diff is not an error. Validation runs only when there is
/// something to send, over every renderable scalar field in render order.
pub fn begin_submit(state: &EngineState) -> Result<(EngineState, SubmitPlan), EngineError> {
    match state.phase {
        Phase::Ready => {}
        Phase::Submitting => return Err(EngineError::busy("a submission is already in progress")),
        _ => return Err(EngineError::NotReady),
    }

    let updates = state.pending_updates();
    if updates.is_empty() {
        return Ok((state.clone(), SubmitPlan::NothingToUpdate));
    }

    let schema = state.schema();
    let fields = schema
        .render_order()
        .filter(|id| state.loaded.field_id_to_slug.contains_key(id))
        .filter_map(|id| schema.field(id));
    validate_fields(fields, &state.snapshot.current).map_err(EngineError::Validation)?;

    let mut next = state.clone();
    next.phase = Phase::Submitting;
    let submitted = state.snapshot.current.clone();
    Ok((next, SubmitPlan::Send { updates, submitted }))
}

/// The persisted values become the new initial snapshot.
///
/// Edits made while the request was in flight stay dirty.
pub fn apply_submit_success(state: &EngineState, submitted: ValueMap) -> EngineState {
    let mut next = state.clone();
    next.phase = Phase::Ready;
    next.snapshot.initial = submitted;
    next
}

/// Back to `Ready` with snapshots untouched.
pub fn apply_submit_failure(state: &EngineState) -> EngineState {
    let mut next = state.clone();
    if next.phase == Phase::Submitting {
        next.phase = Phase::Ready;
    }
    next
}

/// Mark a file or compliance field as uploading.
pub fn begin_upload(state: &EngineState, field_id: FieldId) -> Result<EngineState, EngineError> {
    state.require_loaded()?;
    if state.uploads_in_flight.contains(&field_id) {
        return Err(EngineError::busy(format!(
            "an upload for field {} is already in progress",
            field_id
        )));
    }
    let mut next = state.clone();
    next.uploads_in_flight.insert(field_id);
    Ok(next)
}

/// Clear the upload flag and, when a file id is given, store it as the value.
pub fn finish_upload(state: &EngineState, field_id: FieldId, file_id: Option<i64>) -> EngineState {
    let mut next = state.clone();
    next.uploads_in_flight.remove(&field_id);
    if let Some(file_id) = file_id {
        if next.snapshot.current.contains_key(&field_id) {
            let value = TypedValue::File(file_id);
            next.loaded
                .relationships
                .propagate(&mut next.snapshot.current, field_id, &value);
            next.snapshot.current.insert(field_id, value);
        }
    }
    next
}

/// Verify a field accepts file uploads.
pub fn check_file_field(state: &EngineState, field_id: FieldId) -> Result<(), EngineError> {
    state.require_loaded()?;
    let field = state.editable_field(field_id)?;
    if field.kind != FieldKind::File {
        return Err(EngineError::UnknownField(field_id));
    }
    Ok(())
}

pub fn apply_compliance_refresh(
    state: &EngineState,
    values: &[ComplianceFieldValue],
) -> EngineState {
    let mut next = state.clone();
    next.compliance = Arc::new(ComplianceIndex::build(values));
    next
}

/// Mark a repeatable subsection busy while an entry is created in it.
pub fn begin_entry_create(
    state: &EngineState,
    subsection_id: SubsectionId,
) -> Result<EngineState, EngineError> {
    state.require_loaded()?;
    if !state.schema().is_repeatable_subsection(subsection_id) {
        return Err(EngineError::UnknownSubsection(subsection_id));
    }
    if state.subsections_in_flight.contains(&subsection_id) {
        return Err(EngineError::busy(format!(
            "subsection {} has an entry creation in progress",
            subsection_id
        )));
    }
    let mut next = state.clone();
    next.subsections_in_flight.insert(subsection_id);
    Ok(next)
}

/// Clear the creation marker without adding an entry.
pub fn finish_entry_create(state: &EngineState, subsection_id: SubsectionId) -> EngineState {
    let mut next = state.clone();
    next.subsections_in_flight.remove(&subsection_id);
    next
}

/// Add a freshly created entry with empty values.
pub fn apply_entry_added(state: &EngineState, entry: GroupEntry) -> EngineState {
    let values: ValueMap = state
        .schema()
        .subsection_fields(entry.subsection_id)
        .into_iter()
        .filter(|field| field.kind.is_scalar())
        .map(|field| (field.id, extract_value(field, entry.values.get(&field.id))))
        .collect();
    let mut meta = entry;
    meta.values.clear();

    let mut next = finish_entry_create(state, meta.subsection_id);
    next.entries.insert(
        meta.id,
        EntryState {
            entry: meta,
            snapshot: EditSnapshot::captured(values),
        },
    );
    next
}

pub fn apply_entry_removed(state: &EngineState, entry_id: EntryId) -> EngineState {
    let mut next = state.clone();
    next.entries.remove(&entry_id);
    next.entries_in_flight.remove(&entry_id);
    next
}

/// Edit one value of one entry. No relationship propagation across entries.
pub fn apply_entry_field_change(
    state: &EngineState,
    entry_id: EntryId,
    field_id: FieldId,
    value: TypedValue,
) -> Result<EngineState, EngineError> {
    state.require_loaded()?;
    let entry = state
        .entries
        .get(&entry_id)
        .ok_or(EngineError::UnknownEntry(entry_id))?;
    let field = state
        .schema()
        .field(field_id)
        .filter(|_| entry.snapshot.current.contains_key(&field_id))
        .ok_or(EngineError::UnknownField(field_id))?;

    let value = coerce_edit(field.kind, value);
    let mut next = state.clone();
    if let Some(entry) = next.entries.get_mut(&entry_id) {
        entry.snapshot.current.insert(field_id, value);
    }
    Ok(next)
}

/// Mark an entry busy for a save or delete.
pub fn begin_entry_op(state: &EngineState, entry_id: EntryId) -> Result<EngineState, EngineError> {
    state.require_loaded()?;
    if !state.entries.contains_key(&entry_id) {
        return Err(EngineError::UnknownEntry(entry_id));
    }
    if state.entries_in_flight.contains(&entry_id) {
        return Err(EngineError::busy(format!(
            "group entry {} has a request in progress",
            entry_id
        )));
    }
    let mut next = state.clone();
    next.entries_in_flight.insert(entry_id);
    Ok(next)
}

/// Plan an entry save: diff its values, validate, and mark it busy.
pub fn begin_entry_save(
    state: &EngineState,
    entry_id: EntryId,
) -> Result<(EngineState, SubmitPlan), EngineError> {
    state.require_loaded()?;
    let entry = state
        .entries
        .get(&entry_id)
        .ok_or(EngineError::UnknownEntry(entry_id))?;
    let slugs = state.loaded.entry_slugs(entry.entry.subsection_id);
    let updates = entry.snapshot.diff(&slugs);
    if updates.is_empty() {
        return Ok((state.clone(), SubmitPlan::NothingToUpdate));
    }

    let fields = state
        .schema()
        .subsection_fields(entry.entry.subsection_id)
        .into_iter()
        .filter(|field| slugs.contains_key(&field.id));
    validate_fields(fields, &entry.snapshot.current).map_err(EngineError::Validation)?;

    let submitted = entry.snapshot.current.clone();
    let next = begin_entry_op(state, entry_id)?;
    Ok((next, SubmitPlan::Send { updates, submitted }))
}

/// Clear the busy flag; on success the saved values become the entry's initial snapshot.
pub fn finish_entry_op(
    state: &EngineState,
    entry_id: EntryId,
    saved: Option<ValueMap>,
) -> EngineState {
    let mut next = state.clone();
    next.entries_in_flight.remove(&entry_id);
    if let (Some(saved), Some(entry)) = (saved, next.entries.get_mut(&entry_id)) {
        entry.snapshot.initial = saved;
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use custom_fields_shared::{
        SectionDefinition, SubsectionDefinition, ValuedField, ValuedSection,
        ValuedSubsection,
    };
    use serde_json::json;

    fn text(id: FieldId) -> FieldDefinition {
        FieldDefinition::new(id, format!("f{}", id), FieldKind::Text)
    }

    fn payload() -> LoadPayload {
        let fields = vec![
            text(1),
            text(2).mirroring(1),
            FieldDefinition::new(3, "dbs", FieldKind::Compliance),
            FieldDefinition::new(4, "doc", FieldKind::File),
        ];
        let hierarchy = HierarchyResponse::new(vec![SectionDefinition::new(1, "S")
            .with_fields(fields.clone())
            .with_subsection(
                SubsectionDefinition::new(10, "Vehicles", vec![text(11).required()]).repeatable(),
            )]);
        let values = ValuesResponse {
            sections: vec![ValuedSection {
                id: 1,
                direct_fields: vec![
                    ValuedField::new(text(1), Some(ValueRecord::new(json!("Acme")))),
                    ValuedField::new(text(2).mirroring(1), None),
                ],
                subsections: vec![ValuedSubsection {
                    id: 10,
                    is_repeatable: true,
                    fields: vec![],
                    entries: vec![GroupEntry::new(500, 0, "Van")
                        .with_value(11, ValueRecord::new(json!("AB12")))],
                }],
            }],
            fields: None,
        };
        LoadPayload {
            hierarchy,
            values,
            management: None,
            compliance: vec![],
        }
    }

    fn ready() -> EngineState {
        apply_load_success(payload())
    }

    #[test]
    fn test_load_applies_read_fallback_without_dirtying() {
        let state = ready();
        assert_eq!(state.phase, Phase::Ready);
        assert_eq!(state.snapshot.current[&2], TypedValue::from("Acme"));
        assert!(state.pending_updates().is_empty());
        assert_eq!(state.status(), SessionStatus::Clean);
    }

    #[test]
    fn test_load_excludes_compliance_and_entry_fields_from_scalars() {
        let state = ready();
        assert!(!state.snapshot.current.contains_key(&3));
        assert!(!state.snapshot.current.contains_key(&11));
        assert_eq!(state.snapshot.current[&4], TypedValue::Empty);
        assert!(!state.loaded.field_id_to_slug.contains_key(&3));
    }

    #[test]
    fn test_load_collects_entries_with_parent_subsection() {
        let state = ready();
        let entry = &state.entries[&500];
        assert_eq!(entry.entry.subsection_id, 10);
        assert_eq!(entry.snapshot.current[&11], TypedValue::from("AB12"));
    }

    #[test]
    fn test_field_change_propagates_and_dirties() {
        let state = apply_field_change(&ready(), 1, TypedValue::from("Acme Ltd")).unwrap();
        assert_eq!(state.snapshot.current[&2], TypedValue::from("Acme Ltd"));
        assert_eq!(state.status(), SessionStatus::Dirty);
        assert_eq!(state.pending_updates().len(), 2);
    }

    #[test]
    fn test_field_change_rejections() {
        let state = ready();
        assert!(matches!(
            apply_field_change(&state, 3, TypedValue::from("x")),
            Err(EngineError::Compliance { field_id: 3, .. })
        ));
        assert!(matches!(
            apply_field_change(&state, 99, TypedValue::from("x")),
            Err(EngineError::UnknownField(99))
        ));
        assert!(matches!(
            apply_field_change(&EngineState::default(), 1, TypedValue::from("x")),
            Err(EngineError::NotReady)
        ));
    }

    #[test]
    fn test_nan_edits_are_sanitized() {
        let state = apply_field_change(&ready(), 1, TypedValue::Number(f64::NAN)).unwrap();
        assert_eq!(state.snapshot.current[&1], TypedValue::from(""));
    }

    #[test]
    fn test_submit_cycle() {
        let state = apply_field_change(&ready(), 1, TypedValue::from("New")).unwrap();
        let (submitting, plan) = begin_submit(&state).unwrap();
        assert_eq!(submitting.phase, Phase::Submitting);
        assert!(matches!(
            begin_submit(&submitting),
            Err(EngineError::Busy(_))
        ));

        let SubmitPlan::Send { updates, submitted } = plan else {
            panic!("expected updates");
        };
        assert_eq!(updates.len(), 2);

        let failed = apply_submit_failure(&submitting);
        assert_eq!(failed.status(), SessionStatus::Dirty);

        let saved = apply_submit_success(&submitting, submitted);
        assert_eq!(saved.status(), SessionStatus::Clean);
    }

    #[test]
    fn test_empty_submit_plans_nothing() {
        let state = ready();
        let (next, plan) = begin_submit(&state).unwrap();
        assert_eq!(plan, SubmitPlan::NothingToUpdate);
        assert_eq!(next.phase, Phase::Ready);
    }

    #[test]
    fn test_upload_flags() {
        let state = begin_upload(&ready(), 4).unwrap();
        assert!(matches!(begin_upload(&state, 4), Err(EngineError::Busy(_))));
        assert!(matches!(begin_load(&state), Err(EngineError::Busy(_))));

        let failed = finish_upload(&state, 4, None);
        assert!(failed.uploads_in_flight.is_empty());
        assert_eq!(failed.snapshot.current[&4], TypedValue::Empty);

        let done = finish_upload(&state, 4, Some(77));
        assert_eq!(done.snapshot.current[&4], TypedValue::File(77));
    }

    #[test]
    fn test_entry_edit_and_save() {
        let state = apply_entry_field_change(&ready(), 500, 11, TypedValue::from("")).unwrap();
        assert!(state.has_unsaved_changes());

        // Required entry field left blank.
        assert!(matches!(
            begin_entry_save(&state, 500),
            Err(EngineError::Validation(_))
        ));

        let state = apply_entry_field_change(&state, 500, 11, TypedValue::from("CD34")).unwrap();
        let (busy, plan) = begin_entry_save(&state, 500).unwrap();
        let SubmitPlan::Send { updates, submitted } = plan else {
            panic!("expected updates");
        };
        assert_eq!(updates, vec![FieldUpdate::new("f11", json!("CD34"))]);
        assert!(matches!(
            begin_entry_save(&busy, 500),
            Err(EngineError::Busy(_))
        ));

        let saved = finish_entry_op(&busy, 500, Some(submitted));
        assert!(!saved.has_unsaved_changes());
        assert!(saved.entries_in_flight.is_empty());
    }

    #[test]
    fn test_entry_added_and_removed() {
        let state = apply_entry_added(&ready(), GroupEntry::new(501, 10, "Car"));
        assert_eq!(state.entries[&501].snapshot.current[&11], TypedValue::from(""));
        assert!(!state.has_unsaved_changes());

        let state = apply_entry_removed(&state, 501);
        assert!(!state.entries.contains_key(&501));
    }

    #[test]
    fn test_entry_creation_marks_subsection_busy() {
        let creating = begin_entry_create(&ready(), 10).unwrap();
        assert!(matches!(begin_load(&creating), Err(EngineError::Busy(_))));
        assert!(matches!(
            begin_entry_create(&creating, 10),
            Err(EngineError::Busy(_))
        ));
        assert!(matches!(
            begin_entry_create(&ready(), 1),
            Err(EngineError::UnknownSubsection(1))
        ));

        let added = apply_entry_added(&creating, GroupEntry::new(501, 10, "Car"));
        assert!(added.subsections_in_flight.is_empty());
        assert!(begin_load(&added).is_ok());

        let abandoned = finish_entry_create(&creating, 10);
        assert!(abandoned.subsections_in_flight.is_empty());
        assert_eq!(abandoned.entries.len(), 1);
    }
}
