//! Orphaned-field reconciliation.
//!
//! The backend has reported unassigned fields in several shapes over time.
//! This adapter is the only place that knows about them: it walks the
//! fallback chain once and hands the rest of the engine a plain list.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, instrument};

use custom_fields_shared::{
    FieldDefinition, FieldId, HierarchyResponse, ManagementField, ValuesResponse,
};

/// Which rule of the fallback chain produced the orphan set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrphanSource {
    /// Root-level field list of the hierarchy response.
    HierarchyRoot,
    /// Root-level field list of the values response.
    ValuesRoot,
    /// Management listing entries without a section.
    ManagementListing,
    /// Fields with values that the hierarchy never places.
    SetDifference,
}

#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub orphans: Vec<FieldDefinition>,
    pub source: OrphanSource,
}

/// Every field id reachable by walking the hierarchy's sections and subsections.
pub fn placed_field_ids(hierarchy: &HierarchyResponse) -> HashSet<FieldId> {
    hierarchy
        .sections
        .iter()
        .flat_map(|section| section.all_fields())
        .map(|field| field.id)
        .collect()
}

fn non_empty<T>(list: &Option<Vec<T>>) -> Option<&[T]> {
    list.as_deref().filter(|items| !items.is_empty())
}

/// Listing entries without a section, or `None` when there are none.
fn unassigned(management: Option<&[ManagementField]>) -> Option<Vec<&FieldDefinition>> {
    let fields: Vec<&FieldDefinition> = management?
        .iter()
        .filter(|entry| entry.section_id.is_none())
        .map(|entry| &entry.field)
        .collect();
    (!fields.is_empty()).then_some(fields)
}

/// Compute the orphaned fields for one load.
///
/// Rules, first match wins:
/// 1. a non-empty root field list on the hierarchy response;
/// 2. a non-empty root field list on the values response;
/// 3. management listing entries whose `section_id` is absent;
/// 4. fields with values minus fields placed in the hierarchy.
///
/// A rule that yields nothing falls through to the next one. The result never contains a placed field or the same id twice. When a
/// management listing is supplied, any of its fields still unplaced after the
/// chosen rule are appended, so every listed field ends up either in a schema
/// section or in the orphan set.
#[instrument(skip_all, fields(has_management = management.is_some()))]
pub fn reconcile_orphans(
    hierarchy: &HierarchyResponse,
    values: &ValuesResponse,
    management: Option<&[ManagementField]>,
) -> Reconciliation {
    let placed = placed_field_ids(hierarchy);

    let (source, candidates): (OrphanSource, Vec<&FieldDefinition>) =
        if let Some(fields) = non_empty(&hierarchy.fields) {
            (OrphanSource::HierarchyRoot, fields.iter().collect())
        } else if let Some(fields) = non_empty(&values.fields) {
            (
                OrphanSource::ValuesRoot,
                fields.iter().map(|valued| &valued.definition).collect(),
            )
        } else if let Some(fields) = unassigned(management) {
            (OrphanSource::ManagementListing, fields)
        } else {
            (
                OrphanSource::SetDifference,
                values
                    .all_fields()
                    .map(|valued| &valued.definition)
                    .filter(|field| !placed.contains(&field.id))
                    .collect(),
            )
        };

    let mut seen = placed;
    let mut orphans: Vec<FieldDefinition> = candidates
        .into_iter()
        .filter(|field| seen.insert(field.id))
        .cloned()
        .collect();

    if let Some(listing) = management {
        let before = orphans.len();
        orphans.extend(
            listing
                .iter()
                .filter(|entry| seen.insert(entry.field.id))
                .map(|entry| entry.field.clone()),
        );
        if orphans.len() > before {
            debug!(
                added = orphans.len() - before,
                "Management listing fields missing from the hierarchy added as orphans"
            );
        }
    }

    debug!(source = ?source, orphan_count = orphans.len(), "Reconciled orphaned fields");
    Reconciliation { orphans, source }
}
