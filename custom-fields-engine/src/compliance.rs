//! Compliance field lookup and action routing.
//!
//! Compliance fields never take part in the scalar diff. Each one renders as
//! a status card whose actions are separate network operations driven by
//! the session.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use custom_fields_repository::FileUpload;
use custom_fields_shared::{
    ComplianceConfig, ComplianceFieldValue, FieldDefinition, FieldId, SubFieldDefinition,
};

/// The write action available for a compliance field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ComplianceAction {
    /// No stored value yet: the first submission creates one.
    Upload,
    /// A stored value exists: a renewal supersedes it and keeps its history.
    Renew { value_id: i64, value_slug: String },
}

/// What the user attaches to an upload or renewal.
#[derive(Debug, Clone, Default)]
pub struct ComplianceSubmission {
    pub files: Vec<FileUpload>,
    pub sub_field_values: BTreeMap<String, Value>,
    pub notes: Option<String>,
}

impl ComplianceSubmission {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, file: FileUpload) -> Self {
        self.files.push(file);
        self
    }

    pub fn with_sub_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.sub_field_values.insert(key.into(), value);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Status card for one compliance field.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceCard {
    pub field_id: FieldId,
    pub field_slug: String,
    pub label: String,
    pub is_required: bool,
    pub status: Option<String>,
    pub requires_approval: bool,
    pub compliance_config: Option<ComplianceConfig>,
    pub sub_field_definitions: Vec<SubFieldDefinition>,
    pub value: Option<ComplianceFieldValue>,
    pub action: ComplianceAction,
    pub can_view_history: bool,
    pub upload_in_progress: bool,
}

/// Compliance values of one entity, keyed by the field they belong to.
#[derive(Debug, Clone, Default)]
pub struct ComplianceIndex {
    by_field: HashMap<FieldId, ComplianceFieldValue>,
}

impl ComplianceIndex {
    /// Index a compliance listing by `custom_field_id`.
    ///
    /// When a field has several entries, one with a stored record beats a
    /// placeholder; otherwise the first listed wins.
    pub fn build(values: &[ComplianceFieldValue]) -> Self {
        let mut by_field: HashMap<FieldId, ComplianceFieldValue> = HashMap::new();
        for value in values {
            match by_field.get(&value.custom_field_id) {
                Some(existing) if existing.has_record() || !value.has_record() => {
                    warn!(
                        custom_field_id = value.custom_field_id,
                        value_id = value.id,
                        "Ignoring extra compliance value for field"
                    );
                }
                _ => {
                    by_field.insert(value.custom_field_id, value.clone());
                }
            }
        }
        Self { by_field }
    }

    pub fn value_for(&self, field_id: FieldId) -> Option<&ComplianceFieldValue> {
        self.by_field.get(&field_id)
    }

    pub fn len(&self) -> usize {
        self.by_field.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_field.is_empty()
    }

    /// `Renew` when a stored value exists, otherwise `Upload`.
    pub fn action_for(&self, field_id: FieldId) -> ComplianceAction {
        match self.value_for(field_id).filter(|value| value.has_record()) {
            Some(value) => ComplianceAction::Renew {
                value_id: value.id,
                value_slug: value
                    .slug
                    .clone()
                    .filter(|slug| !slug.trim().is_empty())
                    .unwrap_or_else(|| value.id.to_string()),
            },
            None => ComplianceAction::Upload,
        }
    }

    /// Project a compliance field and its value into a card.
    pub fn card(&self, field: &FieldDefinition, upload_in_progress: bool) -> ComplianceCard {
        let value = self.value_for(field.id);
        ComplianceCard {
            field_id: field.id,
            field_slug: field.slug.clone(),
            label: field.display_label().to_string(),
            is_required: field.is_required,
            status: value.and_then(|v| v.status.clone()),
            requires_approval: value.map(|v| v.requires_approval).unwrap_or_else(|| {
                field
                    .compliance_config
                    .as_ref()
                    .map(|config| config.requires_approval)
                    .unwrap_or(false)
            }),
            compliance_config: value
                .and_then(|v| v.compliance_config.clone())
                .or_else(|| field.compliance_config.clone()),
            sub_field_definitions: match value {
                Some(v) if !v.sub_field_definitions.is_empty() => v.sub_field_definitions.clone(),
                _ => field.sub_field_definitions.clone(),
            },
            value: value.cloned(),
            action: self.action_for(field.id),
            can_view_history: value.is_some_and(ComplianceFieldValue::has_record),
            upload_in_progress,
        }
    }
}

/// Pre-supplied download URL for a file: the file's own, then the value's.
pub fn fallback_download_url(value: &ComplianceFieldValue, file_id: i64) -> Option<String> {
    value
        .file(file_id)
        .and_then(|file| file.download_url.clone())
        .or_else(|| value.download_url.clone())
        .filter(|url| !url.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use custom_fields_shared::{ComplianceFile, FieldKind};

    fn value(id: i64, field_id: FieldId) -> ComplianceFieldValue {
        ComplianceFieldValue {
            id,
            slug: (id > 0).then(|| format!("value-{}", id)),
            custom_field_id: field_id,
            field_slug: "dbs".to_string(),
            status: Some("approved".to_string()),
            requires_approval: true,
            compliance_config: None,
            sub_field_definitions: vec![],
            sub_field_values: BTreeMap::new(),
            files: vec![ComplianceFile {
                file_id: Some(3),
                file_name: "cert.pdf".to_string(),
                download_url: Some("https://cdn/cert.pdf".to_string()),
                uploaded_at: None,
            }],
            download_url: Some("https://cdn/value".to_string()),
            expires_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_action_depends_on_stored_record() {
        let index = ComplianceIndex::build(&[value(7, 1), value(0, 2)]);

        assert_eq!(
            index.action_for(1),
            ComplianceAction::Renew {
                value_id: 7,
                value_slug: "value-7".to_string()
            }
        );
        assert_eq!(index.action_for(2), ComplianceAction::Upload);
        assert_eq!(index.action_for(3), ComplianceAction::Upload);
    }

    #[test]
    fn test_stored_record_beats_placeholder() {
        let index = ComplianceIndex::build(&[value(0, 1), value(7, 1), value(8, 1)]);
        assert_eq!(index.value_for(1).unwrap().id, 7);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_card_without_value() {
        let field = FieldDefinition::new(4, "dbs", FieldKind::Compliance).with_label("DBS");
        let card = ComplianceIndex::default().card(&field, false);

        assert_eq!(card.label, "DBS");
        assert_eq!(card.action, ComplianceAction::Upload);
        assert!(!card.can_view_history);
        assert!(card.status.is_none());
    }

    #[test]
    fn test_fallback_download_url() {
        let stored = value(7, 1);
        assert_eq!(
            fallback_download_url(&stored, 3).as_deref(),
            Some("https://cdn/cert.pdf")
        );
        assert_eq!(
            fallback_download_url(&stored, 99).as_deref(),
            Some("https://cdn/value")
        );
    }
}
