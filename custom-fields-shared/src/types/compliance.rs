//! Compliance field types.
//!
//! A compliance field is backed by document upload, approval status and
//! renewal history rather than a scalar value. Status values are opaque to
//! the engine; they are displayed, never interpreted.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::serde_helpers::{bool_or_false, lenient_timestamp, null_as_default};
use crate::types::field::{FieldId, SubFieldDefinition};

/// Per-field compliance configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceConfig {
    #[serde(default, deserialize_with = "bool_or_false")]
    pub requires_approval: bool,
    #[serde(default)]
    pub renewal_period_days: Option<u32>,
    #[serde(default)]
    pub reminder_days_before: Option<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub allowed_file_types: Vec<String>,
    #[serde(default)]
    pub max_files: Option<u32>,
}

/// A file attached to a compliance value or history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceFile {
    #[serde(default, alias = "file_id", alias = "id")]
    pub file_id: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default", alias = "name")]
    pub file_name: String,
    #[serde(default, alias = "url")]
    pub download_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub uploaded_at: Option<DateTime<Utc>>,
}

/// One immutable point in a compliance value's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceHistoryEntry {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub files: Vec<ComplianceFile>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sub_field_values: BTreeMap<String, Value>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

/// The current compliance record for one field on one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceFieldValue {
    /// Value id. Zero means no record has been created yet.
    #[serde(default)]
    pub id: i64,
    /// Value slug, used to address renewals.
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(alias = "custom_field_id")]
    pub custom_field_id: FieldId,
    #[serde(default, deserialize_with = "null_as_default", alias = "field_slug")]
    pub field_slug: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "bool_or_false")]
    pub requires_approval: bool,
    #[serde(default)]
    pub compliance_config: Option<ComplianceConfig>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sub_field_definitions: Vec<SubFieldDefinition>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sub_field_values: BTreeMap<String, Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub files: Vec<ComplianceFile>,
    /// Pre-supplied download URL used when file reference resolution fails.
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ComplianceFieldValue {
    /// Whether a stored record exists (upload already happened at least once).
    pub fn has_record(&self) -> bool {
        self.id != 0
    }

    /// The file with the given id, if attached.
    pub fn file(&self, file_id: i64) -> Option<&ComplianceFile> {
        self.files.iter().find(|f| f.file_id == Some(file_id))
    }
}
