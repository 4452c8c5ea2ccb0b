//! Request and response types for collaborator operations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use custom_fields_shared::{FieldId, SubsectionId};

/// The `(entityType, entitySlug)` pair an engine session is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityRef {
    /// The entity type, e.g. `user` or `asset`.
    pub entity_type: String,
    /// The entity's slug.
    pub entity_slug: String,
}

impl EntityRef {
    pub fn new(entity_type: impl Into<String>, entity_slug: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_slug: entity_slug.into(),
        }
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.entity_type, self.entity_slug)
    }
}

/// Optional filters for the compliance listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComplianceQuery {
    /// Restrict to fields required for this role.
    pub role: Option<String>,
    /// Restrict to fields required for this asset type.
    pub asset_type: Option<String>,
}

/// A file selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            bytes,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// The stored reference returned by a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    #[serde(alias = "id", alias = "file_id")]
    pub file_id: i64,
    #[serde(default, alias = "url", alias = "download_url")]
    pub download_url: Option<String>,
}

/// Payload for creating or renewing a compliance value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompliancePayload {
    pub entity_type: String,
    pub entity_slug: String,
    pub custom_field_id: FieldId,
    pub file_ids: Vec<i64>,
    pub sub_field_values: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Request to create a new entry in a repeatable subsection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupEntryRequest {
    pub entity_type: String,
    pub entity_slug: String,
    pub subsection_id: SubsectionId,
    pub label: String,
}
