//! Error types for the custom fields engine.

use thiserror::Error;

use custom_fields_repository::FieldsApiError;
use custom_fields_shared::{EntryId, FieldId, SubsectionId};

use crate::validation::ValidationReport;

/// Errors surfaced by an engine session.
///
/// Only `Load` invalidates the session. Every other variant is local to one
/// field, entry or submission, and leaves the edited state untouched.
#[derive(Error, Debug)]
pub enum EngineError {
    /// One of the initial fetches failed; nothing is rendered.
    #[error("Load error: {0}")]
    Load(#[source] FieldsApiError),

    /// Required or malformed values blocked a submission before any request.
    #[error("Validation error: {0}")]
    Validation(ValidationReport),

    /// The bulk update was rejected; edits are preserved for a retry.
    #[error("Submission error: {0}")]
    Submission(#[source] FieldsApiError),

    /// A file upload failed; the field keeps its previous value.
    #[error("Upload error for field {field_id}: {source}")]
    Upload {
        field_id: FieldId,
        #[source]
        source: FieldsApiError,
    },

    /// A compliance action could not be performed.
    #[error("Compliance error for field {field_id}: {reason}")]
    Compliance { field_id: FieldId, reason: String },

    /// A compliance request reached the backend and failed.
    #[error("Compliance request for field {field_id} failed: {source}")]
    ComplianceRequest {
        field_id: FieldId,
        #[source]
        source: FieldsApiError,
    },

    /// A group entry request failed.
    #[error("Group entry error: {0}")]
    Entry(#[source] FieldsApiError),

    /// An operation of the same kind is already in flight.
    #[error("Busy: {0}")]
    Busy(String),

    /// The session has not finished loading.
    #[error("Session is not ready")]
    NotReady,

    #[error("Unknown field: {0}")]
    UnknownField(FieldId),

    #[error("Unknown group entry: {0}")]
    UnknownEntry(EntryId),

    #[error("Unknown repeatable subsection: {0}")]
    UnknownSubsection(SubsectionId),
}

impl EngineError {
    pub fn load(source: FieldsApiError) -> Self {
        Self::Load(source)
    }

    /// Create a busy error.
    pub fn busy(msg: impl Into<String>) -> Self {
        Self::Busy(msg.into())
    }

    /// Create a local compliance error.
    pub fn compliance(field_id: FieldId, reason: impl Into<String>) -> Self {
        Self::Compliance {
            field_id,
            reason: reason.into(),
        }
    }

    /// Create an upload error.
    pub fn upload(field_id: FieldId, source: FieldsApiError) -> Self {
        Self::Upload { field_id, source }
    }

    /// Whether the session itself is unusable after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Load(_))
    }
}
