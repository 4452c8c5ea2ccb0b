//! Custom fields provider trait definition.
//!
//! This module defines the abstract interface for every network boundary the
//! engine crosses, allowing different backends (HTTP, in-memory mock) to be
//! swapped in.

use async_trait::async_trait;

use custom_fields_shared::{
    ComplianceFieldValue, ComplianceHistoryEntry, EntryId, FieldUpdate, GroupEntry,
    HierarchyResponse, ManagementField, ValuesResponse,
};

use crate::errors::FieldsApiError;
use crate::types::{
    CompliancePayload, ComplianceQuery, CreateGroupEntryRequest, EntityRef, FileUpload,
    UploadedFile,
};

/// Abstracts the backend that stores custom field schemas and values.
///
/// Implementations are injected into `FieldsService` to enable dependency
/// injection and testing with mock implementations. Every method is a single
/// request: there is no retry or cancellation at this layer.
///
/// All methods return `Result<T, FieldsApiError>` for consistent error
/// handling across backends.
#[async_trait]
pub trait CustomFieldsProvider: Send + Sync {
    /// Fetch the section/subsection/field schema for an entity type.
    ///
    /// `entity_slug` narrows the schema to one entity when the backend supports it.
    async fn fetch_hierarchy(
        &self,
        entity_type: &str,
        entity_slug: Option<&str>,
    ) -> Result<HierarchyResponse, FieldsApiError>;

    /// Fetch the schema tree with each field's stored value for one entity.
    async fn fetch_entity_values(
        &self,
        entity: &EntityRef,
    ) -> Result<ValuesResponse, FieldsApiError>;

    /// Fetch the flat management listing of every configured field for an entity type.
    async fn fetch_management_fields(
        &self,
        entity_type: &str,
    ) -> Result<Vec<ManagementField>, FieldsApiError>;

    /// Fetch the compliance values attached to one entity.
    async fn fetch_compliance_fields(
        &self,
        entity: &EntityRef,
        query: &ComplianceQuery,
    ) -> Result<Vec<ComplianceFieldValue>, FieldsApiError>;

    /// Fetch the immutable history of one compliance value.
    async fn fetch_compliance_history(
        &self,
        value_id: i64,
    ) -> Result<Vec<ComplianceHistoryEntry>, FieldsApiError>;

    /// Persist a set of scalar field changes. The sole write path for scalar fields.
    async fn submit_field_updates(
        &self,
        entity_slug: &str,
        updates: &[FieldUpdate],
    ) -> Result<(), FieldsApiError>;

    /// Upload one file and return its stored reference.
    async fn upload_file(&self, file: &FileUpload) -> Result<UploadedFile, FieldsApiError>;

    /// Resolve a stored file reference to a fetchable URL.
    async fn resolve_file_url(&self, file_id: i64) -> Result<String, FieldsApiError>;

    /// Create the first compliance value for a field.
    async fn upload_compliance(&self, payload: &CompliancePayload) -> Result<(), FieldsApiError>;

    /// Supersede an existing compliance value, adding a history point.
    async fn renew_compliance(
        &self,
        value_slug: &str,
        payload: &CompliancePayload,
    ) -> Result<(), FieldsApiError>;

    /// Create an entry in a repeatable subsection.
    async fn create_group_entry(
        &self,
        request: &CreateGroupEntryRequest,
    ) -> Result<GroupEntry, FieldsApiError>;

    /// Delete an entry from a repeatable subsection.
    async fn delete_group_entry(&self, entry_id: EntryId) -> Result<(), FieldsApiError>;

    /// Persist changed values of one group entry.
    async fn update_group_entry(
        &self,
        entry_id: EntryId,
        updates: &[FieldUpdate],
    ) -> Result<(), FieldsApiError>;
}
