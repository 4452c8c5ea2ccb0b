//! Mock provider for testing and local development.
//!
//! The `MockFieldsProvider` serves pre-configured hierarchy, value and
//! compliance payloads, records every write it receives, and can be scripted
//! to fail or to hold an operation in flight until released.
//!
//! # Example
//!
//! ```ignore
//! use custom_fields_repository::{MockFieldsProvider, MockOperation, FieldsApiError};
//!
//! let provider = MockFieldsProvider::new()
//!     .with_hierarchy(hierarchy)
//!     .with_values(values);
//!
//! provider.fail(MockOperation::SubmitUpdates, FieldsApiError::network("offline"));
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Notify;

use custom_fields_shared::{
    ComplianceFieldValue, ComplianceFile, ComplianceHistoryEntry, EntryId, FieldUpdate,
    GroupEntry, HierarchyResponse, ManagementField, ValuesResponse,
};

use crate::errors::FieldsApiError;
use crate::interfaces::CustomFieldsProvider;
use crate::types::{
    CompliancePayload, ComplianceQuery, CreateGroupEntryRequest, EntityRef, FileUpload,
    UploadedFile,
};

/// First id handed out for uploaded files, created entries and compliance values.
const FIRST_GENERATED_ID: i64 = 10_000;

/// The operations a mock can record, fail or hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    FetchHierarchy,
    FetchValues,
    FetchManagement,
    FetchCompliance,
    FetchHistory,
    SubmitUpdates,
    UploadFile,
    ResolveFileUrl,
    UploadCompliance,
    RenewCompliance,
    CreateEntry,
    DeleteEntry,
    UpdateEntry,
}

#[derive(Default)]
struct MockState {
    hierarchy: HierarchyResponse,
    values: ValuesResponse,
    management: Vec<ManagementField>,
    compliance: Vec<ComplianceFieldValue>,
    history: HashMap<i64, Vec<ComplianceHistoryEntry>>,
    file_urls: HashMap<i64, String>,
    failures: HashMap<MockOperation, FieldsApiError>,
    gates: HashMap<MockOperation, Arc<Notify>>,
    calls: Vec<MockOperation>,
    submissions: Vec<(String, Vec<FieldUpdate>)>,
    uploads: Vec<FileUpload>,
    compliance_uploads: Vec<CompliancePayload>,
    compliance_renewals: Vec<(String, CompliancePayload)>,
    entry_updates: Vec<(EntryId, Vec<FieldUpdate>)>,
    deleted_entries: Vec<EntryId>,
    next_id: i64,
}

/// Mock provider that returns pre-configured data and records writes.
///
/// Compliance uploads and renewals are emulated: an upload creates a pending
/// value, a renewal moves the current value into its history and replaces it.
pub struct MockFieldsProvider {
    state: Mutex<MockState>,
}

impl MockFieldsProvider {
    /// Create a mock with an empty hierarchy and no values.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                next_id: FIRST_GENERATED_ID,
                ..MockState::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not hide the state from the assertions that follow.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn with_hierarchy(self, hierarchy: HierarchyResponse) -> Self {
        self.lock().hierarchy = hierarchy;
        self
    }

    pub fn with_values(self, values: ValuesResponse) -> Self {
        self.lock().values = values;
        self
    }

    pub fn with_management_fields(self, fields: Vec<ManagementField>) -> Self {
        self.lock().management = fields;
        self
    }

    pub fn with_compliance(self, values: Vec<ComplianceFieldValue>) -> Self {
        self.lock().compliance = values;
        self
    }

    pub fn with_history(self, value_id: i64, entries: Vec<ComplianceHistoryEntry>) -> Self {
        self.lock().history.insert(value_id, entries);
        self
    }

    pub fn with_file_url(self, file_id: i64, url: impl Into<String>) -> Self {
        self.lock().file_urls.insert(file_id, url.into());
        self
    }

    /// Make every subsequent call of `operation` fail with `error`.
    pub fn fail(&self, operation: MockOperation, error: FieldsApiError) {
        self.lock().failures.insert(operation, error);
    }

    /// Stop failing `operation`.
    pub fn clear_failure(&self, operation: MockOperation) {
        self.lock().failures.remove(&operation);
    }

    /// Hold every call of `operation` in flight until the returned gate is notified.
    ///
    /// The call is recorded before it blocks, so tests can observe it as outstanding.
    pub fn hold(&self, operation: MockOperation) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.lock().gates.insert(operation, Arc::clone(&gate));
        gate
    }

    /// Number of calls received for `operation`, including failed ones.
    pub fn call_count(&self, operation: MockOperation) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| **call == operation)
            .count()
    }

    /// Every accepted `(entity_slug, updates)` submission, in order.
    pub fn submissions(&self) -> Vec<(String, Vec<FieldUpdate>)> {
        self.lock().submissions.clone()
    }

    pub fn uploads(&self) -> Vec<FileUpload> {
        self.lock().uploads.clone()
    }

    pub fn compliance_uploads(&self) -> Vec<CompliancePayload> {
        self.lock().compliance_uploads.clone()
    }

    pub fn compliance_renewals(&self) -> Vec<(String, CompliancePayload)> {
        self.lock().compliance_renewals.clone()
    }

    pub fn entry_updates(&self) -> Vec<(EntryId, Vec<FieldUpdate>)> {
        self.lock().entry_updates.clone()
    }

    pub fn deleted_entries(&self) -> Vec<EntryId> {
        self.lock().deleted_entries.clone()
    }

    /// Record the call, wait on its gate if held, then apply any scripted failure.
    async fn enter(&self, operation: MockOperation) -> Result<(), FieldsApiError> {
        let gate = {
            let mut state = self.lock();
            state.calls.push(operation);
            state.gates.get(&operation).cloned()
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }
        match self.lock().failures.get(&operation) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn files_for(ids: &[i64]) -> Vec<ComplianceFile> {
        ids.iter()
            .map(|id| ComplianceFile {
                file_id: Some(*id),
                file_name: format!("file-{}", id),
                download_url: None,
                uploaded_at: None,
            })
            .collect()
    }
}

impl Default for MockFieldsProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CustomFieldsProvider for MockFieldsProvider {
    async fn fetch_hierarchy(
        &self,
        _entity_type: &str,
        _entity_slug: Option<&str>,
    ) -> Result<HierarchyResponse, FieldsApiError> {
        self.enter(MockOperation::FetchHierarchy).await?;
        Ok(self.lock().hierarchy.clone())
    }

    async fn fetch_entity_values(
        &self,
        _entity: &EntityRef,
    ) -> Result<ValuesResponse, FieldsApiError> {
        self.enter(MockOperation::FetchValues).await?;
        Ok(self.lock().values.clone())
    }

    async fn fetch_management_fields(
        &self,
        _entity_type: &str,
    ) -> Result<Vec<ManagementField>, FieldsApiError> {
        self.enter(MockOperation::FetchManagement).await?;
        Ok(self.lock().management.clone())
    }

    async fn fetch_compliance_fields(
        &self,
        _entity: &EntityRef,
        _query: &ComplianceQuery,
    ) -> Result<Vec<ComplianceFieldValue>, FieldsApiError> {
        self.enter(MockOperation::FetchCompliance).await?;
        Ok(self.lock().compliance.clone())
    }

    async fn fetch_compliance_history(
        &self,
        value_id: i64,
    ) -> Result<Vec<ComplianceHistoryEntry>, FieldsApiError> {
        self.enter(MockOperation::FetchHistory).await?;
        Ok(self
            .lock()
            .history
            .get(&value_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn submit_field_updates(
        &self,
        entity_slug: &str,
        updates: &[FieldUpdate],
    ) -> Result<(), FieldsApiError> {
        self.enter(MockOperation::SubmitUpdates).await?;
        self.lock()
            .submissions
            .push((entity_slug.to_string(), updates.to_vec()));
        Ok(())
    }

    async fn upload_file(&self, file: &FileUpload) -> Result<UploadedFile, FieldsApiError> {
        self.enter(MockOperation::UploadFile).await?;
        let mut state = self.lock();
        state.uploads.push(file.clone());
        let file_id = state.next_id;
        state.next_id += 1;
        Ok(UploadedFile {
            file_id,
            download_url: None,
        })
    }

    async fn resolve_file_url(&self, file_id: i64) -> Result<String, FieldsApiError> {
        self.enter(MockOperation::ResolveFileUrl).await?;
        self.lock()
            .file_urls
            .get(&file_id)
            .cloned()
            .ok_or_else(|| FieldsApiError::not_found(format!("file {}", file_id)))
    }

    async fn upload_compliance(&self, payload: &CompliancePayload) -> Result<(), FieldsApiError> {
        self.enter(MockOperation::UploadCompliance).await?;
        let mut state = self.lock();
        state.compliance_uploads.push(payload.clone());

        let id = state.next_id;
        state.next_id += 1;
        let value = ComplianceFieldValue {
            id,
            slug: Some(format!("compliance-{}", id)),
            custom_field_id: payload.custom_field_id,
            field_slug: String::new(),
            status: Some("pending".to_string()),
            requires_approval: true,
            compliance_config: None,
            sub_field_definitions: Vec::new(),
            sub_field_values: payload.sub_field_values.clone(),
            files: Self::files_for(&payload.file_ids),
            download_url: None,
            expires_at: None,
            updated_at: None,
        };
        state
            .compliance
            .retain(|existing| existing.custom_field_id != payload.custom_field_id);
        state.compliance.push(value);
        Ok(())
    }

    async fn renew_compliance(
        &self,
        value_slug: &str,
        payload: &CompliancePayload,
    ) -> Result<(), FieldsApiError> {
        self.enter(MockOperation::RenewCompliance).await?;
        let mut state = self.lock();
        state
            .compliance_renewals
            .push((value_slug.to_string(), payload.clone()));

        let Some(index) = state
            .compliance
            .iter()
            .position(|v| v.slug.as_deref() == Some(value_slug))
        else {
            return Err(FieldsApiError::not_found(format!(
                "compliance value {}",
                value_slug
            )));
        };

        let previous = state.compliance[index].clone();
        state
            .history
            .entry(previous.id)
            .or_default()
            .push(ComplianceHistoryEntry {
                id: previous.id,
                status: previous.status.clone(),
                files: previous.files.clone(),
                sub_field_values: previous.sub_field_values.clone(),
                notes: None,
                created_by: None,
                created_at: previous.updated_at,
            });

        let current = &mut state.compliance[index];
        current.status = Some("pending".to_string());
        current.files = Self::files_for(&payload.file_ids);
        current.sub_field_values = payload.sub_field_values.clone();
        Ok(())
    }

    async fn create_group_entry(
        &self,
        request: &CreateGroupEntryRequest,
    ) -> Result<GroupEntry, FieldsApiError> {
        self.enter(MockOperation::CreateEntry).await?;
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;
        let mut entry = GroupEntry::new(id, request.subsection_id, request.label.clone());
        entry.entity_type = request.entity_type.clone();
        Ok(entry)
    }

    async fn delete_group_entry(&self, entry_id: EntryId) -> Result<(), FieldsApiError> {
        self.enter(MockOperation::DeleteEntry).await?;
        self.lock().deleted_entries.push(entry_id);
        Ok(())
    }

    async fn update_group_entry(
        &self,
        entry_id: EntryId,
        updates: &[FieldUpdate],
    ) -> Result<(), FieldsApiError> {
        self.enter(MockOperation::UpdateEntry).await?;
        self.lock()
            .entry_updates
            .push((entry_id, updates.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn payload(field_id: i64, file_ids: Vec<i64>) -> CompliancePayload {
        CompliancePayload {
            entity_type: "user".to_string(),
            entity_slug: "jane".to_string(),
            custom_field_id: field_id,
            file_ids,
            sub_field_values: BTreeMap::new(),
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_records_submissions() {
        let provider = MockFieldsProvider::new();
        provider
            .submit_field_updates("jane", &[FieldUpdate::new("a", json!("x"))])
            .await
            .unwrap();

        assert_eq!(provider.call_count(MockOperation::SubmitUpdates), 1);
        assert_eq!(provider.submissions()[0].0, "jane");
    }

    #[tokio::test]
    async fn test_scripted_failure_is_recorded_but_not_applied() {
        let provider = MockFieldsProvider::new();
        provider.fail(MockOperation::SubmitUpdates, FieldsApiError::network("offline"));

        let result = provider
            .submit_field_updates("jane", &[FieldUpdate::new("a", json!("x"))])
            .await;

        assert!(matches!(result, Err(FieldsApiError::NetworkError(_))));
        assert_eq!(provider.call_count(MockOperation::SubmitUpdates), 1);
        assert!(provider.submissions().is_empty());

        provider.clear_failure(MockOperation::SubmitUpdates);
        provider.submit_field_updates("jane", &[]).await.unwrap();
        assert_eq!(provider.submissions().len(), 1);
    }

    #[tokio::test]
    async fn test_upload_then_renew_keeps_history() {
        let provider = MockFieldsProvider::new();
        let entity = EntityRef::new("user", "jane");

        provider.upload_compliance(&payload(9, vec![1])).await.unwrap();
        let values = provider
            .fetch_compliance_fields(&entity, &ComplianceQuery::default())
            .await
            .unwrap();
        assert_eq!(values.len(), 1);
        let slug = values[0].slug.clone().unwrap();
        let value_id = values[0].id;

        provider.renew_compliance(&slug, &payload(9, vec![2])).await.unwrap();

        let history = provider.fetch_compliance_history(value_id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].files[0].file_id, Some(1));

        let values = provider
            .fetch_compliance_fields(&entity, &ComplianceQuery::default())
            .await
            .unwrap();
        assert_eq!(values[0].files[0].file_id, Some(2));
    }

    #[tokio::test]
    async fn test_renew_unknown_slug_fails() {
        let provider = MockFieldsProvider::new();
        let result = provider.renew_compliance("missing", &payload(9, vec![])).await;
        assert!(matches!(result, Err(FieldsApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_hold_blocks_until_released() {
        let provider = Arc::new(MockFieldsProvider::new());
        let gate = provider.hold(MockOperation::UploadFile);

        let task = {
            let provider = Arc::clone(&provider);
            tokio::spawn(async move {
                provider
                    .upload_file(&FileUpload::new("a.pdf", vec![1, 2, 3]))
                    .await
            })
        };

        while provider.call_count(MockOperation::UploadFile) == 0 {
            tokio::task::yield_now().await;
        }
        assert!(provider.uploads().is_empty());

        gate.notify_one();
        let uploaded = task.await.unwrap().unwrap();
        assert_eq!(uploaded.file_id, FIRST_GENERATED_ID);
        assert_eq!(provider.uploads().len(), 1);
    }
}
