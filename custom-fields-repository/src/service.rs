//! Custom fields service implementation.
//!
//! This module provides the validated entry point to the backend. The engine
//! never talks to a provider directly: every request passes through
//! `FieldsService`, which rejects malformed input locally and then delegates.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use custom_fields_shared::{
    ComplianceFieldValue, ComplianceHistoryEntry, EntryId, FieldUpdate, GroupEntry,
    HierarchyResponse, ManagementField, SubsectionId, ValuesResponse,
};

use crate::config::ServiceConfig;
use crate::errors::FieldsApiError;
use crate::interfaces::CustomFieldsProvider;
use crate::types::{
    CompliancePayload, ComplianceQuery, CreateGroupEntryRequest, EntityRef, FileUpload,
    UploadedFile,
};
use crate::utils::{require_non_blank, validate_entity};

/// The main service for reading and writing custom field data.
///
/// Provides input validation and delegates to a `CustomFieldsProvider` for the
/// actual backend operations. All operations return `FieldsApiError`.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use custom_fields_repository::{EntityRef, FieldsService, HttpFieldsProvider, HttpProviderConfig};
///
/// # async fn example() -> Result<(), custom_fields_repository::FieldsApiError> {
/// let provider = HttpFieldsProvider::new(HttpProviderConfig::new("http://localhost:8000/api/"))?;
/// let service = FieldsService::new(Arc::new(provider));
///
/// let values = service.fetch_entity_values(&EntityRef::new("user", "jane-doe")).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct FieldsService {
    provider: Arc<dyn CustomFieldsProvider>,
    config: ServiceConfig,
}

impl FieldsService {
    /// Create a new FieldsService with default configuration.
    ///
    /// The default configuration limits submissions to 500 updates and uploads to 10 MiB.
    pub fn new(provider: Arc<dyn CustomFieldsProvider>) -> Self {
        Self {
            provider,
            config: ServiceConfig::default(),
        }
    }

    /// Create a new FieldsService with custom configuration.
    pub fn with_config(provider: Arc<dyn CustomFieldsProvider>, config: ServiceConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn validate_batch_size(&self, size: usize) -> Result<(), FieldsApiError> {
        if let Some(max) = self.config.max_updates_per_submission {
            if size > max {
                return Err(FieldsApiError::batch_size_exceeded(size, max));
            }
        }
        Ok(())
    }

    /// Validate a set of updates: non-empty, within the batch limit, each slug
    /// present and used once.
    fn validate_updates(&self, updates: &[FieldUpdate]) -> Result<(), FieldsApiError> {
        if updates.is_empty() {
            return Err(FieldsApiError::validation(
                "At least one update must be provided",
            ));
        }
        self.validate_batch_size(updates.len())?;

        let mut seen = HashSet::with_capacity(updates.len());
        for update in updates {
            require_non_blank("slug", &update.slug)?;
            if !seen.insert(update.slug.as_str()) {
                return Err(FieldsApiError::validation(format!(
                    "Duplicate update for slug '{}'",
                    update.slug
                )));
            }
        }
        Ok(())
    }

    fn validate_compliance_payload(payload: &CompliancePayload) -> Result<(), FieldsApiError> {
        require_non_blank("entity_type", &payload.entity_type)?;
        require_non_blank("entity_slug", &payload.entity_slug)?;
        if payload.file_ids.is_empty() && payload.sub_field_values.is_empty() {
            return Err(FieldsApiError::validation(
                "A compliance submission needs at least one file or sub-field value",
            ));
        }
        Ok(())
    }

    /// Fetch the schema for an entity type, optionally narrowed to one entity.
    pub async fn fetch_hierarchy(
        &self,
        entity_type: &str,
        entity_slug: Option<&str>,
    ) -> Result<HierarchyResponse, FieldsApiError> {
        require_non_blank("entity_type", entity_type)?;
        self.provider.fetch_hierarchy(entity_type, entity_slug).await
    }

    /// Fetch the schema tree with stored values for one entity.
    pub async fn fetch_entity_values(
        &self,
        entity: &EntityRef,
    ) -> Result<ValuesResponse, FieldsApiError> {
        validate_entity(entity)?;
        self.provider.fetch_entity_values(entity).await
    }

    /// Fetch the flat management listing of configured fields.
    pub async fn fetch_management_fields(
        &self,
        entity_type: &str,
    ) -> Result<Vec<ManagementField>, FieldsApiError> {
        require_non_blank("entity_type", entity_type)?;
        self.provider.fetch_management_fields(entity_type).await
    }

    pub async fn fetch_compliance_fields(
        &self,
        entity: &EntityRef,
        query: &ComplianceQuery,
    ) -> Result<Vec<ComplianceFieldValue>, FieldsApiError> {
        validate_entity(entity)?;
        self.provider.fetch_compliance_fields(entity, query).await
    }

    /// Fetch the history of a compliance value.
    ///
    /// # Returns
    ///
    /// * `Err(FieldsApiError::ValidationError)` - If `value_id` is not a stored record id
    pub async fn fetch_compliance_history(
        &self,
        value_id: i64,
    ) -> Result<Vec<ComplianceHistoryEntry>, FieldsApiError> {
        if value_id <= 0 {
            return Err(FieldsApiError::validation(format!(
                "Compliance value id must be positive, got {}",
                value_id
            )));
        }
        self.provider.fetch_compliance_history(value_id).await
    }

    /// Submit scalar field changes for an entity.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the backend accepted the whole batch
    /// * `Err(FieldsApiError::BatchSizeExceeded)` - If the batch exceeds the configured maximum
    /// * `Err(FieldsApiError::ValidationError)` - If the batch is empty or a slug is blank or repeated
    /// * `Err(FieldsApiError)` - If the request fails
    pub async fn submit_field_updates(
        &self,
        entity_slug: &str,
        updates: &[FieldUpdate],
    ) -> Result<(), FieldsApiError> {
        require_non_blank("entity_slug", entity_slug)?;
        self.validate_updates(updates)?;
        debug!(entity_slug, update_count = updates.len(), "Submitting field updates");
        self.provider.submit_field_updates(entity_slug, updates).await
    }

    /// Upload one file.
    pub async fn upload_file(&self, file: &FileUpload) -> Result<UploadedFile, FieldsApiError> {
        require_non_blank("file_name", &file.file_name)?;
        if file.bytes.is_empty() {
            return Err(FieldsApiError::validation(format!(
                "File '{}' is empty",
                file.file_name
            )));
        }
        if let Some(max) = self.config.max_upload_bytes {
            if file.bytes.len() > max {
                return Err(FieldsApiError::validation(format!(
                    "File '{}' is {} bytes, maximum is {}",
                    file.file_name,
                    file.bytes.len(),
                    max
                )));
            }
        }
        self.provider.upload_file(file).await
    }

    pub async fn resolve_file_url(&self, file_id: i64) -> Result<String, FieldsApiError> {
        self.provider.resolve_file_url(file_id).await
    }

    /// Create the first compliance value for a field.
    pub async fn upload_compliance(
        &self,
        payload: &CompliancePayload,
    ) -> Result<(), FieldsApiError> {
        Self::validate_compliance_payload(payload)?;
        self.provider.upload_compliance(payload).await
    }

    /// Renew an existing compliance value identified by its slug.
    pub async fn renew_compliance(
        &self,
        value_slug: &str,
        payload: &CompliancePayload,
    ) -> Result<(), FieldsApiError> {
        require_non_blank("value_slug", value_slug)?;
        Self::validate_compliance_payload(payload)?;
        self.provider.renew_compliance(value_slug, payload).await
    }

    /// Create an entry in a repeatable subsection. The label is trimmed.
    pub async fn create_group_entry(
        &self,
        entity: &EntityRef,
        subsection_id: SubsectionId,
        label: &str,
    ) -> Result<GroupEntry, FieldsApiError> {
        validate_entity(entity)?;
        let request = CreateGroupEntryRequest {
            entity_type: entity.entity_type.clone(),
            entity_slug: entity.entity_slug.clone(),
            subsection_id,
            label: label.trim().to_string(),
        };
        self.provider.create_group_entry(&request).await
    }

    pub async fn delete_group_entry(&self, entry_id: EntryId) -> Result<(), FieldsApiError> {
        self.provider.delete_group_entry(entry_id).await
    }

    /// Persist changed values of one group entry.
    pub async fn update_group_entry(
        &self,
        entry_id: EntryId,
        updates: &[FieldUpdate],
    ) -> Result<(), FieldsApiError> {
        self.validate_updates(updates)?;
        self.provider.update_group_entry(entry_id, updates).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockFieldsProvider, MockOperation};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn service_with(provider: Arc<MockFieldsProvider>) -> FieldsService {
        FieldsService::new(provider)
    }

    fn update(slug: &str) -> FieldUpdate {
        FieldUpdate::new(slug, json!("value"))
    }

    #[tokio::test]
    async fn test_submit_delegates_valid_batch() {
        let provider = Arc::new(MockFieldsProvider::new());
        let service = service_with(Arc::clone(&provider));

        service
            .submit_field_updates("jane", &[update("a"), update("b")])
            .await
            .unwrap();

        let submissions = provider.submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].1.len(), 2);
    }

    #[tokio::test]
    async fn test_submit_rejects_empty_batch_without_calling_provider() {
        let provider = Arc::new(MockFieldsProvider::new());
        let service = service_with(Arc::clone(&provider));

        let result = service.submit_field_updates("jane", &[]).await;

        assert!(matches!(result, Err(FieldsApiError::ValidationError(_))));
        assert_eq!(provider.call_count(MockOperation::SubmitUpdates), 0);
    }

    #[tokio::test]
    async fn test_submit_rejects_duplicate_slugs() {
        let provider = Arc::new(MockFieldsProvider::new());
        let service = service_with(Arc::clone(&provider));

        let result = service
            .submit_field_updates("jane", &[update("a"), update("a")])
            .await;

        assert!(matches!(result, Err(FieldsApiError::ValidationError(_))));
        assert_eq!(provider.call_count(MockOperation::SubmitUpdates), 0);
    }

    #[tokio::test]
    async fn test_submit_respects_batch_limit() {
        let provider = Arc::new(MockFieldsProvider::new());
        let service = FieldsService::with_config(
            provider.clone(),
            ServiceConfig::default().with_max_updates(1),
        );

        let result = service
            .submit_field_updates("jane", &[update("a"), update("b")])
            .await;

        assert!(matches!(
            result,
            Err(FieldsApiError::BatchSizeExceeded {
                provided: 2,
                max: 1
            })
        ));
    }

    #[tokio::test]
    async fn test_submit_propagates_provider_failure() {
        let provider = Arc::new(MockFieldsProvider::new());
        provider.fail(MockOperation::SubmitUpdates, FieldsApiError::status(500, "boom"));
        let service = service_with(Arc::clone(&provider));

        let result = service.submit_field_updates("jane", &[update("a")]).await;

        assert!(matches!(
            result,
            Err(FieldsApiError::StatusError { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_upload_rejects_empty_and_oversized_files() {
        let provider = Arc::new(MockFieldsProvider::new());
        let service = FieldsService::with_config(
            provider.clone(),
            ServiceConfig::default().with_max_upload_bytes(4),
        );

        let empty = service.upload_file(&FileUpload::new("a.pdf", vec![])).await;
        assert!(matches!(empty, Err(FieldsApiError::ValidationError(_))));

        let large = service
            .upload_file(&FileUpload::new("a.pdf", vec![0; 5]))
            .await;
        assert!(matches!(large, Err(FieldsApiError::ValidationError(_))));

        assert!(service
            .upload_file(&FileUpload::new("a.pdf", vec![0; 4]))
            .await
            .is_ok());
        assert_eq!(provider.uploads().len(), 1);
    }

    #[tokio::test]
    async fn test_history_requires_stored_value() {
        let service = service_with(Arc::new(MockFieldsProvider::new()));
        assert!(matches!(
            service.fetch_compliance_history(0).await,
            Err(FieldsApiError::ValidationError(_))
        ));
        assert!(service.fetch_compliance_history(3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_compliance_payload_needs_content() {
        let service = service_with(Arc::new(MockFieldsProvider::new()));
        let payload = CompliancePayload {
            entity_type: "user".to_string(),
            entity_slug: "jane".to_string(),
            custom_field_id: 1,
            file_ids: vec![],
            sub_field_values: BTreeMap::new(),
            notes: None,
        };

        assert!(matches!(
            service.upload_compliance(&payload).await,
            Err(FieldsApiError::ValidationError(_))
        ));
        assert!(matches!(
            service.renew_compliance("", &payload).await,
            Err(FieldsApiError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_create_group_entry_trims_label() {
        let service = service_with(Arc::new(MockFieldsProvider::new()));
        let entry = service
            .create_group_entry(&EntityRef::new("user", "jane"), 4, "  Vehicle 1  ")
            .await
            .unwrap();

        assert_eq!(entry.subsection_id, 4);
        assert_eq!(entry.label, "Vehicle 1");
    }

    #[tokio::test]
    async fn test_fetch_rejects_blank_entity() {
        let provider = Arc::new(MockFieldsProvider::new());
        let service = service_with(Arc::clone(&provider));

        let result = service
            .fetch_entity_values(&EntityRef::new("user", ""))
            .await;

        assert!(matches!(result, Err(FieldsApiError::ValidationError(_))));
        assert_eq!(provider.call_count(MockOperation::FetchValues), 0);
    }
}
