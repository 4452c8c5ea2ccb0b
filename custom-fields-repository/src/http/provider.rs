//! HTTP provider implementation.
//!
//! Talks JSON over HTTP to the admin backend. Every response body passes
//! through [`Envelope`] so both `{ "data": .. }` and bare payloads decode to the
//! same type.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument, warn};

use custom_fields_shared::{
    ComplianceFieldValue, ComplianceHistoryEntry, EntryId, Envelope, FieldUpdate, GroupEntry,
    HierarchyResponse, ManagementField, ValuesResponse,
};

use crate::config::HttpProviderConfig;
use crate::errors::FieldsApiError;
use crate::http::routes::Routes;
use crate::interfaces::CustomFieldsProvider;
use crate::types::{
    CompliancePayload, ComplianceQuery, CreateGroupEntryRequest, EntityRef, FileUpload,
    UploadedFile,
};

/// Maximum number of response body bytes kept in a status error.
const ERROR_BODY_LIMIT: usize = 512;

#[derive(Deserialize)]
struct FileUrlResponse {
    #[serde(alias = "downloadUrl", alias = "download_url")]
    url: String,
}

/// Production provider that talks to the admin API over HTTP.
///
/// # Example
///
/// ```no_run
/// use custom_fields_repository::{CustomFieldsProvider, HttpFieldsProvider, HttpProviderConfig};
///
/// # async fn example() -> Result<(), custom_fields_repository::FieldsApiError> {
/// let provider = HttpFieldsProvider::new(HttpProviderConfig::new("https://admin.example.com/api/"))?;
/// let hierarchy = provider.fetch_hierarchy("user", None).await?;
/// # Ok(())
/// # }
/// ```
pub struct HttpFieldsProvider {
    client: Client,
    routes: Routes,
}

impl HttpFieldsProvider {
    /// Create a provider from configuration.
    ///
    /// # Errors
    ///
    /// Returns `FieldsApiError::ValidationError` for an invalid base URL and
    /// `FieldsApiError::NetworkError` when the HTTP client cannot be built.
    pub fn new(config: HttpProviderConfig) -> Result<Self, FieldsApiError> {
        let routes = Routes::new(&config.base_url)?;
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| FieldsApiError::network(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, routes })
    }

    /// Map non-success statuses to errors, keeping a bounded slice of the body.
    async fn check_status(response: Response) -> Result<Response, FieldsApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().to_string();
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > ERROR_BODY_LIMIT {
            let mut cut = ERROR_BODY_LIMIT;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }

        warn!(url = %url, status = status.as_u16(), "Backend returned non-success status");

        if status == StatusCode::NOT_FOUND {
            Err(FieldsApiError::not_found(url))
        } else {
            Err(FieldsApiError::status(status.as_u16(), body))
        }
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, FieldsApiError> {
        let response = Self::check_status(response).await?;
        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| FieldsApiError::decode(e.to_string()))?;
        Ok(envelope.into_inner())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: url::Url) -> Result<T, FieldsApiError> {
        debug!(url = %url, "GET");
        let response = self.client.get(url).send().await?;
        Self::read_json(response).await
    }
}

#[async_trait]
impl CustomFieldsProvider for HttpFieldsProvider {
    #[instrument(skip(self))]
    async fn fetch_hierarchy(
        &self,
        entity_type: &str,
        entity_slug: Option<&str>,
    ) -> Result<HierarchyResponse, FieldsApiError> {
        self.get_json(self.routes.hierarchy(entity_type, entity_slug))
            .await
    }

    #[instrument(skip(self, entity), fields(entity = %entity))]
    async fn fetch_entity_values(
        &self,
        entity: &EntityRef,
    ) -> Result<ValuesResponse, FieldsApiError> {
        self.get_json(self.routes.entity_values(entity)).await
    }

    #[instrument(skip(self))]
    async fn fetch_management_fields(
        &self,
        entity_type: &str,
    ) -> Result<Vec<ManagementField>, FieldsApiError> {
        self.get_json(self.routes.management_fields(entity_type))
            .await
    }

    #[instrument(skip(self, entity, query), fields(entity = %entity))]
    async fn fetch_compliance_fields(
        &self,
        entity: &EntityRef,
        query: &ComplianceQuery,
    ) -> Result<Vec<ComplianceFieldValue>, FieldsApiError> {
        self.get_json(self.routes.compliance_fields(entity, query))
            .await
    }

    #[instrument(skip(self))]
    async fn fetch_compliance_history(
        &self,
        value_id: i64,
    ) -> Result<Vec<ComplianceHistoryEntry>, FieldsApiError> {
        self.get_json(self.routes.compliance_history(value_id))
            .await
    }

    #[instrument(skip(self, updates), fields(update_count = updates.len()))]
    async fn submit_field_updates(
        &self,
        entity_slug: &str,
        updates: &[FieldUpdate],
    ) -> Result<(), FieldsApiError> {
        let response = self
            .client
            .post(self.routes.submit_updates(entity_slug))
            .json(&json!({ "updates": updates }))
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }

    #[instrument(skip(self, file), fields(file_name = %file.file_name, size = file.bytes.len()))]
    async fn upload_file(&self, file: &FileUpload) -> Result<UploadedFile, FieldsApiError> {
        let mut part = Part::bytes(file.bytes.clone()).file_name(file.file_name.clone());
        if let Some(content_type) = &file.content_type {
            part = part
                .mime_str(content_type)
                .map_err(|e| FieldsApiError::upload(format!("Invalid content type: {}", e)))?;
        }
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(self.routes.files())
            .multipart(form)
            .send()
            .await?;

        match Self::read_json(response).await {
            Ok(uploaded) => Ok(uploaded),
            Err(FieldsApiError::StatusError { status, body }) => Err(FieldsApiError::upload(
                format!("Upload rejected with status {}: {}", status, body),
            )),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    async fn resolve_file_url(&self, file_id: i64) -> Result<String, FieldsApiError> {
        let response: FileUrlResponse = self.get_json(self.routes.file_url(file_id)).await?;
        Ok(response.url)
    }

    #[instrument(skip(self, payload), fields(custom_field_id = payload.custom_field_id))]
    async fn upload_compliance(&self, payload: &CompliancePayload) -> Result<(), FieldsApiError> {
        let response = self
            .client
            .post(self.routes.compliance_values())
            .json(payload)
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }

    #[instrument(skip(self, payload), fields(custom_field_id = payload.custom_field_id))]
    async fn renew_compliance(
        &self,
        value_slug: &str,
        payload: &CompliancePayload,
    ) -> Result<(), FieldsApiError> {
        let response = self
            .client
            .post(self.routes.renew_compliance(value_slug))
            .json(payload)
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }

    #[instrument(skip(self, request), fields(subsection_id = request.subsection_id))]
    async fn create_group_entry(
        &self,
        request: &CreateGroupEntryRequest,
    ) -> Result<GroupEntry, FieldsApiError> {
        let response = self
            .client
            .post(self.routes.group_entries())
            .json(request)
            .send()
            .await?;
        Self::read_json(response).await
    }

    #[instrument(skip(self))]
    async fn delete_group_entry(&self, entry_id: EntryId) -> Result<(), FieldsApiError> {
        let response = self
            .client
            .delete(self.routes.group_entry(entry_id))
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }

    #[instrument(skip(self, updates), fields(update_count = updates.len()))]
    async fn update_group_entry(
        &self,
        entry_id: EntryId,
        updates: &[FieldUpdate],
    ) -> Result<(), FieldsApiError> {
        let response = self
            .client
            .patch(self.routes.group_entry_values(entry_id))
            .json(&json!({ "updates": updates }))
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }
}
