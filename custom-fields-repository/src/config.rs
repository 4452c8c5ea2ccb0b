//! Configuration types for the FieldsService and the HTTP provider.

use std::time::Duration;

/// Default maximum number of updates in one submission.
pub const DEFAULT_MAX_UPDATES: usize = 500;

/// Default maximum upload size (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the FieldsService.
///
/// Controls the local guards applied before a request is handed to the
/// provider, so oversized submissions and uploads fail fast without a round trip.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Maximum number of field updates allowed in a single submission.
    ///
    /// Set to `None` to disable the limit.
    pub max_updates_per_submission: Option<usize>,
    /// Maximum size of a single uploaded file in bytes.
    ///
    /// Set to `None` to disable the limit.
    pub max_upload_bytes: Option<usize>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_updates_per_submission: Some(DEFAULT_MAX_UPDATES),
            max_upload_bytes: Some(DEFAULT_MAX_UPLOAD_BYTES),
        }
    }
}

impl ServiceConfig {
    /// Create a config with no submission or upload limits.
    pub fn unlimited() -> Self {
        Self {
            max_updates_per_submission: None,
            max_upload_bytes: None,
        }
    }

    /// Override the submission size limit. `0` disables the limit.
    pub fn with_max_updates(mut self, max_updates: usize) -> Self {
        self.max_updates_per_submission = (max_updates > 0).then_some(max_updates);
        self
    }

    /// Override the upload size limit.
    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = Some(max_upload_bytes);
        self
    }
}

/// Configuration for the HTTP provider.
#[derive(Debug, Clone)]
pub struct HttpProviderConfig {
    /// Base URL of the API, e.g. `https://admin.example.com/api/`.
    pub base_url: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl HttpProviderConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}
