//! Collaborator error types.
//!
//! This module defines the unified error type for every call the engine issues
//! to its backend: schema and value fetches, submissions, uploads and the
//! compliance workflow.

use thiserror::Error;

/// Unified errors from collaborator operations.
///
/// Used by the `CustomFieldsProvider` trait and `FieldsService`. Covers both
/// transport failures (connection, timeout, non-success status) and request
/// validation performed before anything is sent. The type is `Clone` so test
/// doubles can replay a scripted failure.
#[derive(Debug, Clone, Error)]
pub enum FieldsApiError {
    /// Request rejected locally before being sent.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Failed to reach the backend.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The request did not complete within the configured timeout.
    #[error("Request timed out")]
    Timeout,

    /// The backend answered with a non-success status.
    #[error("Unexpected status {status}: {body}")]
    StatusError { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// The addressed resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A file upload was rejected.
    #[error("Upload error: {0}")]
    UploadError(String),

    /// Too many updates in one submission.
    #[error("Batch size {provided} exceeds maximum {max}")]
    BatchSizeExceeded { provided: usize, max: usize },

    /// Unknown error.
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl FieldsApiError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create a network error.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::NetworkError(msg.into())
    }

    /// Create a status error.
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::StatusError {
            status,
            body: body.into(),
        }
    }

    /// Create a decode error.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::DecodeError(msg.into())
    }

    /// Create a not found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an upload error.
    pub fn upload(msg: impl Into<String>) -> Self {
        Self::UploadError(msg.into())
    }

    /// Create a batch size exceeded error.
    pub fn batch_size_exceeded(provided: usize, max: usize) -> Self {
        Self::BatchSizeExceeded { provided, max }
    }

    /// Create an unknown error.
    pub fn unknown(msg: impl Into<String>) -> Self {
        Self::Unknown(msg.into())
    }

    /// Whether the failure happened before anything reached the backend.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::ValidationError(_) | Self::BatchSizeExceeded { .. }
        )
    }
}

impl From<reqwest::Error> for FieldsApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::DecodeError(err.to_string())
        } else if let Some(status) = err.status() {
            Self::status(status.as_u16(), err.to_string())
        } else {
            Self::NetworkError(err.to_string())
        }
    }
}

impl From<url::ParseError> for FieldsApiError {
    fn from(err: url::ParseError) -> Self {
        Self::ValidationError(format!("Invalid URL: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            FieldsApiError::status(422, "slug is invalid").to_string(),
            "Unexpected status 422: slug is invalid"
        );
        assert_eq!(
            FieldsApiError::batch_size_exceeded(12, 10).to_string(),
            "Batch size 12 exceeds maximum 10"
        );
        assert_eq!(FieldsApiError::Timeout.to_string(), "Request timed out");
    }

    #[test]
    fn test_is_local() {
        assert!(FieldsApiError::validation("x").is_local());
        assert!(FieldsApiError::batch_size_exceeded(2, 1).is_local());
        assert!(!FieldsApiError::network("down").is_local());
        assert!(!FieldsApiError::status(500, "").is_local());
    }

    #[test]
    fn test_from_url_parse_error() {
        let err: FieldsApiError = url::Url::parse("not a url").unwrap_err().into();
        assert!(matches!(err, FieldsApiError::ValidationError(_)));
    }
}
