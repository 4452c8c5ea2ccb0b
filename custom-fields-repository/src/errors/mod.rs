//! Error types for the custom fields repository.
//!
//! This module provides a unified error type for all collaborator operations.

mod fields_api_error;

pub use fields_api_error::FieldsApiError;
