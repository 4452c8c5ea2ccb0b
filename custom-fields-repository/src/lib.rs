//! # Custom Fields Repository
//!
//! This crate provides the collaborator boundary of the custom fields engine:
//! the `CustomFieldsProvider` trait covering every backend call, an HTTP
//! implementation, an in-memory mock, and `FieldsService`, which validates
//! requests before delegating to a provider.

pub mod config;
pub mod errors;
pub mod http;
pub mod interfaces;
pub mod mock;
pub mod service;
pub mod types;
pub mod utils;

pub use config::{HttpProviderConfig, ServiceConfig};
pub use errors::FieldsApiError;
pub use http::HttpFieldsProvider;
pub use interfaces::CustomFieldsProvider;
pub use mock::{MockFieldsProvider, MockOperation};
pub use service::FieldsService;
pub use types::{
    CompliancePayload, ComplianceQuery, CreateGroupEntryRequest, EntityRef, FileUpload,
    UploadedFile,
};
pub use utils::{require_non_blank, validate_entity};
