//! Interface definitions for the custom fields backend.
//!
//! This module defines the abstract `CustomFieldsProvider` trait that allows
//! for dependency injection and swappable backend implementations.

mod custom_fields_provider;

pub use custom_fields_provider::CustomFieldsProvider;
