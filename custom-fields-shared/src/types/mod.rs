//! This module defines the core data structures used across the custom fields engine.
//! It re-exports the schema, value and compliance types from their submodules.

pub mod compliance;
pub mod envelope;
pub mod field;
pub mod hierarchy;
pub mod value;

pub use compliance::ComplianceFieldValue;
pub use envelope::Envelope;
pub use field::{FieldDefinition, FieldKind};
pub use hierarchy::{HierarchyResponse, ValuesResponse};
pub use value::{FieldUpdate, GroupEntry, TypedValue, ValueRecord};
