//! # Custom Fields Shared
//!
//! This crate defines the data model shared across the custom fields engine.
//! It covers the admin-configured schema (sections, subsections and field
//! definitions), the per-entity value payloads returned by the server, the
//! typed in-memory values the engine edits, and compliance records.
//!
//! Every type here is deserialized leniently: the schema is admin-configurable
//! and the backend has shipped several response shapes over time, so missing
//! lists, `null` flags and unknown field types degrade to defaults instead of
//! failing the whole payload.

pub mod serde_helpers;
pub mod types;

pub use types::compliance::{
    ComplianceConfig, ComplianceFieldValue, ComplianceFile, ComplianceHistoryEntry,
};
pub use types::envelope::Envelope;
pub use types::field::{
    EntryId, FieldDefinition, FieldId, FieldKind, FieldOption, FieldRelationship,
    ManagementField, SectionId, SubFieldDefinition, SubsectionId,
};
pub use types::hierarchy::{
    HierarchyResponse, SectionDefinition, SubsectionDefinition, ValuedField, ValuedSection,
    ValuedSubsection, ValuesResponse,
};
pub use types::value::{FieldUpdate, GroupEntry, TypedValue, ValueRecord};
