//! Hierarchy and values response types.
//!
//! The hierarchy response describes the schema: sections, subsections and
//! field definitions. The values response has the same tree shape, with each
//! field additionally carrying its stored [`ValueRecord`] and each repeatable
//! subsection carrying its [`GroupEntry`] records.

use serde::{Deserialize, Serialize};

use crate::serde_helpers::{bool_or_false, bool_or_true, default_true, null_as_default};
use crate::types::field::{FieldDefinition, SectionId, SubsectionId};
use crate::types::value::{GroupEntry, ValueRecord};

/// Nested grouping inside a section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubsectionDefinition {
    pub id: SubsectionId,
    #[serde(default, alias = "name", deserialize_with = "null_as_default")]
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "bool_or_false")]
    pub is_repeatable: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sort_order: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fields: Vec<FieldDefinition>,
}

impl SubsectionDefinition {
    pub fn new(id: SubsectionId, label: impl Into<String>, fields: Vec<FieldDefinition>) -> Self {
        Self {
            id,
            label: label.into(),
            description: None,
            is_repeatable: false,
            sort_order: 0,
            fields,
        }
    }

    pub fn repeatable(mut self) -> Self {
        self.is_repeatable = true;
        self
    }
}

/// Top-level grouping of fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionDefinition {
    pub id: SectionId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true", deserialize_with = "bool_or_true")]
    pub is_active: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sort_order: i64,
    #[serde(default, deserialize_with = "bool_or_false")]
    pub is_collapsible: bool,
    #[serde(default, deserialize_with = "bool_or_false")]
    pub collapsed_by_default: bool,
    #[serde(default, alias = "fields", deserialize_with = "null_as_default")]
    pub direct_fields: Vec<FieldDefinition>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subsections: Vec<SubsectionDefinition>,
}

impl SectionDefinition {
    pub fn new(id: SectionId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            is_active: true,
            sort_order: 0,
            is_collapsible: false,
            collapsed_by_default: false,
            direct_fields: Vec::new(),
            subsections: Vec::new(),
        }
    }

    pub fn with_fields(mut self, fields: Vec<FieldDefinition>) -> Self {
        self.direct_fields = fields;
        self
    }

    pub fn with_subsection(mut self, subsection: SubsectionDefinition) -> Self {
        self.subsections.push(subsection);
        self
    }

    pub fn with_sort_order(mut self, sort_order: i64) -> Self {
        self.sort_order = sort_order;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// All field definitions in this section, direct fields first.
    pub fn all_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.direct_fields
            .iter()
            .chain(self.subsections.iter().flat_map(|s| s.fields.iter()))
    }
}

/// Schema response: the sections, optionally with a root-level orphan list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub sections: Vec<SectionDefinition>,
    /// Fields not attached to any section, when the server supplies them.
    #[serde(default)]
    pub fields: Option<Vec<FieldDefinition>>,
}

impl HierarchyResponse {
    pub fn new(sections: Vec<SectionDefinition>) -> Self {
        Self {
            sections,
            fields: None,
        }
    }
}

/// A field definition together with its stored value for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuedField {
    #[serde(flatten)]
    pub definition: FieldDefinition,
    #[serde(default, alias = "storedValue")]
    pub value: Option<ValueRecord>,
}

impl ValuedField {
    pub fn new(definition: FieldDefinition, value: Option<ValueRecord>) -> Self {
        Self { definition, value }
    }
}

/// Values-response counterpart of [`SubsectionDefinition`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuedSubsection {
    pub id: SubsectionId,
    #[serde(default, deserialize_with = "bool_or_false")]
    pub is_repeatable: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fields: Vec<ValuedField>,
    #[serde(default, alias = "groups", deserialize_with = "null_as_default")]
    pub entries: Vec<GroupEntry>,
}

/// Values-response counterpart of [`SectionDefinition`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuedSection {
    pub id: SectionId,
    #[serde(default, alias = "fields", deserialize_with = "null_as_default")]
    pub direct_fields: Vec<ValuedField>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subsections: Vec<ValuedSubsection>,
}

/// Per-entity values response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuesResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub sections: Vec<ValuedSection>,
    #[serde(default)]
    pub fields: Option<Vec<ValuedField>>,
}

impl ValuesResponse {
    /// Every valued field in the response, in tree order, root-level fields last.
    pub fn all_fields(&self) -> impl Iterator<Item = &ValuedField> {
        self.sections
            .iter()
            .flat_map(|section| {
                section
                    .direct_fields
                    .iter()
                    .chain(section.subsections.iter().flat_map(|s| s.fields.iter()))
            })
            .chain(self.fields.iter().flatten())
    }

    /// Every group entry in the response.
    pub fn all_entries(&self) -> impl Iterator<Item = &GroupEntry> {
        self.sections
            .iter()
            .flat_map(|section| section.subsections.iter())
            .flat_map(|subsection| subsection.entries.iter())
    }
}
