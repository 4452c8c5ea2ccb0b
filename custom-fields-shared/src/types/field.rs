//! Field definition types.
//!
//! A field definition is one admin-configured attribute. Field ids are unique
//! across the whole hierarchy: sections, subsections and the orphaned-field
//! listings all share one namespace.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::serde_helpers::{bool_or_false, bool_or_true, default_true, null_as_default};
use crate::types::compliance::ComplianceConfig;

/// Stable numeric identity of a field definition.
pub type FieldId = i64;
/// Identity of a top-level section.
pub type SectionId = i64;
/// Identity of a subsection.
pub type SubsectionId = i64;
/// Identity of one repetition of a repeatable subsection.
pub type EntryId = i64;

/// The declared type of a field.
///
/// Unknown type names parse as [`FieldKind::Unknown`] rather than failing,
/// and are treated as plain text by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Email,
    Phone,
    Number,
    Decimal,
    Textarea,
    Date,
    Datetime,
    Time,
    Boolean,
    Select,
    Dropdown,
    Radio,
    Multiselect,
    File,
    Json,
    Compliance,
    #[default]
    #[serde(other)]
    Unknown,
}

impl FieldKind {
    /// The wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Number => "number",
            Self::Decimal => "decimal",
            Self::Textarea => "textarea",
            Self::Date => "date",
            Self::Datetime => "datetime",
            Self::Time => "time",
            Self::Boolean => "boolean",
            Self::Select => "select",
            Self::Dropdown => "dropdown",
            Self::Radio => "radio",
            Self::Multiselect => "multiselect",
            Self::File => "file",
            Self::Json => "json",
            Self::Compliance => "compliance",
            Self::Unknown => "unknown",
        }
    }

    /// Whether values of this kind are edited inline and persisted through the bulk diff.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Self::Compliance)
    }

    /// Single-choice kinds backed by an option list.
    pub fn is_single_choice(&self) -> bool {
        matches!(self, Self::Select | Self::Dropdown | Self::Radio)
    }

    /// Whether the kind carries an option list at all.
    pub fn has_options(&self) -> bool {
        self.is_single_choice() || matches!(self, Self::Multiselect)
    }
}

/// One selectable option of a `select`/`multiselect` field.
///
/// Accepts both `{ "value": .., "label": .. }` objects and bare strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawOption")]
pub struct FieldOption {
    pub value: String,
    pub label: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawOption {
    Full {
        value: Value,
        #[serde(default)]
        label: Option<String>,
    },
    Bare(String),
}

impl From<RawOption> for FieldOption {
    fn from(raw: RawOption) -> Self {
        match raw {
            RawOption::Full { value, label } => {
                let value = match value {
                    Value::String(s) => s,
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                let label = label.unwrap_or_else(|| value.clone());
                Self { value, label }
            }
            RawOption::Bare(value) => Self {
                label: value.clone(),
                value,
            },
        }
    }
}

impl FieldOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Marks a field as a mirror of another field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldRelationship {
    #[serde(alias = "target_field_id")]
    pub target_field_id: FieldId,
}

/// Definition of one input inside a compliance field's upload form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubFieldDefinition {
    #[serde(alias = "name", alias = "slug")]
    pub key: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub label: String,
    #[serde(rename = "type", alias = "fieldType", default, deserialize_with = "null_as_default")]
    pub kind: FieldKind,
    #[serde(default, deserialize_with = "bool_or_false")]
    pub is_required: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub options: Vec<FieldOption>,
}

/// One configurable attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub id: FieldId,
    /// Persistence key, stable across renames.
    #[serde(default, deserialize_with = "null_as_default")]
    pub slug: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(
        rename = "type",
        alias = "fieldType",
        alias = "field_type",
        default,
        deserialize_with = "null_as_default"
    )]
    pub kind: FieldKind,
    #[serde(default, deserialize_with = "bool_or_false")]
    pub is_required: bool,
    #[serde(default = "default_true", deserialize_with = "bool_or_true")]
    pub is_active: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sort_order: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub options: Vec<FieldOption>,
    #[serde(default)]
    pub relationship: Option<FieldRelationship>,
    #[serde(default)]
    pub compliance_config: Option<ComplianceConfig>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sub_field_definitions: Vec<SubFieldDefinition>,
}

impl FieldDefinition {
    /// Create an active, optional field with no label, options or relationship.
    pub fn new(id: FieldId, slug: impl Into<String>, kind: FieldKind) -> Self {
        let slug = slug.into();
        Self {
            id,
            name: slug.clone(),
            label: String::new(),
            slug,
            description: None,
            kind,
            is_required: false,
            is_active: true,
            sort_order: 0,
            options: Vec::new(),
            relationship: None,
            compliance_config: None,
            sub_field_definitions: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_sort_order(mut self, sort_order: i64) -> Self {
        self.sort_order = sort_order;
        self
    }

    pub fn with_options(mut self, options: Vec<FieldOption>) -> Self {
        self.options = options;
        self
    }

    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Make this field a mirror of `target`.
    pub fn mirroring(mut self, target: FieldId) -> Self {
        self.relationship = Some(FieldRelationship {
            target_field_id: target,
        });
        self
    }

    /// The label to show, falling back to the name and then the slug.
    pub fn display_label(&self) -> &str {
        if !self.label.trim().is_empty() {
            &self.label
        } else if !self.name.trim().is_empty() {
            &self.name
        } else {
            &self.slug
        }
    }

    /// The field this one mirrors, if any.
    pub fn mirror_target(&self) -> Option<FieldId> {
        self.relationship.map(|r| r.target_field_id)
    }

    pub fn is_compliance(&self) -> bool {
        self.kind == FieldKind::Compliance
    }

    /// Whether `value` is one of the declared option values.
    pub fn has_option(&self, value: &str) -> bool {
        self.options.iter().any(|o| o.value == value)
    }
}

/// A field as returned by the entity-type-scoped management listing.
///
/// The listing is flat; `section_id` is `None` for fields not yet placed in
/// any section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagementField {
    #[serde(flatten)]
    pub field: FieldDefinition,
    #[serde(default, alias = "section_id")]
    pub section_id: Option<SectionId>,
    #[serde(default, alias = "subsection_id")]
    pub subsection_id: Option<SubsectionId>,
}

impl ManagementField {
    pub fn unassigned(field: FieldDefinition) -> Self {
        Self {
            field,
            section_id: None,
            subsection_id: None,
        }
    }

    pub fn in_section(field: FieldDefinition, section_id: SectionId) -> Self {
        Self {
            field,
            section_id: Some(section_id),
            subsection_id: None,
        }
    }
}
