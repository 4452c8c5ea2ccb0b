//! Submit-time input validation.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use custom_fields_shared::{FieldDefinition, FieldId, FieldKind, TypedValue};

use crate::values::{accepts, ValueMap};

lazy_static! {
    static ref EMAIL_REGEXP: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref PHONE_REGEXP: Regex = Regex::new(r"^\+?[0-9()\s-]{7,20}$").unwrap();
}

/// Why a field failed validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IssueKind {
    Required,
    InvalidEmail,
    InvalidPhone,
    InvalidNumber,
    UnknownOption { value: String },
    /// The value's shape does not fit the field kind.
    WrongType,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => write!(f, "is required"),
            Self::InvalidEmail => write!(f, "must be a valid email address"),
            Self::InvalidPhone => write!(f, "must be a valid phone number"),
            Self::InvalidNumber => write!(f, "must be a number"),
            Self::UnknownOption { value } => write!(f, "has no option '{}'", value),
            Self::WrongType => write!(f, "has a value of the wrong type"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub field_id: FieldId,
    pub slug: String,
    pub label: String,
    pub issue: IssueKind,
}

/// Every validation issue found in one pass, in render order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn for_field(&self, field_id: FieldId) -> Option<&ValidationIssue> {
        self.issues.iter().find(|issue| issue.field_id == field_id)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} field(s) failed validation", self.issues.len())?;
        for (i, issue) in self.issues.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{}{} {}", sep, issue.label, issue.issue)?;
        }
        Ok(())
    }
}

fn check_phone(raw: &str) -> bool {
    let trimmed = raw.trim();
    PHONE_REGEXP.is_match(trimmed) && trimmed.chars().any(|c| c.is_ascii_digit())
}

/// Validate one field's value. Blank optional values always pass.
pub fn validate_value(field: &FieldDefinition, value: Option<&TypedValue>) -> Option<IssueKind> {
    let blank = value.map_or(true, TypedValue::is_blank);
    if blank {
        return field.is_required.then_some(IssueKind::Required);
    }
    let value = value?;

    match (field.kind, value) {
        (FieldKind::Email, TypedValue::Text(text)) if !EMAIL_REGEXP.is_match(text.trim()) => {
            Some(IssueKind::InvalidEmail)
        }
        (FieldKind::Phone, TypedValue::Text(text)) if !check_phone(text) => {
            Some(IssueKind::InvalidPhone)
        }
        (FieldKind::Number | FieldKind::Decimal, TypedValue::Number(n)) if !n.is_finite() => {
            Some(IssueKind::InvalidNumber)
        }
        (FieldKind::Number | FieldKind::Decimal, TypedValue::Text(text))
            if text.trim().parse::<f64>().map_or(true, |n| !n.is_finite()) =>
        {
            Some(IssueKind::InvalidNumber)
        }
        (kind, TypedValue::Text(text))
            if kind.is_single_choice() && !field.options.is_empty() && !field.has_option(text) =>
        {
            Some(IssueKind::UnknownOption {
                value: text.clone(),
            })
        }
        (FieldKind::Multiselect, TypedValue::List(items)) if !field.options.is_empty() => items
            .iter()
            .find(|item| !field.has_option(item))
            .map(|item| IssueKind::UnknownOption {
                value: item.clone(),
            }),
        (kind, value) if !accepts(kind, value) => Some(IssueKind::WrongType),
        _ => None,
    }
}

/// Validate `fields` against `values`, collecting every issue.
pub fn validate_fields<'a>(
    fields: impl IntoIterator<Item = &'a FieldDefinition>,
    values: &ValueMap,
) -> Result<(), ValidationReport> {
    let issues: Vec<ValidationIssue> = fields
        .into_iter()
        .filter_map(|field| {
            validate_value(field, values.get(&field.id)).map(|issue| ValidationIssue {
                field_id: field.id,
                slug: field.slug.clone(),
                label: field.display_label().to_string(),
                issue,
            })
        })
        .collect();

    if issues.is_empty() {
        Ok(())
    } else {
        Err(ValidationReport { issues })
    }
}
