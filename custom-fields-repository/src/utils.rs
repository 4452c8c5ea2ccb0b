//! Utility functions for the custom fields repository.

use crate::errors::FieldsApiError;
use crate::types::EntityRef;

/// Require a non-blank string argument.
///
/// # Example
///
/// ```
/// use custom_fields_repository::require_non_blank;
///
/// assert!(require_non_blank("entity_slug", "jane-doe").is_ok());
/// assert!(require_non_blank("entity_slug", "  ").is_err());
/// ```
pub fn require_non_blank(field_name: &str, value: &str) -> Result<(), FieldsApiError> {
    if value.trim().is_empty() {
        return Err(FieldsApiError::validation(format!(
            "{} is required",
            field_name
        )));
    }
    Ok(())
}

/// Validate both halves of an entity reference.
pub fn validate_entity(entity: &EntityRef) -> Result<(), FieldsApiError> {
    require_non_blank("entity_type", &entity.entity_type)?;
    require_non_blank("entity_slug", &entity.entity_slug)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_entity() {
        assert!(validate_entity(&EntityRef::new("user", "jane")).is_ok());
        assert!(matches!(
            validate_entity(&EntityRef::new("", "jane")),
            Err(FieldsApiError::ValidationError(_))
        ));
        let err = validate_entity(&EntityRef::new("user", " ")).unwrap_err();
        assert!(err.to_string().contains("entity_slug"));
    }
}
