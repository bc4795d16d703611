//! Field validation for the creation and update DTOs.
//!
//! The DTOs derive [`validator::Validate`]; [`ensure_valid`] runs it and
//! folds the field errors into a single [`DomainError::Validation`].

use std::borrow::Cow;

use validator::{Validate, ValidationError, ValidationErrors};

use crate::constants::MIN_NAME_LENGTH;
use crate::error::{DomainError, DomainResult};

/// Rejects names that are empty once surrounding whitespace is trimmed.
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().chars().count() < MIN_NAME_LENGTH {
        let mut error = ValidationError::new("blank");
        error.message = Some(Cow::Borrowed("Name is required"));
        return Err(error);
    }
    Ok(())
}

/// Run the derived validation of `value`.
pub fn ensure_valid<T: Validate>(value: &T) -> DomainResult<()> {
    value.validate().map_err(DomainError::from)
}

impl From<ValidationErrors> for DomainError {
    fn from(errors: ValidationErrors) -> Self {
        DomainError::Validation(format_validation_errors(&errors))
    }
}

fn format_validation_errors(errors: &ValidationErrors) -> String {
    let mut messages = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| format!("{}: {}", field, m))
                    .unwrap_or_else(|| format!("{} is invalid", field))
            })
        })
        .collect::<Vec<_>>();
    // field_errors is a HashMap
    messages.sort();
    messages.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::EntityKind;
    use crate::lead::NewLead;
    use crate::pipeline::{NewPipelineType, UpdatePipelineStage, UpdatePipelineType};

    #[test]
    fn blank_names_are_rejected() {
        assert!(not_blank("Qualified").is_ok());
        assert!(not_blank("").is_err());
        assert!(not_blank(" \t ").is_err());
    }

    #[test]
    fn creation_dtos_require_a_name() {
        let err = ensure_valid(&NewPipelineType::new(EntityKind::Invite, "  ")).unwrap_err();
        assert_eq!(err, DomainError::validation("name: Name is required"));

        assert!(ensure_valid(&NewLead::named("Acme")).is_ok());
        assert!(matches!(
            ensure_valid(&NewLead::named("")),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn updates_only_check_the_fields_they_carry() {
        assert!(ensure_valid(&UpdatePipelineType::default()).is_ok());
        assert!(ensure_valid(&UpdatePipelineStage::default()).is_ok());

        let rename = UpdatePipelineStage {
            name: Some(" ".to_string()),
            ..UpdatePipelineStage::default()
        };
        assert!(matches!(
            ensure_valid(&rename),
            Err(DomainError::Validation(_))
        ));
    }
}
