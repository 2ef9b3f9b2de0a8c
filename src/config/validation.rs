//! Settings validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, caps not below their bases)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AgentSettings → Result<(), Vec<ValidationError>>

use std::fmt;

use crate::config::schema::AgentSettings;

/// A single settings violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Render a list of violations on one line.
pub fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn validate_settings(settings: &AgentSettings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let positive = [
        ("debounce_ms", settings.debounce_ms),
        ("poll_interval_ms", settings.poll_interval_ms),
        ("resync_interval_secs", settings.resync_interval_secs),
        ("retry_base_ms", settings.retry_base_ms),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than 0"));
        }
    }

    if settings.max_debounce_ms < settings.debounce_ms {
        errors.push(ValidationError::new(
            "max_debounce_ms",
            format!("must be at least debounce_ms ({})", settings.debounce_ms),
        ));
    }

    if settings.retry_max_ms < settings.retry_base_ms {
        errors.push(ValidationError::new(
            "retry_max_ms",
            format!("must be at least retry_base_ms ({})", settings.retry_base_ms),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_settings(&AgentSettings::default()).is_ok());
    }

    #[test]
    fn test_collects_every_violation() {
        let settings = AgentSettings {
            debounce_ms: 500,
            max_debounce_ms: 100,
            poll_interval_ms: 0,
            resync_interval_secs: 0,
            ..AgentSettings::default()
        };

        let errors = validate_settings(&settings).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["poll_interval_ms", "resync_interval_secs", "max_debounce_ms"]);
    }
}
