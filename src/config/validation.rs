//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate the application identity and log filter directive
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: HostConfig → Result<(), Vec<ValidationError>>
//! - Plugin sections are not validated here; plugins reject their own config
//!   during load

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::schema::HostConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Check the bootstrap sections for semantic errors.
pub fn validate_config(config: &HostConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.application.name.trim().is_empty() {
        errors.push(ValidationError::new("application.name", "must not be empty"));
    }
    if config.application.version.trim().is_empty() {
        errors.push(ValidationError::new("application.version", "must not be empty"));
    }
    if let Err(e) = EnvFilter::try_new(&config.logging.level) {
        errors.push(ValidationError::new(
            "logging.level",
            format!("invalid filter directive: {e}"),
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
    fn test_default_config_is_valid() {
        assert!(validate_config(&HostConfig::default()).is_ok());
    }

    #[test]
    fn test_reports_every_error() {
        let mut config = HostConfig::default();
        config.application.name = "  ".to_string();
        config.application.version = String::new();
        config.logging.level = "plughost=verbose".to_string();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["application.name", "application.version", "logging.level"]
        );
    }
}
