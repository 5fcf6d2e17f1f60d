//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges and address formats
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use crate::config::schema::AppConfig;

/// A single semantic problem in a loaded configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("server.address `{0}` is not a valid socket address")]
    InvalidAddress(String),

    #[error("server.system_name `{0}` must not contain path separators")]
    InvalidSystemName(String),

    #[error("server.max_request_log_size must be greater than zero")]
    ZeroRequestLogSize,
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let server = &config.server;

    if server.address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress(server.address.clone()));
    }

    if server.system_name.contains(['/', '\\']) {
        errors.push(ValidationError::InvalidSystemName(server.system_name.clone()));
    }

    if server.max_request_log_size == 0 {
        errors.push(ValidationError::ZeroRequestLogSize);
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
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = AppConfig::default();
        config.server.address = "not-an-address".into();
        config.server.system_name = "../etc".into();
        config.server.max_request_log_size = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert_eq!(errors[0], ValidationError::InvalidAddress("not-an-address".into()));
        assert_eq!(errors[2], ValidationError::ZeroRequestLogSize);
    }

    #[test]
    fn test_zero_response_log_size_allowed() {
        let mut config = AppConfig::default();
        config.server.max_response_log_size = 0;
        assert!(validate_config(&config).is_ok());
    }
}
