//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (ports, connection limits)
//! - Reject values that would produce malformed responses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::ServerConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.host must not be empty")]
    EmptyHost,

    #[error("listener.max_connections must be at least 1")]
    NoConnections,

    #[error("session.server_identity must be a non-empty single-line value")]
    BadServerIdentity,

    #[error("session.url_scheme must be \"http\" or \"https\", got {0:?}")]
    BadUrlScheme(String),

    #[error("observability.log_level {0:?} is not one of trace, debug, info, warn, error")]
    BadLogLevel(String),
}

/// Check `config`, collecting every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.host.trim().is_empty() {
        errors.push(ValidationError::EmptyHost);
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::NoConnections);
    }

    let identity = &config.session.server_identity;
    if identity.trim().is_empty() || identity.contains(['\r', '\n']) {
        errors.push(ValidationError::BadServerIdentity);
    }

    if !matches!(config.session.url_scheme.as_str(), "http" | "https") {
        errors.push(ValidationError::BadUrlScheme(config.session.url_scheme.clone()));
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !matches!(level.as_str(), "trace" | "debug" | "info" | "warn" | "error") {
        errors.push(ValidationError::BadLogLevel(config.observability.log_level.clone()));
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
    fn defaults_are_valid() {
        assert!(validate_config(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn reports_every_problem() {
        let mut config = ServerConfig::default();
        config.listener.host = " ".into();
        config.listener.max_connections = 0;
        config.session.server_identity = "bad\r\nX-Injected: 1".into();
        config.session.url_scheme = "ftp".into();
        config.observability.log_level = "loud".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::EmptyHost,
                ValidationError::NoConnections,
                ValidationError::BadServerIdentity,
                ValidationError::BadUrlScheme("ftp".into()),
                ValidationError::BadLogLevel("loud".into()),
            ]
        );
    }
}
