//! Error types for tokensmith
//!
//! This module defines the error hierarchy used throughout the crate.
//! Denied authorization requests are *not* errors: they are ordinary result
//! values carrying an explanation trace. Errors are reserved for malformed
//! configuration and for integration mistakes while building the registry.

use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {field}")]
    Missing { field: String },

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// App/installation registry errors
///
/// These indicate that the registry was fed inconsistent data. They are not
/// recoverable: callers propagate them and abort the current operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Installation {id} has not been registered")]
    UnknownInstallation { id: u64 },

    #[error("App {id} has not been registered")]
    UnknownApp { id: u64 },

    #[error("App {id} is already registered")]
    DuplicateApp { id: u64 },

    #[error("Installation {id} is already registered")]
    DuplicateInstallation { id: u64 },
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_error_messages() {
        let err = RegistryError::UnknownInstallation { id: 42 };
        assert_eq!(err.to_string(), "Installation 42 has not been registered");

        let err = RegistryError::UnknownApp { id: 7 };
        assert!(err.to_string().contains('7'));
    }

    #[test]
    fn test_app_error_from_conversions() {
        let err: AppError = RegistryError::DuplicateApp { id: 1 }.into();
        assert!(matches!(err, AppError::Registry(_)));

        let err: AppError = ConfigError::Missing {
            field: "apps".into(),
        }
        .into();
        assert!(err.to_string().starts_with("Configuration error"));
    }
}
