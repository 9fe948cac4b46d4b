//! Configuration types for tokensmith
//!
//! This module defines the configuration structure that can be loaded from
//! TOML files and/or environment variables.

use crate::access_control::{PermissionRule, SecretsRule};
use crate::authorizer::RequesterDeclarations;
use crate::registry::{AppRegistration, InstallationRegistration};
use serde::Deserialize;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Token permission rules
    pub permissions: PermissionsConfig,

    /// Secret provisioning rules
    pub provision: ProvisionConfig,

    /// Registered GitHub Apps
    pub apps: Vec<AppRegistration>,

    /// Installations of the registered apps
    pub installations: Vec<InstallationRegistration>,

    /// Token and secret declarations to authorize
    pub requesters: Vec<RequesterDeclarations>,
}

/// Ordered permission rules; later matching rules override earlier ones
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PermissionsConfig {
    pub rules: Vec<PermissionRule>,
}

/// Ordered secrets rules; later verdicts override earlier ones
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    pub rules: Vec<SecretsRule>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Output format (pretty, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output
    #[default]
    Pretty,
    /// JSON structured output
    Json,
}
