//! Configuration loader with layered sources
//!
//! Loads configuration from multiple sources with the following precedence
//! (highest to lowest):
//! 1. Environment variables (TOKENSMITH_*)
//! 2. Configuration file (TOML)
//! 3. Default values

use crate::access_control::{Pattern, RepoSelection};
use crate::config::types::AppConfig;
use crate::error::ConfigError;
use config::{Config, Environment, File, FileFormat};
use std::collections::HashSet;
use std::path::Path;

/// Default configuration file paths to check (in order)
const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "tokensmith.toml",
    ".tokensmith.toml",
    "~/.config/tokensmith/config.toml",
    "/etc/tokensmith/config.toml",
];

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Load configuration from a TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from_str(toml_str, FileFormat::Toml))
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// Load configuration from files and environment
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. Start with defaults (handled by serde defaults on AppConfig)

    // 2. Add configuration file
    if let Some(path) = config_path {
        // Explicit path provided - must exist
        if !Path::new(path).exists() {
            return Err(ConfigError::Load(format!(
                "Configuration file not found: {}",
                path
            )));
        }
        builder = builder.add_source(File::new(path, FileFormat::Toml));
    } else {
        // Try default paths (first existing one wins)
        for path in DEFAULT_CONFIG_PATHS {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                builder = builder.add_source(File::new(&expanded, FileFormat::Toml));
                break;
            }
        }
    }

    // 3. Add environment variables with TOKENSMITH_ prefix
    // e.g., TOKENSMITH_LOGGING__LEVEL, TOKENSMITH_LOGGING__FORMAT
    // Double underscore (__) maps to nested keys (logging.level)
    builder = builder.add_source(
        Environment::with_prefix("TOKENSMITH")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// Validate configuration values
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if !LOG_LEVELS.contains(&config.logging.level.as_str()) {
        return Err(ConfigError::Invalid {
            message: format!(
                "logging.level must be one of {}, got: {}",
                LOG_LEVELS.join(", "),
                config.logging.level
            ),
        });
    }

    validate_all_patterns(config)?;
    validate_registrations(config)?;
    validate_declarations(config)?;

    Ok(())
}

/// Validate every pattern in every rule
fn validate_all_patterns(config: &AppConfig) -> Result<(), ConfigError> {
    for (i, rule) in config.permissions.rules.iter().enumerate() {
        validate_patterns(&rule.consumers, &format!("permissions.rules[{}].consumers", i))?;
        for (j, resource) in rule.resources.iter().enumerate() {
            validate_patterns(
                &resource.accounts,
                &format!("permissions.rules[{}].resources[{}].accounts", i, j),
            )?;
            validate_patterns(
                &resource.selected_repos,
                &format!("permissions.rules[{}].resources[{}].selected_repos", i, j),
            )?;
        }
    }

    for (i, rule) in config.provision.rules.iter().enumerate() {
        validate_patterns(&rule.secrets, &format!("provision.rules[{}].secrets", i))?;
        validate_patterns(&rule.requesters, &format!("provision.rules[{}].requesters", i))?;

        let github = &rule.to.github;
        let keyed = github
            .accounts
            .iter()
            .map(|(pattern, spec)| ("accounts", pattern, spec))
            .chain(
                github
                    .repos
                    .iter()
                    .map(|(pattern, spec)| ("repos", pattern, spec)),
            );
        for (field, pattern, spec) in keyed {
            let path = format!("provision.rules[{}].to.github.{}", i, field);
            validate_patterns(std::slice::from_ref(pattern), &path)?;
            validate_patterns(
                &spec.environments.keys().cloned().collect::<Vec<_>>(),
                &format!("{}.{}.environments", path, pattern),
            )?;
        }
        for (field, spec) in [("account", &github.account), ("repo", &github.repo)] {
            validate_patterns(
                &spec.environments.keys().cloned().collect::<Vec<_>>(),
                &format!("provision.rules[{}].to.github.{}.environments", i, field),
            )?;
        }
    }

    Ok(())
}

/// Validate that installations reference known apps and ids are unique
fn validate_registrations(config: &AppConfig) -> Result<(), ConfigError> {
    let mut app_ids = HashSet::new();
    for registration in &config.apps {
        if !app_ids.insert(registration.app.id) {
            return Err(ConfigError::Invalid {
                message: format!("app {} is registered more than once", registration.app.id),
            });
        }
    }

    let mut installation_ids = HashSet::new();
    for registration in &config.installations {
        let installation = &registration.installation;
        if !app_ids.contains(&installation.app_id) {
            return Err(ConfigError::Invalid {
                message: format!(
                    "installation {} references unknown app {}",
                    installation.id, installation.app_id
                ),
            });
        }
        if !installation_ids.insert(installation.id) {
            return Err(ConfigError::Invalid {
                message: format!(
                    "installation {} is registered more than once",
                    installation.id
                ),
            });
        }
    }

    Ok(())
}

/// Validate token and secret declarations
fn validate_declarations(config: &AppConfig) -> Result<(), ConfigError> {
    for requester in &config.requesters {
        let prefix = format!("requesters.{}/{}", requester.account, requester.repo);

        for (name, token) in &requester.tokens {
            if let RepoSelection::Selected(repos) = &token.repos {
                validate_patterns(repos, &format!("{}.tokens.{}.repos", prefix, name))?;
            }
        }

        for (name, secret) in &requester.secrets {
            if secret.token.name().is_empty() {
                return Err(ConfigError::Missing {
                    field: format!("{}.secrets.{}.token", prefix, name),
                });
            }
        }
    }

    Ok(())
}

/// Validate that all patterns are valid glob patterns
fn validate_patterns(patterns: &[String], field_path: &str) -> Result<(), ConfigError> {
    for pattern in patterns {
        if let Err(ConfigError::InvalidPattern { reason, .. }) = Pattern::new(pattern) {
            return Err(ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                reason: format!("in {}: {}", field_path, reason),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access_control::PermissionRule;
    use crate::config::types::PermissionsConfig;

    #[test]
    fn test_load_config_from_str_basic() {
        let toml = r#"
[logging]
level = "debug"

[[permissions.rules]]
consumers = ["account-x"]
permissions = { contents = "read" }
[[permissions.rules.resources]]
accounts = ["account-a"]
all_repos = true
"#;

        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.permissions.rules.len(), 1);
        assert_eq!(config.permissions.rules[0].consumers, vec!["account-x"]);
    }

    #[test]
    fn test_invalid_log_level() {
        let toml = r#"
[logging]
level = "loud"
"#;
        let result = load_config_from_str(toml);
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_invalid_pattern() {
        let config = AppConfig {
            permissions: PermissionsConfig {
                rules: vec![PermissionRule {
                    consumers: vec!["account-[x]".to_string()],
                    ..Default::default()
                }],
            },
            ..Default::default()
        };

        let result = validate_config(&config);
        match result {
            Err(ConfigError::InvalidPattern { pattern, reason }) => {
                assert_eq!(pattern, "account-[x]");
                assert!(reason.contains("permissions.rules[0].consumers"));
            }
            other => panic!("expected invalid pattern, got {:?}", other),
        }
    }

    #[test]
    fn test_installation_with_unknown_app() {
        let toml = r#"
[[installations]]
repos = ["repo-a"]
[installations.installation]
id = 10
app_id = 1
account = "account-a"
repository_selection = "selected"
"#;
        let result = load_config_from_str(toml);
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_missing_file() {
        let result = load_config(Some("/nonexistent/tokensmith.toml"));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }
}
