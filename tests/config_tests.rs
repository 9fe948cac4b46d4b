//! Configuration loading tests

use tokensmith::access_control::{
    Access, PermissionLevel, ProvisionTarget, RepoSelection, SecretScope,
};
use tokensmith::authorizer::TokenReference;
use tokensmith::config::{LogFormat, load_config_from_str};
use tokensmith::registry::RepositorySelection;
use tokensmith::ConfigError;

const MINIMAL_CONFIG: &str = r#"
[[permissions.rules]]
consumers = ["account-x"]
permissions = { contents = "read" }
[[permissions.rules.resources]]
accounts = ["account-a"]
all_repos = true
"#;

const FULL_CONFIG: &str = r#"
[logging]
level = "debug"
format = "json"

[[permissions.rules]]
description = "Deployers write to account-a"
consumers = ["account-x/deployer"]
permissions = { contents = "write", metadata = "read" }
[[permissions.rules.resources]]
accounts = ["account-a"]
selected_repos = ["repo-*", "<repo>"]
[[permissions.rules.resources]]
accounts = ["account-b"]
no_repos = true

[[provision.rules]]
description = "Own repo only"
secrets = ["DEPLOY_*"]
requesters = ["account-x/*"]
[provision.rules.to.github.repo]
actions = "allow"
dependabot = "deny"
environments = { "prod*" = "allow" }
[provision.rules.to.github.accounts."account-*"]
codespaces = "deny"

[[apps]]
[apps.app]
id = 1
slug = "issuer"
name = "Issuer"
permissions = { contents = "write" }
[apps.issuer]
enabled = true
roles = ["deployer"]

[[apps]]
[apps.app]
id = 2
slug = "provisioner"
name = "Provisioner"
[apps.provisioner]
enabled = true

[[installations]]
repos = ["repo-a", "repo-b"]
[installations.installation]
id = 100
app = 1
account = "account-a"
repository_selection = "selected"

[[requesters]]
account = "account-x"
repo = "deployer"
[requesters.tokens.deploy]
shared = true
as = "deployer"
account = "account-a"
repos = ["repo-a"]
permissions = { contents = "write" }
[requesters.tokens.everything]
account = "account-a"
repos = "all"
[requesters.secrets.deploy_token]
token = "deploy"
to = [
    { type = "actions", target = { account = "account-x", repo = "deployer" } },
    { type = "environment", target = { account = "account-x", repo = "deployer", environment = "production" } },
]
[requesters.secrets.remote_token]
token = { account = "account-y", repo = "other", name = "shared" }
"#;

#[test]
fn test_minimal_config() {
    let config = load_config_from_str(MINIMAL_CONFIG).unwrap();

    assert_eq!(config.logging.level, "info");
    assert_eq!(config.logging.format, LogFormat::Pretty);
    assert_eq!(config.permissions.rules.len(), 1);
    assert!(config.provision.rules.is_empty());
    assert!(config.apps.is_empty());
    assert!(config.requesters.is_empty());
}

#[test]
fn test_empty_config_uses_defaults() {
    let config = load_config_from_str("").unwrap();
    assert_eq!(config.logging.level, "info");
    assert!(config.permissions.rules.is_empty());
}

#[test]
fn test_full_config() {
    let config = load_config_from_str(FULL_CONFIG).unwrap();

    // Logging
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, LogFormat::Json);

    // Permission rules
    let rule = &config.permissions.rules[0];
    assert_eq!(rule.description.as_deref(), Some("Deployers write to account-a"));
    assert_eq!(rule.permissions.get("contents"), PermissionLevel::Write);
    assert_eq!(rule.permissions.get("metadata"), PermissionLevel::Read);
    assert_eq!(rule.permissions.get("issues"), PermissionLevel::None);
    assert_eq!(rule.resources.len(), 2);
    assert_eq!(rule.resources[0].selected_repos, vec!["repo-*", "<repo>"]);
    assert!(rule.resources[1].no_repos);
    assert!(!rule.resources[1].all_repos);

    // Secrets rules
    let github = &config.provision.rules[0].to.github;
    assert_eq!(github.repo.actions, Some(Access::Allow));
    assert_eq!(github.repo.dependabot, Some(Access::Deny));
    assert_eq!(github.repo.codespaces, None);
    assert_eq!(github.repo.environments.get("prod*"), Some(&Access::Allow));
    assert_eq!(
        github.accounts.get("account-*").and_then(|spec| spec.codespaces),
        Some(Access::Deny)
    );

    // Registry
    assert_eq!(config.apps.len(), 2);
    assert_eq!(config.apps[0].issuer.roles, vec!["deployer"]);
    assert!(!config.apps[0].provisioner.enabled);
    assert!(config.apps[1].provisioner.enabled);
    assert!(!config.apps[1].issuer.enabled);
    let installation = &config.installations[0].installation;
    assert_eq!(installation.app_id, 1);
    assert_eq!(installation.repository_selection, RepositorySelection::Selected);

    // Declarations
    let requester = &config.requesters[0];
    let deploy = &requester.tokens["deploy"];
    assert!(deploy.shared);
    assert_eq!(deploy.role.as_deref(), Some("deployer"));
    assert_eq!(deploy.repos, RepoSelection::Selected(vec!["repo-a".to_string()]));
    assert_eq!(requester.tokens["everything"].repos, RepoSelection::All);
    assert!(requester.tokens["everything"].permissions.is_empty());

    let secret = &requester.secrets["deploy_token"];
    assert_eq!(secret.token, TokenReference::Local("deploy".to_string()));
    assert_eq!(
        secret.to[0],
        ProvisionTarget::Actions(SecretScope {
            account: "account-x".to_string(),
            repo: Some("deployer".to_string()),
        })
    );
    assert!(matches!(&secret.to[1], ProvisionTarget::Environment(scope) if scope.environment == "production"));

    let remote = &requester.secrets["remote_token"];
    assert_eq!(remote.token.name(), "shared");
    assert_eq!(remote.token.to_string(), "shared from repo account-y/other");
    assert!(remote.to.is_empty());
}

#[test]
fn test_rule_order_is_preserved() {
    let config_str = r#"
[[permissions.rules]]
description = "first"
[[permissions.rules]]
description = "second"
[[permissions.rules]]
description = "third"
"#;
    let config = load_config_from_str(config_str).unwrap();
    let descriptions: Vec<_> = config
        .permissions
        .rules
        .iter()
        .filter_map(|rule| rule.description.as_deref())
        .collect();
    assert_eq!(descriptions, vec!["first", "second", "third"]);
}

#[test]
fn test_invalid_permission_level() {
    let config_str = r#"
[[permissions.rules]]
consumers = ["account-x"]
permissions = { contents = "owner" }
"#;
    let result = load_config_from_str(config_str);
    assert!(matches!(result, Err(ConfigError::Load(_))));
}

#[test]
fn test_invalid_access() {
    let config_str = r#"
[[provision.rules]]
[provision.rules.to.github.repo]
actions = "maybe"
"#;
    let result = load_config_from_str(config_str);
    assert!(matches!(result, Err(ConfigError::Load(_))));
}

#[test]
fn test_invalid_provision_pattern() {
    let config_str = r#"
[[provision.rules]]
secrets = ["*"]
requesters = ["*"]
[provision.rules.to.github.repos."account a/*"]
actions = "allow"
"#;
    let result = load_config_from_str(config_str);
    match result {
        Err(ConfigError::InvalidPattern { pattern, reason }) => {
            assert_eq!(pattern, "account a/*");
            assert!(reason.contains("provision.rules[0].to.github.repos"));
        }
        other => panic!("expected invalid pattern, got {:?}", other),
    }
}

#[test]
fn test_invalid_token_repo_pattern() {
    let config_str = r#"
[[requesters]]
account = "account-x"
repo = "repo-x"
[requesters.tokens.bad]
account = "account-a"
repos = ["repo-(a|b)"]
"#;
    let result = load_config_from_str(config_str);
    assert!(matches!(result, Err(ConfigError::InvalidPattern { .. })));
}

#[test]
fn test_empty_token_reference() {
    let config_str = r#"
[[requesters]]
account = "account-x"
repo = "repo-x"
[requesters.secrets.broken]
token = ""
"#;
    let result = load_config_from_str(config_str);
    assert!(matches!(result, Err(ConfigError::Missing { .. })));
}

#[test]
fn test_duplicate_installation() {
    let config_str = r#"
[[apps]]
[apps.app]
id = 1
slug = "issuer"
name = "Issuer"

[[installations]]
[installations.installation]
id = 100
app_id = 1
account = "account-a"
repository_selection = "all"

[[installations]]
[installations.installation]
id = 100
app_id = 1
account = "account-b"
repository_selection = "all"
"#;
    let result = load_config_from_str(config_str);
    assert!(matches!(result, Err(ConfigError::Invalid { .. })));
}

#[test]
#[serial_test::serial]
fn test_load_config_from_file() {
    use std::fs;
    use tokensmith::config::load_config;
    use tempfile::tempdir;

    let dir = tempdir().unwrap();
    let config_path = dir.path().join("tokensmith.toml");
    fs::write(&config_path, FULL_CONFIG).unwrap();

    let config = load_config(Some(config_path.to_str().unwrap())).unwrap();
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.permissions.rules.len(), 1);
    assert_eq!(config.requesters[0].secrets.len(), 2);
}

#[test]
#[serial_test::serial]
fn test_env_var_overrides_file() {
    use std::env;
    use std::fs;
    use tokensmith::config::load_config;
    use tempfile::tempdir;

    let dir = tempdir().unwrap();
    let config_path = dir.path().join("tokensmith.toml");
    fs::write(&config_path, MINIMAL_CONFIG).unwrap();

    unsafe {
        env::set_var("TOKENSMITH_LOGGING__LEVEL", "warn");
        env::set_var("TOKENSMITH_LOGGING__FORMAT", "json");
    }

    let result = load_config(Some(config_path.to_str().unwrap()));

    // Cleanup before asserting so a failure does not leak into other tests
    unsafe {
        env::remove_var("TOKENSMITH_LOGGING__LEVEL");
        env::remove_var("TOKENSMITH_LOGGING__FORMAT");
    }

    let config = result.unwrap();
    assert_eq!(config.logging.level, "warn");
    assert_eq!(config.logging.format, LogFormat::Json);
    assert_eq!(config.permissions.rules.len(), 1);
}

#[test]
#[serial_test::serial]
fn test_invalid_env_log_level() {
    use std::env;
    use std::fs;
    use tokensmith::config::load_config;
    use tempfile::tempdir;

    let dir = tempdir().unwrap();
    let config_path = dir.path().join("tokensmith.toml");
    fs::write(&config_path, MINIMAL_CONFIG).unwrap();

    unsafe {
        env::set_var("TOKENSMITH_LOGGING__LEVEL", "chatty");
    }

    let result = load_config(Some(config_path.to_str().unwrap()));

    unsafe {
        env::remove_var("TOKENSMITH_LOGGING__LEVEL");
    }

    assert!(matches!(result, Err(ConfigError::Invalid { .. })));
}

#[test]
fn test_missing_config_file() {
    use tokensmith::config::load_config;

    let result = load_config(Some("/nonexistent/path/tokensmith.toml"));
    assert!(matches!(result, Err(ConfigError::Load(_))));
}
