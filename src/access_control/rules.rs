//! Rule definitions
//!
//! Rules are plain data, deserialized from configuration. Authorizers compile
//! them once and share them (behind `Arc`) with every trace they produce.

use crate::access_control::types::{Access, PermissionSet};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Grants permissions on matching resources to matching consumers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionRule {
    pub description: Option<String>,
    pub resources: Vec<ResourcePattern>,
    pub consumers: Vec<String>,
    pub permissions: PermissionSet,
}

/// Account patterns plus the repo scopes a permission rule covers
///
/// The three scope flags are independent. A resource can cover account-level
/// access (`no_repos`), every repo (`all_repos`) and selected repos at the
/// same time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourcePattern {
    pub accounts: Vec<String>,
    pub no_repos: bool,
    pub all_repos: bool,
    pub selected_repos: Vec<String>,
}

/// Allows or denies provisioning matching secrets for matching requesters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretsRule {
    pub description: Option<String>,
    pub secrets: Vec<String>,
    pub requesters: Vec<String>,
    pub to: SecretsRuleTargets,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretsRuleTargets {
    pub github: GitHubSecretsAccess,
}

/// Where a secrets rule lets secrets go on GitHub
///
/// `account` and `repo` apply only when the target is the requester's own
/// account or repo, and take precedence over the pattern-keyed maps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubSecretsAccess {
    pub account: AccessSpec,
    pub accounts: IndexMap<String, AccessSpec>,
    pub repo: AccessSpec,
    pub repos: IndexMap<String, AccessSpec>,
}

/// Per-surface verdicts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessSpec {
    pub actions: Option<Access>,
    pub codespaces: Option<Access>,
    pub dependabot: Option<Access>,
    pub environments: IndexMap<String, Access>,
}
