//! Access control types
//!
//! Core types shared by the token and provisioning authorizers.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Access level for a single GitHub permission
///
/// Levels are totally ordered: `none < read < write < admin`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    #[default]
    None,
    Read,
    Write,
    Admin,
}

impl PermissionLevel {
    /// Get the level name as a string
    pub const fn as_str(&self) -> &'static str {
        match self {
            PermissionLevel::None => "none",
            PermissionLevel::Read => "read",
            PermissionLevel::Write => "write",
            PermissionLevel::Admin => "admin",
        }
    }

    /// Whether holding `self` is enough for a request that wants `want`
    pub fn satisfies(self, want: PermissionLevel) -> bool {
        compare_level(self, want) != Ordering::Less
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Compare two permission levels on the `none < read < write < admin` lattice
pub fn compare_level(a: PermissionLevel, b: PermissionLevel) -> Ordering {
    a.cmp(&b)
}

/// Check whether a held level satisfies a wanted level
pub fn is_sufficient(have: PermissionLevel, want: PermissionLevel) -> bool {
    have.satisfies(want)
}

/// Mapping from permission name to access level
///
/// Permission names are an open set (`contents`, `metadata`,
/// `organization_secrets`, ...). A missing key means `none`. Iteration is
/// alphabetical by permission name.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeMap<String, PermissionLevel>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Level held for a permission, `none` when absent
    pub fn get(&self, name: &str) -> PermissionLevel {
        self.0.get(name).copied().unwrap_or_default()
    }

    pub fn insert(&mut self, name: impl Into<String>, level: PermissionLevel) {
        self.0.insert(name.into(), level);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, PermissionLevel)> {
        self.0.iter().map(|(name, level)| (name.as_str(), *level))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Overlay another set on top of this one
    ///
    /// Permissions mentioned by `other` replace the current value, whatever
    /// it was. Permissions `other` does not mention are kept as they are.
    pub fn overlay(&self, other: &PermissionSet) -> PermissionSet {
        let mut merged = self.0.clone();
        merged.extend(other.0.iter().map(|(name, level)| (name.clone(), *level)));
        PermissionSet(merged)
    }

    /// Whether every wanted permission is held at a sufficient level
    pub fn satisfies(&self, want: &PermissionSet) -> bool {
        want.iter().all(|(name, level)| is_sufficient(self.get(name), level))
    }

    /// Whether any permission is wanted above `read`
    ///
    /// Such requests can only be issued on behalf of a role.
    pub fn requires_role(&self) -> bool {
        self.iter().any(|(_, level)| level > PermissionLevel::Read)
    }
}

impl<K: Into<String>> FromIterator<(K, PermissionLevel)> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = (K, PermissionLevel)>>(iter: I) -> Self {
        PermissionSet(
            iter.into_iter()
                .map(|(name, level)| (name.into(), level))
                .collect(),
        )
    }
}

impl fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "{{}}");
        }
        let parts: Vec<String> = self
            .iter()
            .map(|(name, level)| format!("{}: {}", name, level))
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// Explicit allow/deny verdict used by provisioning rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Allow,
    Deny,
}

impl Access {
    pub const fn is_allow(&self) -> bool {
        matches!(self, Access::Allow)
    }

    /// Combine verdicts from patterns in the same tier: deny wins
    pub fn combine(verdicts: impl IntoIterator<Item = Access>) -> Option<Access> {
        verdicts.into_iter().fold(None, |current, verdict| {
            match (current, verdict) {
                (Some(Access::Deny), _) | (_, Access::Deny) => Some(Access::Deny),
                _ => Some(Access::Allow),
            }
        })
    }
}

/// A repository identified by owner account and name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub account: String,
    pub repo: String,
}

impl RepoRef {
    pub fn new(account: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            repo: repo.into(),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.account, self.repo)
    }
}

/// Identity requesting a token: a whole account, or a repo acting on its own
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Consumer {
    pub account: String,
    #[serde(default)]
    pub repo: Option<String>,
}

impl Consumer {
    pub fn account(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            repo: None,
        }
    }

    pub fn repo(account: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            repo: Some(repo.into()),
        }
    }

    /// `account/repo` form, when acting as a repo
    pub fn repo_path(&self) -> Option<String> {
        self.repo
            .as_ref()
            .map(|repo| format!("{}/{}", self.account, repo))
    }
}

impl From<RepoRef> for Consumer {
    fn from(repo: RepoRef) -> Self {
        Consumer::repo(repo.account, repo.repo)
    }
}

impl fmt::Display for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repo {
            Some(repo) => write!(f, "repo {}/{}", self.account, repo),
            None => write!(f, "account {}", self.account),
        }
    }
}

/// Which repos of an account a token should cover
///
/// Deserializes from the string `"all"` or from a list of repo patterns. An
/// empty list means "no repos": an account-level token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawRepoSelection", into = "RawRepoSelection")]
pub enum RepoSelection {
    All,
    Selected(Vec<String>),
}

impl Default for RepoSelection {
    fn default() -> Self {
        RepoSelection::Selected(Vec::new())
    }
}

impl RepoSelection {
    pub fn is_all(&self) -> bool {
        matches!(self, RepoSelection::All)
    }

    pub fn is_none(&self) -> bool {
        matches!(self, RepoSelection::Selected(repos) if repos.is_empty())
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawRepoSelection {
    Keyword(RepoKeyword),
    List(Vec<String>),
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum RepoKeyword {
    All,
}

impl From<RawRepoSelection> for RepoSelection {
    fn from(raw: RawRepoSelection) -> Self {
        match raw {
            RawRepoSelection::Keyword(RepoKeyword::All) => RepoSelection::All,
            RawRepoSelection::List(repos) => RepoSelection::Selected(repos),
        }
    }
}

impl From<RepoSelection> for RawRepoSelection {
    fn from(selection: RepoSelection) -> Self {
        match selection {
            RepoSelection::All => RawRepoSelection::Keyword(RepoKeyword::All),
            RepoSelection::Selected(repos) => RawRepoSelection::List(repos),
        }
    }
}

/// A token a requester wants minted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDeclaration {
    /// Whether other requesters may reference this declaration
    #[serde(default)]
    pub shared: bool,

    /// Role the token is issued as; required for write/admin access
    #[serde(default, rename = "as")]
    pub role: Option<String>,

    /// Account the token grants access to
    pub account: String,

    /// Repos of `account` the token grants access to
    #[serde(default)]
    pub repos: RepoSelection,

    /// Wanted permissions
    #[serde(default)]
    pub permissions: PermissionSet,
}

/// Account or repo receiving an Actions/Codespaces/Dependabot secret
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecretScope {
    pub account: String,
    #[serde(default)]
    pub repo: Option<String>,
}

/// Repo environment receiving an environment secret
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnvironmentScope {
    pub account: String,
    pub repo: String,
    pub environment: String,
}

/// Destination of a provisioned secret
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "target", rename_all = "lowercase")]
pub enum ProvisionTarget {
    Actions(SecretScope),
    Codespaces(SecretScope),
    Dependabot(SecretScope),
    Environment(EnvironmentScope),
}

impl ProvisionTarget {
    pub fn account(&self) -> &str {
        match self {
            ProvisionTarget::Actions(scope)
            | ProvisionTarget::Codespaces(scope)
            | ProvisionTarget::Dependabot(scope) => &scope.account,
            ProvisionTarget::Environment(scope) => &scope.account,
        }
    }

    /// Repo name, `None` for account-level secrets
    pub fn repo(&self) -> Option<&str> {
        match self {
            ProvisionTarget::Actions(scope)
            | ProvisionTarget::Codespaces(scope)
            | ProvisionTarget::Dependabot(scope) => scope.repo.as_deref(),
            ProvisionTarget::Environment(scope) => Some(&scope.repo),
        }
    }

    /// Secret surface name as used in rule access specs
    pub const fn surface(&self) -> &'static str {
        match self {
            ProvisionTarget::Actions(_) => "actions",
            ProvisionTarget::Codespaces(_) => "codespaces",
            ProvisionTarget::Dependabot(_) => "dependabot",
            ProvisionTarget::Environment(_) => "environment",
        }
    }
}
