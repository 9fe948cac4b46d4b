//! Access control module
//!
//! Rule-driven authorization for GitHub App installation tokens and for
//! provisioning secrets into GitHub secret stores.
//!
//! ## Token rules
//!
//! Permission rules are an ordered list. A rule applies when one of its
//! `consumers` patterns matches the requesting account (or `account/repo`)
//! and one of its `resources` covers the requested account and repo scope.
//! Matching rules are overlaid in order, so the last rule to mention a
//! permission decides its level.
//!
//! ## Secrets rules
//!
//! Secrets rules are also ordered. Within a rule, the requester's own
//! account/repo entries beat pattern entries, and deny beats allow among
//! patterns. Across rules the last verdict wins.
//!
//! ## Example Configuration
//!
//! ```toml
//! [[permissions.rules]]
//! description = "Let every repo in account-x read account-a"
//! consumers = ["account-x/*"]
//! permissions = { contents = "read", metadata = "read" }
//! [[permissions.rules.resources]]
//! accounts = ["account-a"]
//! all_repos = true
//!
//! [[provision.rules]]
//! secrets = ["DEPLOY_*"]
//! requesters = ["account-a/*"]
//! [provision.rules.to.github.repo]
//! actions = "allow"
//! ```

pub mod patterns;
pub mod provision;
pub mod rules;
pub mod token;
pub mod types;

pub use patterns::{Pattern, PatternContext, PatternMatcher};
pub use provision::{
    ProvisionAuthResult, ProvisionAuthorizer, ProvisionRequest, SecretsRuleEvaluation,
    TargetAuthResult,
};
pub use rules::{
    AccessSpec, GitHubSecretsAccess, PermissionRule, ResourcePattern, SecretsRule,
    SecretsRuleTargets,
};
pub use token::{
    RepoAuthResult, RepoPatternResult, ReposAuthResult, ResourceAuthResult, RuleEvaluation,
    TokenAuthOutcome, TokenAuthResult, TokenAuthorizer, TokenRequest,
};
pub use types::{
    Access, Consumer, EnvironmentScope, PermissionLevel, PermissionSet, ProvisionTarget, RepoRef,
    RepoSelection, SecretScope, TokenDeclaration, compare_level, is_sufficient,
};
