//! Token authorizer
//!
//! Decides whether an ordered list of permission rules grants a consumer
//! enough access for the token it declared.
//!
//! Rules are evaluated in order. Every rule that matches both the consumer
//! and the resource is overlaid onto the running "have" set: permissions the
//! rule mentions replace whatever was there before, so the *last* matching
//! rule wins for each permission. The final verdict is taken from the
//! accumulated set after the last matching rule.
//!
//! Requests for write or admin access also need a role. Without one the
//! request is denied, but rules are still evaluated so the trace can explain
//! what would otherwise have happened.

use crate::access_control::patterns::{Pattern, PatternContext, PatternMatcher};
use crate::access_control::rules::{PermissionRule, ResourcePattern};
use crate::access_control::types::{Consumer, PermissionSet, RepoSelection, TokenDeclaration};
use crate::error::ConfigError;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// A consumer asking for the token it declared
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenRequest {
    pub consumer: Consumer,
    pub declaration: TokenDeclaration,
    /// Repos known to exist in the declaration's account, used to expand
    /// wildcard repo patterns
    pub known_repos: Vec<String>,
}

impl TokenRequest {
    /// Placeholder values taken from the consumer
    pub fn pattern_context(&self) -> PatternContext<'_> {
        PatternContext::new(&self.consumer.account, self.consumer.repo.as_deref())
    }

    /// Concrete repos named by the declaration's repo patterns
    ///
    /// Empty for `"all"` and for account-level declarations. `None` when a
    /// pattern matches no repo.
    pub fn resolved_repos(&self) -> Option<BTreeSet<String>> {
        match &self.declaration.repos {
            RepoSelection::All => Some(BTreeSet::new()),
            RepoSelection::Selected(patterns) => {
                let (results, resolved) =
                    resolve_repos(patterns, &self.known_repos, &self.pattern_context());
                results.iter().all(|r| r.matches > 0).then_some(resolved)
            }
        }
    }
}

/// Outcome of a token authorization with its full trace
#[derive(Debug, Clone, Serialize)]
pub struct TokenAuthResult {
    pub request: TokenRequest,
    /// Write/admin access was wanted without a role
    pub is_missing_role: bool,
    pub is_allowed: bool,
    pub outcome: TokenAuthOutcome,
}

/// Per-scope evaluation details
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenAuthOutcome {
    /// Token for every repo in the account
    AllRepos(ResourceAuthResult),
    /// Account-level token without repo access
    NoRepos(ResourceAuthResult),
    /// Token for an explicit set of repos, evaluated per repo
    Repos(ReposAuthResult),
}

/// Evaluation of all rules against a single resource
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResourceAuthResult {
    /// Matching rules only, in evaluation order
    pub rules: Vec<RuleEvaluation>,
    /// Accumulated permissions after the last matching rule
    pub have: PermissionSet,
    pub is_sufficient: bool,
}

impl ResourceAuthResult {
    pub fn has_matching_rules(&self) -> bool {
        !self.rules.is_empty()
    }
}

/// State after applying one matching rule
#[derive(Debug, Clone, Serialize)]
pub struct RuleEvaluation {
    /// Zero-based position of the rule in the rule list
    pub index: usize,
    pub rule: Arc<PermissionRule>,
    /// Accumulated permissions including this rule
    pub have: PermissionSet,
    pub is_sufficient: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReposAuthResult {
    /// Declared repo patterns with how many repos each resolved to
    pub patterns: Vec<RepoPatternResult>,
    /// Per-repo results, sorted by repo name
    pub repos: Vec<RepoAuthResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoPatternResult {
    pub pattern: String,
    pub matches: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepoAuthResult {
    pub repo: String,
    #[serde(flatten)]
    pub result: ResourceAuthResult,
}

/// Scope of the resource a rule is checked against
#[derive(Debug, Clone, Copy)]
enum ResourceScope<'a> {
    AllRepos,
    NoRepos,
    Repo(&'a str),
}

struct CompiledResource {
    accounts: PatternMatcher,
    no_repos: bool,
    all_repos: bool,
    selected_repos: PatternMatcher,
}

impl CompiledResource {
    fn compile(resource: &ResourcePattern) -> Result<Self, ConfigError> {
        Ok(Self {
            accounts: PatternMatcher::new(&resource.accounts)?,
            no_repos: resource.no_repos,
            all_repos: resource.all_repos,
            selected_repos: PatternMatcher::new(&resource.selected_repos)?,
        })
    }

    fn matches(&self, account: &str, scope: ResourceScope<'_>, ctx: &PatternContext<'_>) -> bool {
        if !self.accounts.matches_in(account, ctx) {
            return false;
        }

        match scope {
            ResourceScope::AllRepos => self.all_repos,
            ResourceScope::NoRepos => self.no_repos,
            ResourceScope::Repo(repo) => {
                self.all_repos || self.selected_repos.matches_in(repo, ctx)
            }
        }
    }
}

struct CompiledRule {
    index: usize,
    rule: Arc<PermissionRule>,
    consumers: PatternMatcher,
    resources: Vec<CompiledResource>,
}

impl CompiledRule {
    fn matches_consumer(&self, consumer: &Consumer, ctx: &PatternContext<'_>) -> bool {
        // The account form suffices even when a repo is asking
        self.consumers.matches_in(&consumer.account, ctx)
            || consumer
                .repo_path()
                .is_some_and(|path| self.consumers.matches_in(&path, ctx))
    }

    fn matches_resource(
        &self,
        account: &str,
        scope: ResourceScope<'_>,
        ctx: &PatternContext<'_>,
    ) -> bool {
        self.resources
            .iter()
            .any(|resource| resource.matches(account, scope, ctx))
    }
}

/// Evaluates token requests against a frozen list of permission rules
pub struct TokenAuthorizer {
    rules: Vec<CompiledRule>,
}

impl TokenAuthorizer {
    /// Compile a rule list; fails on malformed patterns
    pub fn new(rules: &[PermissionRule]) -> Result<Self, ConfigError> {
        let rules = rules
            .iter()
            .enumerate()
            .map(|(index, rule)| {
                Ok::<_, ConfigError>(CompiledRule {
                    index,
                    rule: Arc::new(rule.clone()),
                    consumers: PatternMatcher::new(&rule.consumers)?,
                    resources: rule
                        .resources
                        .iter()
                        .map(CompiledResource::compile)
                        .collect::<Result<_, ConfigError>>()?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(rules = rules.len(), "Compiled permission rules");
        Ok(Self { rules })
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Authorize a token request
    pub fn authorize_token(&self, request: &TokenRequest) -> TokenAuthResult {
        let consumer = &request.consumer;
        let declaration = &request.declaration;
        let ctx = request.pattern_context();
        let want = &declaration.permissions;

        let is_missing_role = declaration.role.is_none() && want.requires_role();

        debug!(
            consumer = %consumer,
            account = %declaration.account,
            role = ?declaration.role,
            want = %want,
            "Authorizing token"
        );

        let (outcome, is_sufficient) = match &declaration.repos {
            RepoSelection::All => {
                let result = self.evaluate(
                    consumer,
                    &ctx,
                    &declaration.account,
                    ResourceScope::AllRepos,
                    want,
                );
                let is_sufficient = result.is_sufficient;
                (TokenAuthOutcome::AllRepos(result), is_sufficient)
            }
            selection if selection.is_none() => {
                let result = self.evaluate(
                    consumer,
                    &ctx,
                    &declaration.account,
                    ResourceScope::NoRepos,
                    want,
                );
                let is_sufficient = result.is_sufficient;
                (TokenAuthOutcome::NoRepos(result), is_sufficient)
            }
            RepoSelection::Selected(patterns) => {
                let (patterns, repos) = resolve_repos(patterns, &request.known_repos, &ctx);
                let repos: Vec<RepoAuthResult> = repos
                    .into_iter()
                    .map(|repo| {
                        let result = self.evaluate(
                            consumer,
                            &ctx,
                            &declaration.account,
                            ResourceScope::Repo(&repo),
                            want,
                        );
                        RepoAuthResult { repo, result }
                    })
                    .collect();

                let is_sufficient = !repos.is_empty()
                    && patterns.iter().all(|p| p.matches > 0)
                    && repos.iter().all(|r| r.result.is_sufficient);
                (
                    TokenAuthOutcome::Repos(ReposAuthResult { patterns, repos }),
                    is_sufficient,
                )
            }
        };

        let is_allowed = is_sufficient && !is_missing_role;
        debug!(is_allowed, is_missing_role, "Token authorization complete");

        TokenAuthResult {
            request: request.clone(),
            is_missing_role,
            is_allowed,
            outcome,
        }
    }

    /// Fold every matching rule into the accumulated permission set
    fn evaluate(
        &self,
        consumer: &Consumer,
        ctx: &PatternContext<'_>,
        account: &str,
        scope: ResourceScope<'_>,
        want: &PermissionSet,
    ) -> ResourceAuthResult {
        let rules = self
            .rules
            .iter()
            .filter(|rule| {
                let matched = rule.matches_consumer(consumer, ctx)
                    && rule.matches_resource(account, scope, ctx);
                trace!(rule = rule.index + 1, ?scope, matched, "Evaluated permission rule");
                matched
            })
            .fold(Vec::<RuleEvaluation>::new(), |mut evaluations, rule| {
                let have = evaluations
                    .last()
                    .map(|previous| previous.have.overlay(&rule.rule.permissions))
                    .unwrap_or_else(|| rule.rule.permissions.clone());
                let is_sufficient = have.satisfies(want);
                evaluations.push(RuleEvaluation {
                    index: rule.index,
                    rule: Arc::clone(&rule.rule),
                    have,
                    is_sufficient,
                });
                evaluations
            });

        match rules.last() {
            Some(last) => ResourceAuthResult {
                have: last.have.clone(),
                is_sufficient: last.is_sufficient,
                rules,
            },
            None => ResourceAuthResult::default(),
        }
    }
}

/// Expand declared repo patterns into concrete repo names
///
/// Wildcard-free patterns name a repo directly. Other patterns are expanded
/// against the known repos of the account. Returned repos are unique and
/// sorted.
fn resolve_repos(
    patterns: &[String],
    known_repos: &[String],
    ctx: &PatternContext<'_>,
) -> (Vec<RepoPatternResult>, BTreeSet<String>) {
    let mut resolved = BTreeSet::new();

    let results = patterns
        .iter()
        .map(|source| {
            let matched: Vec<&String> = match Pattern::new(source) {
                Ok(pattern) if !pattern.has_wildcard() && !pattern.is_contextual() => {
                    vec![source]
                }
                Ok(pattern) => known_repos
                    .iter()
                    .filter(|repo| pattern.matches_in(repo, ctx))
                    .collect(),
                Err(e) => {
                    warn!(pattern = %source, error = %e, "Ignoring malformed repo pattern");
                    Vec::new()
                }
            };

            resolved.extend(matched.iter().map(|repo| repo.to_string()));
            RepoPatternResult {
                pattern: source.clone(),
                matches: matched.len(),
            }
        })
        .collect();

    (results, resolved)
}
