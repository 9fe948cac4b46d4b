//! Provision authorizer
//!
//! Decides, per target, whether a requester may write a named secret into a
//! GitHub secret store.
//!
//! Within one rule the verdict for a target is resolved in two tiers:
//!
//! 1. The `account`/`repo` access specs, which only apply when the target is
//!    the requester's own account or repo. A verdict here is final for the
//!    rule, whether it allows or denies.
//! 2. The pattern-keyed `accounts`/`repos` maps. Among all matching patterns a
//!    deny beats an allow.
//!
//! Across rules the last rule with a verdict wins. Rules that say nothing
//! about the target's surface leave the running verdict alone.

use crate::access_control::patterns::{Pattern, PatternContext, PatternMatcher};
use crate::access_control::rules::{AccessSpec, SecretsRule};
use crate::access_control::types::{Access, ProvisionTarget, RepoRef};
use crate::error::ConfigError;
use indexmap::IndexMap;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, trace};

/// A requester asking to provision one secret to a set of targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionRequest {
    pub requester: RepoRef,
    pub name: String,
    pub to: Vec<ProvisionTarget>,
}

/// Outcome of a provisioning authorization with per-target traces
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionAuthResult {
    pub request: ProvisionRequest,
    /// False when no targets were specified
    pub is_allowed: bool,
    pub results: Vec<TargetAuthResult>,
}

impl ProvisionAuthResult {
    pub fn has_targets(&self) -> bool {
        !self.results.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetAuthResult {
    pub target: ProvisionTarget,
    /// Rules that produced a verdict for this target, in evaluation order
    pub rules: Vec<SecretsRuleEvaluation>,
    pub is_allowed: bool,
}

impl TargetAuthResult {
    pub fn has_matching_rules(&self) -> bool {
        !self.rules.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SecretsRuleEvaluation {
    /// Zero-based position of the rule in the rule list
    pub index: usize,
    pub rule: Arc<SecretsRule>,
    pub access: Access,
}

struct CompiledAccessSpec {
    actions: Option<Access>,
    codespaces: Option<Access>,
    dependabot: Option<Access>,
    environments: Vec<(Pattern, Access)>,
}

impl CompiledAccessSpec {
    fn compile(spec: &AccessSpec) -> Result<Self, ConfigError> {
        Ok(Self {
            actions: spec.actions,
            codespaces: spec.codespaces,
            dependabot: spec.dependabot,
            environments: spec
                .environments
                .iter()
                .map(|(pattern, access)| {
                    Ok::<_, ConfigError>((Pattern::new(pattern)?, *access))
                })
                .collect::<Result<_, ConfigError>>()?,
        })
    }

    fn verdict(&self, target: &ProvisionTarget, ctx: &PatternContext<'_>) -> Option<Access> {
        match target {
            ProvisionTarget::Actions(_) => self.actions,
            ProvisionTarget::Codespaces(_) => self.codespaces,
            ProvisionTarget::Dependabot(_) => self.dependabot,
            ProvisionTarget::Environment(scope) => Access::combine(
                self.environments
                    .iter()
                    .filter(|(pattern, _)| pattern.matches_in(&scope.environment, ctx))
                    .map(|(_, access)| *access),
            ),
        }
    }
}

fn compile_keyed(
    specs: &IndexMap<String, AccessSpec>,
) -> Result<Vec<(Pattern, CompiledAccessSpec)>, ConfigError> {
    specs
        .iter()
        .map(|(pattern, spec)| {
            Ok::<_, ConfigError>((Pattern::new(pattern)?, CompiledAccessSpec::compile(spec)?))
        })
        .collect()
}

/// Deny-wins verdict across every pattern matching `value`
fn keyed_verdict(
    specs: &[(Pattern, CompiledAccessSpec)],
    value: &str,
    target: &ProvisionTarget,
    ctx: &PatternContext<'_>,
) -> Option<Access> {
    Access::combine(
        specs
            .iter()
            .filter(|(pattern, _)| pattern.matches_in(value, ctx))
            .filter_map(|(_, spec)| spec.verdict(target, ctx)),
    )
}

struct CompiledSecretsRule {
    index: usize,
    rule: Arc<SecretsRule>,
    secrets: PatternMatcher,
    requesters: PatternMatcher,
    account: CompiledAccessSpec,
    accounts: Vec<(Pattern, CompiledAccessSpec)>,
    repo: CompiledAccessSpec,
    repos: Vec<(Pattern, CompiledAccessSpec)>,
}

impl CompiledSecretsRule {
    fn compile(index: usize, rule: &SecretsRule) -> Result<Self, ConfigError> {
        let github = &rule.to.github;
        Ok(Self {
            index,
            rule: Arc::new(rule.clone()),
            secrets: PatternMatcher::new(&rule.secrets)?,
            requesters: PatternMatcher::new(&rule.requesters)?,
            account: CompiledAccessSpec::compile(&github.account)?,
            accounts: compile_keyed(&github.accounts)?,
            repo: CompiledAccessSpec::compile(&github.repo)?,
            repos: compile_keyed(&github.repos)?,
        })
    }

    fn matches(&self, request: &ProvisionRequest, ctx: &PatternContext<'_>) -> bool {
        self.secrets.matches_in(&request.name, ctx)
            && self
                .requesters
                .matches_in(&request.requester.to_string(), ctx)
    }

    /// Verdict of this rule for one target, `None` when the rule is silent
    fn verdict(
        &self,
        requester: &RepoRef,
        target: &ProvisionTarget,
        ctx: &PatternContext<'_>,
    ) -> Option<Access> {
        let account = target.account();
        match target.repo() {
            None => {
                let is_own = account == requester.account;
                is_own
                    .then(|| self.account.verdict(target, ctx))
                    .flatten()
                    .or_else(|| keyed_verdict(&self.accounts, account, target, ctx))
            }
            Some(repo) => {
                let is_own = account == requester.account && repo == requester.repo;
                let path = format!("{}/{}", account, repo);
                is_own
                    .then(|| self.repo.verdict(target, ctx))
                    .flatten()
                    .or_else(|| keyed_verdict(&self.repos, &path, target, ctx))
            }
        }
    }
}

/// Evaluates provisioning requests against a frozen list of secrets rules
pub struct ProvisionAuthorizer {
    rules: Vec<CompiledSecretsRule>,
}

impl ProvisionAuthorizer {
    /// Compile a rule list; fails on malformed patterns
    pub fn new(rules: &[SecretsRule]) -> Result<Self, ConfigError> {
        let rules = rules
            .iter()
            .enumerate()
            .map(|(index, rule)| CompiledSecretsRule::compile(index, rule))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(rules = rules.len(), "Compiled secrets rules");
        Ok(Self { rules })
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Authorize provisioning a secret to every requested target
    pub fn authorize_secret(&self, request: &ProvisionRequest) -> ProvisionAuthResult {
        let requester = &request.requester;
        let ctx = PatternContext::new(&requester.account, Some(&requester.repo));

        debug!(
            requester = %requester,
            secret = %request.name,
            targets = request.to.len(),
            "Authorizing secret provisioning"
        );

        let matching: Vec<&CompiledSecretsRule> = self
            .rules
            .iter()
            .filter(|rule| rule.matches(request, &ctx))
            .collect();
        trace!(matching = matching.len(), "Matched secrets rules");

        let results: Vec<TargetAuthResult> = request
            .to
            .iter()
            .map(|target| {
                let rules: Vec<SecretsRuleEvaluation> = matching
                    .iter()
                    .filter_map(|rule| {
                        rule.verdict(requester, target, &ctx)
                            .map(|access| SecretsRuleEvaluation {
                                index: rule.index,
                                rule: Arc::clone(&rule.rule),
                                access,
                            })
                    })
                    .collect();

                let is_allowed = rules.last().is_some_and(|last| last.access.is_allow());
                trace!(
                    surface = target.surface(),
                    account = target.account(),
                    repo = ?target.repo(),
                    is_allowed,
                    "Evaluated provisioning target"
                );

                TargetAuthResult {
                    target: target.clone(),
                    rules,
                    is_allowed,
                }
            })
            .collect();

        let is_allowed = !results.is_empty() && results.iter().all(|r| r.is_allowed);
        debug!(is_allowed, "Secret provisioning authorization complete");

        ProvisionAuthResult {
            request: request.clone(),
            is_allowed,
            results,
        }
    }
}
