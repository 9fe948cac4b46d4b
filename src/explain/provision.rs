//! Provisioning authorization explainer

use super::{ExplainNode, count, render, rule_label};
use crate::access_control::{ProvisionAuthResult, ProvisionTarget, SecretScope, TargetAuthResult};

/// Render a provisioning authorization result
pub fn explain_provision(result: &ProvisionAuthResult) -> String {
    render(&provision_tree(result))
}

/// Build the explanation tree for a provisioning authorization result
pub fn provision_tree(result: &ProvisionAuthResult) -> ExplainNode {
    let request = &result.request;
    let mut root = ExplainNode::new(
        result.is_allowed,
        format!(
            "Repo {} was {} to provision secret {}:",
            request.requester,
            if result.is_allowed { "allowed" } else { "denied" },
            request.name
        ),
    );

    if !result.has_targets() {
        root.push(ExplainNode::new(false, "No targets specified"));
        return root;
    }

    root.with_children(result.results.iter().map(target_node))
}

fn target_node(result: &TargetAuthResult) -> ExplainNode {
    let target = describe_target(&result.target);
    if !result.has_matching_rules() {
        return ExplainNode::new(
            false,
            format!("Can't provision to {} (no matching rules)", target),
        );
    }

    ExplainNode::new(
        result.is_allowed,
        format!(
            "{} provision to {} based on {}:",
            if result.is_allowed { "Can" } else { "Can't" },
            target,
            count(result.rules.len(), "rule")
        ),
    )
    .with_children(result.rules.iter().map(|evaluation| {
        let is_allow = evaluation.access.is_allow();
        ExplainNode::new(
            is_allow,
            format!(
                "{} by rule {}",
                if is_allow { "Allowed" } else { "Denied" },
                rule_label(evaluation.index, evaluation.rule.description.as_deref())
            ),
        )
    }))
}

fn describe_target(target: &ProvisionTarget) -> String {
    match target {
        ProvisionTarget::Actions(scope) => {
            format!("GitHub Actions secret in {}", describe_scope(scope))
        }
        ProvisionTarget::Codespaces(scope) => {
            format!("GitHub Codespaces secret in {}", describe_scope(scope))
        }
        ProvisionTarget::Dependabot(scope) => {
            format!("Dependabot secret in {}", describe_scope(scope))
        }
        ProvisionTarget::Environment(scope) => format!(
            "environment {} secret in repo {}/{}",
            scope.environment, scope.account, scope.repo
        ),
    }
}

fn describe_scope(scope: &SecretScope) -> String {
    match &scope.repo {
        Some(repo) => format!("repo {}/{}", scope.account, repo),
        None => format!("account {}", scope.account),
    }
}
