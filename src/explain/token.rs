//! Token authorization explainer

use super::{ExplainNode, count, render, rule_label};
use crate::access_control::{
    Consumer, PermissionSet, ResourceAuthResult, RuleEvaluation, TokenAuthOutcome,
    TokenAuthResult,
};

/// Render a token authorization result
pub fn explain_token(result: &TokenAuthResult) -> String {
    render(&token_tree(result))
}

/// Build the explanation tree for a token authorization result
pub fn token_tree(result: &TokenAuthResult) -> ExplainNode {
    let declaration = &result.request.declaration;
    let account = &declaration.account;
    let want = &declaration.permissions;

    let scope = match &result.outcome {
        TokenAuthOutcome::AllRepos(_) => format!("all repos in {}", account),
        TokenAuthOutcome::NoRepos(_) => format!("no repos in {}", account),
        TokenAuthOutcome::Repos(repos) => {
            format!("{} in {}", count(repos.repos.len(), "repo"), account)
        }
    };

    let mut root = ExplainNode::new(
        result.is_allowed,
        format!(
            "{} was {} access to a token for {}:",
            consumer_label(&result.request.consumer),
            if result.is_allowed { "allowed" } else { "denied" },
            scope
        ),
    );

    if result.is_missing_role {
        root.push(ExplainNode::new(false, "Write or admin access requires a role"));
    }

    match &result.outcome {
        TokenAuthOutcome::AllRepos(resource) | TokenAuthOutcome::NoRepos(resource) => {
            root.push(resource_node(&scope, resource, want));
        }
        TokenAuthOutcome::Repos(repos) => {
            for pattern in &repos.patterns {
                root.push(ExplainNode::new(
                    pattern.matches > 0,
                    format!("{} matched {}", pattern.pattern, count(pattern.matches, "repo")),
                ));
            }
            for repo in &repos.repos {
                let subject = format!("repo {}/{}", account, repo.repo);
                root.push(resource_node(&subject, &repo.result, want));
            }
        }
    }

    root
}

fn consumer_label(consumer: &Consumer) -> String {
    match &consumer.repo {
        Some(repo) => format!("Repo {}/{}", consumer.account, repo),
        None => format!("Account {}", consumer.account),
    }
}

fn resource_node(
    subject: &str,
    resource: &ResourceAuthResult,
    want: &PermissionSet,
) -> ExplainNode {
    if !resource.has_matching_rules() {
        return ExplainNode::new(
            false,
            format!("Insufficient access to {} (no matching rules)", subject),
        );
    }

    ExplainNode::new(
        resource.is_sufficient,
        format!(
            "{} access to {} based on {}:",
            if resource.is_sufficient {
                "Sufficient"
            } else {
                "Insufficient"
            },
            subject,
            count(resource.rules.len(), "rule")
        ),
    )
    .with_children(resource.rules.iter().map(|rule| rule_node(rule, want)))
}

fn rule_node(evaluation: &RuleEvaluation, want: &PermissionSet) -> ExplainNode {
    ExplainNode::new(
        evaluation.is_sufficient,
        format!(
            "Rule {} gave {} access:",
            rule_label(evaluation.index, evaluation.rule.description.as_deref()),
            if evaluation.is_sufficient {
                "sufficient"
            } else {
                "insufficient"
            }
        ),
    )
    .with_children(want.iter().map(|(name, wanted)| {
        let have = evaluation.have.get(name);
        ExplainNode::new(
            have.satisfies(wanted),
            format!("{}: have {}, wanted {}", name, have, wanted),
        )
    }))
}
