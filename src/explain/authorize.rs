//! Combined explainer for orchestrator results

use super::{ExplainNode, provision_tree, render, token_tree};
use crate::authorizer::{AuthorizeResult, SecretAuthResult, TokenOutcome};

/// Render every secret result, one tree after another
pub fn explain_authorize_result(result: &AuthorizeResult) -> String {
    result
        .secrets
        .iter()
        .map(explain_secret_result)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render the result for a single secret
pub fn explain_secret_result(result: &SecretAuthResult) -> String {
    render(&secret_tree(result))
}

fn secret_tree(result: &SecretAuthResult) -> ExplainNode {
    let mut root = ExplainNode::new(
        result.is_allowed,
        format!("Secret {} for repo {}:", result.secret, result.requester),
    );

    let reference = if result.token_owner == result.requester {
        result.token_name.clone()
    } else {
        format!("{} from repo {}", result.token_name, result.token_owner)
    };

    match &result.token {
        TokenOutcome::Authorized(token) => {
            root.push(token_tree(token));
            root.push(match result.issuers.first() {
                Some(id) => ExplainNode::new(true, format!("Issued by installation {}", id)),
                None => ExplainNode::new(false, "No installation can issue this token"),
            });
        }
        TokenOutcome::NotFound => {
            root.push(ExplainNode::new(false, format!("Token {} not found", reference)));
        }
        TokenOutcome::NotShared => {
            root.push(ExplainNode::new(false, format!("Token {} is not shared", reference)));
        }
    }

    root.push(provision_tree(&result.provision));
    root
}
