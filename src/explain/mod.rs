//! Explainers
//!
//! Turn authorization traces into human-readable trees:
//!
//! ```text
//! ✅ Repo account-x/repo-x was allowed access to a token for all repos in account-a:
//!   ✅ Sufficient access to all repos in account-a based on 1 rule:
//!     ✅ Rule #1 "Read access" gave sufficient access:
//!       ✅ contents: have read, wanted read
//! ```
//!
//! Explainers first build an [`ExplainNode`] tree from a result and then
//! render it. Each line is indented by two spaces per depth and prefixed with
//! ✅ or ❌. Lines are joined with `\n` without a trailing newline.

pub mod authorize;
pub mod provision;
pub mod token;

pub use authorize::{explain_authorize_result, explain_secret_result};
pub use provision::{explain_provision, provision_tree};
pub use token::{explain_token, token_tree};

use serde::Serialize;

const SUCCESS: &str = "✅";
const FAILURE: &str = "❌";
const INDENT: &str = "  ";

/// One line of an explanation with its nested details
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExplainNode {
    pub ok: bool,
    pub text: String,
    pub children: Vec<ExplainNode>,
}

impl ExplainNode {
    pub fn new(ok: bool, text: impl Into<String>) -> Self {
        Self {
            ok,
            text: text.into(),
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = ExplainNode>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn push(&mut self, child: ExplainNode) {
        self.children.push(child);
    }
}

/// Render a tree into indented text
pub fn render(node: &ExplainNode) -> String {
    let mut lines = Vec::new();
    render_into(node, 0, &mut lines);
    lines.join("\n")
}

fn render_into(node: &ExplainNode, depth: usize, lines: &mut Vec<String>) {
    let glyph = if node.ok { SUCCESS } else { FAILURE };
    lines.push(format!("{}{} {}", INDENT.repeat(depth), glyph, node.text));
    for child in &node.children {
        render_into(child, depth + 1, lines);
    }
}

/// `1 rule`, `2 rules`
pub(crate) fn count(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("{} {}", n, noun)
    } else {
        format!("{} {}s", n, noun)
    }
}

/// `rule #3`, or `rule #3 "Description"` when the rule has one
pub(crate) fn rule_label(index: usize, description: Option<&str>) -> String {
    match description {
        Some(description) => format!("#{} \"{}\"", index + 1, description),
        None => format!("#{}", index + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_nested() {
        let tree = ExplainNode::new(true, "root").with_children([
            ExplainNode::new(false, "child")
                .with_children([ExplainNode::new(true, "grandchild")]),
            ExplainNode::new(true, "sibling"),
        ]);

        assert_eq!(
            render(&tree),
            "✅ root\n  ❌ child\n    ✅ grandchild\n  ✅ sibling"
        );
    }

    #[test]
    fn test_count() {
        assert_eq!(count(0, "rule"), "0 rules");
        assert_eq!(count(1, "repo"), "1 repo");
        assert_eq!(count(2, "repo"), "2 repos");
    }

    #[test]
    fn test_rule_label() {
        assert_eq!(rule_label(0, None), "#1");
        assert_eq!(rule_label(2, Some("Deploy")), "#3 \"Deploy\"");
    }
}
