//! Pattern matching for access control
//!
//! Patterns are glob strings over `[A-Za-z0-9*_.-/]` where `*` matches zero or
//! more of any character, including `/`. Matching is anchored: a pattern must
//! match the whole value. Two placeholders are supported:
//!
//! - `<account>` - the requesting account
//! - `<repo>` - the requesting repo name
//!
//! Placeholders are substituted with the literal requester value before
//! matching, so `<account>/*` only matches repos in the requester's account.
//! Patterns are translated into anchored regexes with every literal part
//! escaped.

use crate::error::ConfigError;
use regex::Regex;
use tracing::warn;

const ACCOUNT_PLACEHOLDER: &str = "<account>";
const REPO_PLACEHOLDER: &str = "<repo>";

/// Requester values substituted into placeholders
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternContext<'a> {
    pub account: Option<&'a str>,
    pub repo: Option<&'a str>,
}

impl<'a> PatternContext<'a> {
    pub fn new(account: &'a str, repo: Option<&'a str>) -> Self {
        Self {
            account: Some(account),
            repo,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Wildcard,
    Account,
    Repo,
}

/// A single compiled glob pattern
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    segments: Vec<Segment>,
    /// Precompiled matcher, present when the pattern has no placeholders
    regex: Option<Regex>,
}

impl Pattern {
    pub fn new(pattern: &str) -> Result<Self, ConfigError> {
        let segments = parse(pattern)?;
        let is_contextual = segments
            .iter()
            .any(|s| matches!(s, Segment::Account | Segment::Repo));

        let regex = if is_contextual {
            None
        } else {
            let source = to_regex(&segments, &PatternContext::default()).unwrap_or_default();
            Some(
                Regex::new(&source).map_err(|e| ConfigError::InvalidPattern {
                    pattern: pattern.to_string(),
                    reason: e.to_string(),
                })?,
            )
        };

        Ok(Self {
            source: pattern.to_string(),
            segments,
            regex,
        })
    }

    /// Whether the pattern contains a `*` wildcard
    pub fn has_wildcard(&self) -> bool {
        self.segments.iter().any(|s| *s == Segment::Wildcard)
    }

    /// Whether the pattern uses `<account>` or `<repo>`
    pub fn is_contextual(&self) -> bool {
        self.regex.is_none()
    }

    /// Match after substituting placeholders from `ctx`
    ///
    /// A placeholder whose value is missing from the context makes the whole
    /// pattern fail to match.
    pub fn matches_in(&self, value: &str, ctx: &PatternContext<'_>) -> bool {
        if let Some(regex) = &self.regex {
            return regex.is_match(value);
        }

        let Some(source) = to_regex(&self.segments, ctx) else {
            return false;
        };

        match Regex::new(&source) {
            Ok(regex) => regex.is_match(value),
            Err(e) => {
                warn!(pattern = %self.source, error = %e, "Failed to compile substituted pattern");
                false
            }
        }
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Pattern {}

fn parse(pattern: &str) -> Result<Vec<Segment>, ConfigError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = pattern;

    let flush = |literal: &mut String, segments: &mut Vec<Segment>| {
        if !literal.is_empty() {
            segments.push(Segment::Literal(std::mem::take(literal)));
        }
    };

    while let Some(c) = rest.chars().next() {
        if let Some(after) = rest.strip_prefix(ACCOUNT_PLACEHOLDER) {
            flush(&mut literal, &mut segments);
            segments.push(Segment::Account);
            rest = after;
            continue;
        }
        if let Some(after) = rest.strip_prefix(REPO_PLACEHOLDER) {
            flush(&mut literal, &mut segments);
            segments.push(Segment::Repo);
            rest = after;
            continue;
        }

        match c {
            '*' => {
                flush(&mut literal, &mut segments);
                if segments.last() != Some(&Segment::Wildcard) {
                    segments.push(Segment::Wildcard);
                }
            }
            c if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | '/') => {
                literal.push(c);
            }
            _ => {
                return Err(ConfigError::InvalidPattern {
                    pattern: pattern.to_string(),
                    reason: format!("unexpected character '{}'", c),
                });
            }
        }
        rest = &rest[c.len_utf8()..];
    }
    flush(&mut literal, &mut segments);

    Ok(segments)
}

/// Build an anchored regex source, `None` when a placeholder has no value
fn to_regex(segments: &[Segment], ctx: &PatternContext<'_>) -> Option<String> {
    let mut source = String::from("^");
    for segment in segments {
        match segment {
            Segment::Literal(text) => source.push_str(&regex::escape(text)),
            Segment::Wildcard => source.push_str(".*"),
            Segment::Account => source.push_str(&regex::escape(ctx.account?)),
            Segment::Repo => source.push_str(&regex::escape(ctx.repo?)),
        }
    }
    source.push('$');
    Some(source)
}

/// Compiled list of patterns; matches when any pattern matches
#[derive(Debug, Clone, Default)]
pub struct PatternMatcher {
    patterns: Vec<Pattern>,
}

impl PatternMatcher {
    /// Create a new pattern matcher from a list of glob patterns
    pub fn new(patterns: &[String]) -> Result<Self, ConfigError> {
        let patterns = patterns
            .iter()
            .map(|p| Pattern::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn matches_in(&self, value: &str, ctx: &PatternContext<'_>) -> bool {
        self.patterns.iter().any(|p| p.matches_in(value, ctx))
    }
}
