//! Query-side label rewriting
//!
//! Label matchers are treated as flat text: every innermost `{...}` group is
//! split on commas and each matcher whose label has a rule is renamed. This is
//! not a PromQL parser. Known limitations:
//!
//! - nested or braced subqueries are not understood
//! - commas inside quoted matcher values split the matcher
//! - a rewritten matcher loses its leading whitespace
//! - the operator is detected anywhere in the matcher text, so a value that
//!   itself contains `=~`, `!=` or `!~` can confuse it

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::config::Rule;

static SELECTOR_GROUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([^{}]*)\}").expect("invalid selector group regex"));

/// Matcher operators, in detection order
const OPERATORS: [&str; 3] = ["=~", "!=", "!~"];

/// Strategy for renaming labels inside a query string
///
/// Callers only depend on this trait so a grammar-based implementation can
/// replace [`BraceScanRewriter`] later.
pub trait QueryRewriter: Send + Sync {
    /// Rewrite `query` with `rules`; unmatched input comes back unchanged
    fn rewrite(&self, query: &str, rules: &[Rule]) -> String;
}

/// Regex brace-scanning rewriter
#[derive(Debug, Clone, Copy, Default)]
pub struct BraceScanRewriter;

impl QueryRewriter for BraceScanRewriter {
    fn rewrite(&self, query: &str, rules: &[Rule]) -> String {
        if rules.is_empty() {
            return query.to_string();
        }

        SELECTOR_GROUP
            .replace_all(query, |caps: &Captures<'_>| {
                let matchers: Vec<String> = caps[1]
                    .split(',')
                    .map(|matcher| rewrite_matcher(matcher, rules))
                    .collect();
                format!("{{{}}}", matchers.join(","))
            })
            .into_owned()
    }
}

/// Rewrite a query with the default [`BraceScanRewriter`]
pub fn rewrite_query(query: &str, rules: &[Rule]) -> String {
    BraceScanRewriter.rewrite(query, rules)
}

/// Rename a single matcher using the first rule whose label it starts with
fn rewrite_matcher(matcher: &str, rules: &[Rule]) -> String {
    let trimmed = matcher.trim();

    let Some(rule) = rules
        .iter()
        .find(|rule| starts_with_label(trimmed, &rule.source_label))
    else {
        return matcher.to_string();
    };

    let operator = OPERATORS
        .iter()
        .copied()
        .find(|op| matcher.contains(op))
        .unwrap_or("=");

    match matcher.find(operator) {
        Some(idx) => {
            let value = &matcher[idx + operator.len()..];
            format!("{}{}{}", rule.target_label, operator, value)
        }
        None => matcher.to_string(),
    }
}

/// `label` immediately followed by one of `=`, `=~`, `!=`, `!~`
fn starts_with_label(matcher: &str, label: &str) -> bool {
    matcher
        .strip_prefix(label)
        .map(|rest| rest.starts_with('=') || rest.starts_with("!=") || rest.starts_with("!~"))
        .unwrap_or(false)
}
