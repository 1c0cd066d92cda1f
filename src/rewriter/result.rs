//! Result-side label rewriting
//!
//! Prometheus API responses carry series labels in objects stored under a
//! `metric` field (`/api/v1/query`, `/api/v1/query_range`). Those label sets
//! are renamed; everything else in the document is walked but left alone.

use std::borrow::Cow;

use serde_json::{Map, Value};
use tracing::warn;

use crate::config::Rule;
use crate::error::RewriteError;

/// Field whose object value is treated as a label set
const METRIC_FIELD: &str = "metric";

/// Rename label keys in every `metric` object of `tree`, in place
///
/// Rules are applied in order and all of them run, so when two rules write
/// the same target label the later one wins.
pub fn rewrite_labels(tree: &mut Value, rules: &[Rule]) {
    match tree {
        Value::Object(fields) => {
            if let Some(Value::Object(labels)) = fields.get_mut(METRIC_FIELD) {
                rename_labels(labels, rules);
            }
            for value in fields.values_mut() {
                rewrite_labels(value, rules);
            }
        }
        Value::Array(items) => {
            for item in items {
                rewrite_labels(item, rules);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {}
    }
}

fn rename_labels(labels: &mut Map<String, Value>, rules: &[Rule]) {
    for rule in rules {
        if let Some(value) = labels.remove(&rule.source_label) {
            labels.insert(rule.target_label.clone(), value);
        }
    }
}

/// Parse `body`, rewrite its labels and serialize it again
///
/// # Errors
/// Returns [`RewriteError::JsonParse`] if `body` is not a JSON document and
/// [`RewriteError::JsonEncode`] if the rewritten tree cannot be serialized.
pub fn try_rewrite_result_json(body: &[u8], rules: &[Rule]) -> Result<Vec<u8>, RewriteError> {
    let mut tree: Value = serde_json::from_slice(body).map_err(RewriteError::JsonParse)?;
    rewrite_labels(&mut tree, rules);
    serde_json::to_vec(&tree).map_err(RewriteError::JsonEncode)
}

/// Fail-open variant of [`try_rewrite_result_json`]
///
/// Returns the input unchanged when there are no rules or when the body
/// cannot be rewritten.
pub fn rewrite_result_json<'a>(body: &'a [u8], rules: &[Rule]) -> Cow<'a, [u8]> {
    if rules.is_empty() {
        return Cow::Borrowed(body);
    }

    match try_rewrite_result_json(body, rules) {
        Ok(rewritten) => Cow::Owned(rewritten),
        Err(e) => {
            warn!(error = %e, "Leaving response body unchanged");
            Cow::Borrowed(body)
        }
    }
}
