//! Label rewriting engine
//!
//! This module translates label names between the external vocabulary seen by
//! query clients and the internal vocabulary stored by the backend:
//!
//! - [`query`] renames labels inside PromQL selector groups (`{...}`)
//! - [`result`] renames labels inside `metric` objects of JSON API responses
//! - [`table`] holds the resolved, versioned rule table shared by both
//!
//! # Example
//!
//! ```ignore
//! use prom_relabel_proxy::config::Rule;
//! use prom_relabel_proxy::rewriter::rewrite_query;
//!
//! let rules = vec![Rule::new("instance", "host")];
//! assert_eq!(rewrite_query(r#"up{instance="a"}"#, &rules), r#"up{host="a"}"#);
//! ```

pub mod query;
pub mod result;
pub mod table;

pub use query::{rewrite_query, BraceScanRewriter, QueryRewriter};
pub use result::{rewrite_labels, rewrite_result_json, try_rewrite_result_json};
pub use table::{RuleTable, SharedRuleTable};
