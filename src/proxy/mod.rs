//! Traffic interception
//!
//! - [`pipeline`] applies the label rewriters to request and response bodies
//!   while keeping content framing correct
//! - [`upstream`] forwards requests to the Prometheus backend

pub mod pipeline;
pub mod upstream;

pub use pipeline::{rewrite_query_string, rewrite_response_body, ResponseOutcome, RewrittenResponse};
pub use upstream::UpstreamClient;
