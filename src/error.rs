//! Error types for prom-relabel-proxy
//!
//! [`RewriteError`] covers the fail-open steps of the rewriting pipeline and is
//! never surfaced to clients. [`ProxyError`] covers transport failures that do
//! end the exchange.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Failures of a single rewriting step
///
/// Every variant is recovered from by passing the original bytes through.
#[derive(Error, Debug)]
pub enum RewriteError {
    /// Body is not a JSON document
    #[error("Failed to parse JSON body: {0}")]
    JsonParse(#[source] serde_json::Error),

    /// Rewritten tree could not be serialized
    #[error("Failed to encode JSON body: {0}")]
    JsonEncode(#[source] serde_json::Error),

    /// gzip decompression failed
    #[error("Failed to decompress gzip body: {0}")]
    Decompress(#[source] std::io::Error),

    /// gzip compression failed
    #[error("Failed to compress gzip body: {0}")]
    Compress(#[source] std::io::Error),
}

/// Transport-level proxy error
#[derive(Error, Debug)]
pub enum ProxyError {
    /// HTTP client could not be created
    #[error("Failed to initialize HTTP client: {0}")]
    ClientInit(#[source] reqwest::Error),

    /// Request to the backend failed
    #[error("Upstream request failed: {0}")]
    Upstream(#[source] reqwest::Error),

    /// Client request body could not be read
    #[error("Failed to read request body: {0}")]
    RequestBody(#[source] axum::Error),

    /// Backend response body could not be read
    #[error("Failed to read response body: {0}")]
    ResponseBody(#[source] reqwest::Error),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let (status, public_message) = match &self {
            ProxyError::ClientInit(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal error"),
            ProxyError::Upstream(_) => (StatusCode::BAD_GATEWAY, "Upstream error"),
            ProxyError::RequestBody(_) => (StatusCode::BAD_REQUEST, "Invalid request body"),
            ProxyError::ResponseBody(_) => (StatusCode::BAD_GATEWAY, "Upstream error"),
        };

        tracing::error!(status = %status, error = %self, "Request failed");

        (status, public_message).into_response()
    }
}

/// Result type alias for proxy errors
pub type ProxyResult<T> = Result<T, ProxyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_error_display() {
        let err = serde_json::from_slice::<serde_json::Value>(b"{").unwrap_err();
        let err = RewriteError::JsonParse(err);
        assert!(err.to_string().starts_with("Failed to parse JSON body"));
    }

    #[tokio::test]
    async fn test_upstream_failure_maps_to_bad_gateway() {
        let err = reqwest::Client::new()
            .get("http://127.0.0.1:1/unreachable")
            .send()
            .await
            .unwrap_err();
        let response = ProxyError::Upstream(err).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
