//! HTTP request handlers
//!
//! A single catch-all handler forwards every request to the backend through
//! the interception pipeline.

use std::net::SocketAddr;

use axum::{
    body::{self, Body},
    extract::{ConnectInfo, Request, State},
    http::header::CONTENT_TYPE,
    response::Response,
};
use tracing::{debug, instrument};

use super::AppState;
use crate::error::{ProxyError, ProxyResult};
use crate::proxy::{pipeline, upstream};

/// Proxy endpoint - rewrites the request, forwards it and rewrites the response
#[instrument(skip_all, name = "proxy_handler")]
pub async fn proxy(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
) -> ProxyResult<Response> {
    let rules = state.rules.snapshot();
    let (parts, body) = request.into_parts();

    debug!(
        method = %parts.method,
        uri = %parts.uri,
        rules_version = rules.version(),
        "Rewriting request"
    );

    let query = parts.uri.query().map(|raw| {
        let rewritten = pipeline::rewrite_query_string(raw, rules.query_rules());
        debug!(original = %raw, rewritten = %rewritten, "Rewrote URL query");
        rewritten.into_owned()
    });
    let url = state
        .upstream
        .target_url(parts.uri.path(), query.as_deref());

    let client_ip = connect_info.map(|ConnectInfo(addr)| addr.ip());
    let mut headers = upstream::request_headers(&parts.headers, client_ip);

    let mut body = body::to_bytes(body, usize::MAX)
        .await
        .map_err(ProxyError::RequestBody)?;

    if pipeline::is_form_urlencoded(&parts.headers) {
        debug!(body = %pipeline::preview(&body), "Original request body");
        if let Some(rewritten) = pipeline::rewrite_form_body(&body, rules.query_rules()) {
            debug!(body = %pipeline::preview(&rewritten), "New request body");
            body = rewritten;
        }
        pipeline::set_content_length(&mut headers, &body);
    }

    let upstream_response = state
        .upstream
        .send(parts.method, url, headers, body)
        .await?;

    let status = upstream_response.status();
    let mut headers = upstream::strip_hop_by_hop(upstream_response.headers());

    debug!(
        status = %status,
        content_type = ?headers.get(CONTENT_TYPE),
        "Rewriting response"
    );

    if !pipeline::is_json(&headers) || rules.result_rules().is_empty() {
        debug!("Passing response body through");
        return Ok(build_response(
            status,
            headers,
            Body::from_stream(upstream_response.bytes_stream()),
        ));
    }

    let raw = upstream_response
        .bytes()
        .await
        .map_err(ProxyError::ResponseBody)?;

    let rewritten =
        pipeline::rewrite_response_body(raw, pipeline::is_gzip(&headers), rules.result_rules());
    rewritten.apply_to_headers(&mut headers);

    debug!(
        outcome = ?rewritten.outcome,
        content_length = rewritten.body.len(),
        "Response body ready"
    );

    Ok(build_response(status, headers, Body::from(rewritten.body)))
}

fn build_response(
    status: axum::http::StatusCode,
    headers: axum::http::HeaderMap,
    body: Body,
) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
