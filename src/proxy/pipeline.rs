//! Interception pipeline
//!
//! Applies the rewriters to HTTP traffic while keeping the framing honest:
//! whatever body is finally sent, `Content-Length` describes it and
//! `Content-Encoding` only claims gzip when the bytes really are gzip.

use std::borrow::Cow;
use std::io::{Read, Write};

use axum::body::Bytes;
use axum::http::header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue};
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{debug, warn};
use url::form_urlencoded;

use crate::config::Rule;
use crate::error::RewriteError;
use crate::rewriter::{rewrite_query, rewrite_result_json};

/// Query parameters and form fields that carry PromQL
pub const QUERY_PARAMS: [&str; 2] = ["query", "match[]"];

/// Maximum number of bytes shown in debug body previews
const PREVIEW_LEN: usize = 200;

/// Rewrite the PromQL-carrying pairs of a urlencoded string
///
/// Returns `None` when there is nothing to rewrite, so the caller can keep
/// the original bytes. Otherwise every pair is re-encoded in its original
/// order.
pub fn rewrite_form_pairs(input: &[u8], rules: &[Rule]) -> Option<String> {
    if rules.is_empty() {
        return None;
    }

    let mut pairs: Vec<(Cow<'_, str>, Cow<'_, str>)> = form_urlencoded::parse(input).collect();
    if !pairs.iter().any(|(key, _)| is_query_param(key)) {
        return None;
    }

    for (key, value) in pairs.iter_mut() {
        if is_query_param(key) {
            let rewritten = rewrite_query(value, rules);
            debug!(param = %key, original = %value, rewritten = %rewritten, "Rewrote query param");
            *value = Cow::Owned(rewritten);
        }
    }

    Some(
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish(),
    )
}

fn is_query_param(key: &str) -> bool {
    QUERY_PARAMS.contains(&key)
}

/// Rewrite the raw query string of a request URI
pub fn rewrite_query_string<'a>(raw: &'a str, rules: &[Rule]) -> Cow<'a, str> {
    match rewrite_form_pairs(raw.as_bytes(), rules) {
        Some(rewritten) => Cow::Owned(rewritten),
        None => Cow::Borrowed(raw),
    }
}

/// Rewrite a form-encoded request body
///
/// Returns `None` when the body is unchanged. When `Some`, the caller must
/// send the new body with [`set_content_length`].
pub fn rewrite_form_body(body: &[u8], rules: &[Rule]) -> Option<Bytes> {
    rewrite_form_pairs(body, rules).map(Bytes::from)
}

/// Media type of a `Content-Type` header, without parameters
fn media_type(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim())
}

/// Request body is `application/x-www-form-urlencoded`
pub fn is_form_urlencoded(headers: &HeaderMap) -> bool {
    media_type(headers)
        .map(|mt| mt.eq_ignore_ascii_case("application/x-www-form-urlencoded"))
        .unwrap_or(false)
}

/// Response body should be treated as JSON
pub fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("application/json"))
        .unwrap_or(false)
}

/// Body declares `Content-Encoding: gzip`
pub fn is_gzip(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().eq_ignore_ascii_case("gzip"))
        .unwrap_or(false)
}

/// Set `Content-Length` to the exact length of `body`
pub fn set_content_length(headers: &mut HeaderMap, body: &[u8]) {
    headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
}

/// Decompress a gzip body
pub fn gunzip(body: &[u8]) -> Result<Vec<u8>, RewriteError> {
    let mut out = Vec::new();
    MultiGzDecoder::new(body)
        .read_to_end(&mut out)
        .map_err(RewriteError::Decompress)?;
    Ok(out)
}

/// Compress a body with gzip
pub fn gzip(body: &[u8]) -> Result<Vec<u8>, RewriteError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(body).map_err(RewriteError::Compress)?;
    encoder.finish().map_err(RewriteError::Compress)
}

/// What happened to a response body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// Labels rewritten, body sent with its original encoding
    Rewritten,
    /// Original bytes sent
    Unchanged,
    /// Labels rewritten but recompression failed; body sent as identity
    Decoded,
}

/// Final response body plus what the headers must say about it
#[derive(Debug, Clone)]
pub struct RewrittenResponse {
    /// Bytes to send
    pub body: Bytes,
    /// How the body was produced
    pub outcome: ResponseOutcome,
}

impl RewrittenResponse {
    fn unchanged(body: Bytes) -> Self {
        Self {
            body,
            outcome: ResponseOutcome::Unchanged,
        }
    }

    /// Fix the framing headers for the final body
    pub fn apply_to_headers(&self, headers: &mut HeaderMap) {
        if self.outcome == ResponseOutcome::Decoded {
            headers.remove(CONTENT_ENCODING);
        }
        set_content_length(headers, &self.body);
    }
}

/// Rewrite a complete JSON response body
///
/// `gzip_encoded` says whether the body is gzip-encoded. Never fails: parse
/// and decompression errors keep the original bytes, a recompression error
/// sends the rewritten bytes uncompressed.
pub fn rewrite_response_body(body: Bytes, gzip_encoded: bool, rules: &[Rule]) -> RewrittenResponse {
    if rules.is_empty() {
        return RewrittenResponse::unchanged(body);
    }

    let decoded: Cow<'_, [u8]> = if gzip_encoded {
        match gunzip(&body) {
            Ok(decoded) => Cow::Owned(decoded),
            Err(e) => {
                warn!(error = %e, "Leaving compressed response body unchanged");
                return RewrittenResponse::unchanged(body);
            }
        }
    } else {
        Cow::Borrowed(&body[..])
    };

    debug!(body = %preview(&decoded), "Original response body (sample)");

    let rewritten = match rewrite_result_json(&decoded, rules) {
        Cow::Owned(rewritten) => rewritten,
        Cow::Borrowed(_) => return RewrittenResponse::unchanged(body.clone()),
    };

    debug!(body = %preview(&rewritten), "Rewritten response body (sample)");

    if !gzip_encoded {
        return RewrittenResponse {
            body: Bytes::from(rewritten),
            outcome: ResponseOutcome::Rewritten,
        };
    }

    match gzip(&rewritten) {
        Ok(compressed) => RewrittenResponse {
            body: Bytes::from(compressed),
            outcome: ResponseOutcome::Rewritten,
        },
        Err(e) => {
            warn!(error = %e, "Sending rewritten response body uncompressed");
            RewrittenResponse {
                body: Bytes::from(rewritten),
                outcome: ResponseOutcome::Decoded,
            }
        }
    }
}

/// Lossy UTF-8 preview of the start of a body
pub fn preview(body: &[u8]) -> Cow<'_, str> {
    if body.len() <= PREVIEW_LEN {
        return String::from_utf8_lossy(body);
    }
    Cow::Owned(format!(
        "{}...",
        String::from_utf8_lossy(&body[..PREVIEW_LEN])
    ))
}
