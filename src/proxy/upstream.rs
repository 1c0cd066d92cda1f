//! Upstream Prometheus HTTP client
//!
//! Forwards requests to the single configured backend with connection
//! pooling. Redirects are returned to the client as-is and bodies are never
//! decompressed by the client, so content encoding stays visible to the
//! pipeline.

use std::net::IpAddr;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::header::{HeaderName, CONNECTION, CONTENT_LENGTH, HOST};
use axum::http::{HeaderMap, HeaderValue, Method};
use reqwest::{redirect, Client, ClientBuilder};
use tracing::{debug, instrument};
use url::Url;

use crate::error::{ProxyError, ProxyResult};

/// Headers that only describe a single connection
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// HTTP client bound to one upstream base URL
#[derive(Clone)]
pub struct UpstreamClient {
    client: Client,
    base_url: Url,
}

impl UpstreamClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `base_url` - Prometheus base URL (e.g. "http://localhost:9090")
    ///
    /// # Example
    /// ```ignore
    /// let client = UpstreamClient::new(Url::parse("http://localhost:9090")?)?;
    /// ```
    pub fn new(base_url: Url) -> ProxyResult<Self> {
        let client = ClientBuilder::new()
            .redirect(redirect::Policy::none())
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(ProxyError::ClientInit)?;

        Ok(Self { client, base_url })
    }

    /// Upstream base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Upstream URL for a request path and raw query
    ///
    /// The base URL's path is kept as a prefix and joined to `path` with a
    /// single slash.
    pub fn target_url(&self, path: &str, query: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        let joined = join_paths(self.base_url.path(), path);
        url.set_path(&joined);
        url.set_query(query.filter(|q| !q.is_empty()));
        url
    }

    /// Send a request upstream and return the response with its body unread
    #[instrument(skip_all, fields(method = %method, url = %url))]
    pub async fn send(
        &self,
        method: Method,
        url: Url,
        headers: HeaderMap,
        body: Bytes,
    ) -> ProxyResult<reqwest::Response> {
        debug!(body_len = body.len(), "Forwarding request upstream");

        let mut req = self.client.request(method, url).headers(headers);
        if !body.is_empty() {
            req = req.body(body);
        }

        req.send().await.map_err(ProxyError::Upstream)
    }
}

fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) => format!("{}/{}", base, path),
        _ => format!("{}{}", base, path),
    }
}

/// Copy `headers` without hop-by-hop headers
///
/// Headers named by the `Connection` header are dropped as well.
pub fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let listed: Vec<String> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    headers
        .iter()
        .filter(|(name, _)| {
            let name = name.as_str();
            !HOP_BY_HOP.contains(&name) && !listed.iter().any(|l| l == name)
        })
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Headers to send upstream for a client request
///
/// `Host` is set by the client from the upstream URL and `Content-Length`
/// from the body actually sent.
pub fn request_headers(headers: &HeaderMap, client_ip: Option<IpAddr>) -> HeaderMap {
    let mut out = strip_hop_by_hop(headers);
    out.remove(HOST);
    out.remove(CONTENT_LENGTH);

    if let Some(ip) = client_ip {
        let forwarded = match out.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(prior) => format!("{}, {}", prior, ip),
            None => ip.to_string(),
        };
        if let Ok(value) = HeaderValue::from_str(&forwarded) {
            out.insert(HeaderName::from_static(X_FORWARDED_FOR), value);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> UpstreamClient {
        UpstreamClient::new(Url::parse(base).unwrap()).unwrap()
    }

    #[test]
    fn test_target_url_root_base() {
        let client = client("http://localhost:9090");
        let url = client.target_url("/api/v1/query", Some("query=up"));
        assert_eq!(url.as_str(), "http://localhost:9090/api/v1/query?query=up");
    }

    #[test]
    fn test_target_url_keeps_base_prefix() {
        let client = client("http://prom.internal/prometheus/");
        let url = client.target_url("/api/v1/series", None);
        assert_eq!(url.as_str(), "http://prom.internal/prometheus/api/v1/series");

        let client = self::client("http://prom.internal/prometheus");
        let url = client.target_url("/api/v1/series", Some(""));
        assert_eq!(url.as_str(), "http://prom.internal/prometheus/api/v1/series");
    }

    #[test]
    fn test_strip_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive, X-Trace"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-trace", HeaderValue::from_static("1"));
        headers.insert("transfer-encoding", HeaderValue::from_static("chunked"));
        headers.insert("accept-encoding", HeaderValue::from_static("gzip"));

        let out = strip_hop_by_hop(&headers);
        assert_eq!(out.len(), 1);
        assert_eq!(out["accept-encoding"], "gzip");
    }

    #[test]
    fn test_request_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("proxy:8080"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("12"));
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("10.0.0.1"));
        headers.insert("authorization", HeaderValue::from_static("Bearer t"));

        let out = request_headers(&headers, Some("192.168.1.2".parse().unwrap()));
        assert!(out.get(HOST).is_none());
        assert!(out.get(CONTENT_LENGTH).is_none());
        assert_eq!(out[X_FORWARDED_FOR], "10.0.0.1, 192.168.1.2");
        assert_eq!(out["authorization"], "Bearer t");
    }

    #[test]
    fn test_request_headers_without_client_ip() {
        let headers = HeaderMap::new();
        let out = request_headers(&headers, None);
        assert!(out.get(X_FORWARDED_FOR).is_none());
    }
}
