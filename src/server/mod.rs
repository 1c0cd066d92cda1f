//! HTTP server module
//!
//! Provides the Axum-based proxy server, configuration reload and graceful
//! shutdown.

pub mod handlers;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::{Config, ConfigError};
use crate::proxy::UpstreamClient;
use crate::rewriter::SharedRuleTable;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Current label rules
    pub rules: SharedRuleTable,
    /// Prometheus backend client
    pub upstream: Arc<UpstreamClient>,
}

impl AppState {
    /// Build the state for a validated configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let upstream = UpstreamClient::new(config.target_url()?)?;
        Ok(Self {
            rules: SharedRuleTable::new(config.rule_table(1)),
            upstream: Arc::new(upstream),
        })
    }
}

/// Build the proxy router
///
/// Every method and path is forwarded; there are no local routes that could
/// shadow a backend endpoint.
pub fn router(state: AppState) -> Router {
    Router::new()
        .fallback(handlers::proxy)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Parse a listen address
///
/// Accepts `host:port`, `:port` (all interfaces) and `localhost:port`.
pub fn parse_listen_address(listen: &str) -> Result<SocketAddr> {
    if let Some(port) = listen.strip_prefix(':') {
        let port: u16 = port
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid listen port '{}': {}", port, e))?;
        return Ok(SocketAddr::from((IpAddr::V4(Ipv4Addr::UNSPECIFIED), port)));
    }

    if let Some(port) = listen.strip_prefix("localhost:") {
        let port: u16 = port
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid listen port '{}': {}", port, e))?;
        return Ok(SocketAddr::from((IpAddr::V4(Ipv4Addr::LOCALHOST), port)));
    }

    listen.parse().map_err(|e| {
        anyhow::anyhow!(
            "Invalid listen address '{}': {}. Use ':8080', 'localhost:8080' or an IP:port pair.",
            listen,
            e
        )
    })
}

/// Reload the rule table from `path`
///
/// On success the new table is published with the next version and that
/// version is returned. On failure the current table stays active.
pub fn reload_rules(
    path: &Path,
    rules: &SharedRuleTable,
    upstream: &UpstreamClient,
) -> Result<u64, ConfigError> {
    let config = Config::load(path)?;

    if config.target_url()? != *upstream.base_url() {
        warn!(
            current = %upstream.base_url(),
            configured = %config.target_prometheus,
            "target_prometheus changed; restart to apply"
        );
    }

    let version = rules.snapshot().version() + 1;
    rules.replace(config.rule_table(version));
    Ok(version)
}

/// Run the proxy server
///
/// # Arguments
/// * `config` - Validated configuration
/// * `listen` - Address to bind to
/// * `config_path` - File re-read on SIGHUP
///
/// # Errors
/// Returns an error if the server fails to start
pub async fn run(config: Config, listen: SocketAddr, config_path: PathBuf) -> Result<()> {
    let state = AppState::from_config(&config)?;

    #[cfg(unix)]
    tokio::spawn(watch_reload(
        config_path,
        state.rules.clone(),
        Arc::clone(&state.upstream),
    ));
    #[cfg(not(unix))]
    let _ = config_path;

    let app = router(state);

    info!(
        address = %listen,
        upstream = %config.target_prometheus,
        "Starting Prometheus label rewriting proxy"
    );

    let listener = tokio::net::TcpListener::bind(listen).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Reload the configuration every time SIGHUP arrives
#[cfg(unix)]
async fn watch_reload(path: PathBuf, rules: SharedRuleTable, upstream: Arc<UpstreamClient>) {
    let mut hangup = match signal::unix::signal(signal::unix::SignalKind::hangup()) {
        Ok(stream) => stream,
        Err(e) => {
            warn!(error = %e, "Failed to install SIGHUP handler; reload disabled");
            return;
        }
    };

    while hangup.recv().await.is_some() {
        match reload_rules(&path, &rules, &upstream) {
            Ok(version) => info!(path = %path.display(), version, "Configuration reloaded"),
            Err(e) => error!(
                path = %path.display(),
                error = %e,
                "Configuration reload failed; keeping current rules"
            ),
        }
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        }
    }
}
