//! prom-relabel-proxy - Prometheus label rewriting reverse proxy
//!
//! This binary forwards Prometheus API traffic to a single backend and
//! rewrites label names in queries and results on the way through.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use prom_relabel_proxy::cli::{Cli, RulesReport};
use prom_relabel_proxy::{config::Config, server};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    let level = cli.effective_log_level();
    prom_relabel_proxy::init_logging(&level.to_string(), cli.log_format)?;

    // Load configuration
    let config = Config::load(&cli.config).with_context(|| {
        format!(
            "Failed to load configuration from {}",
            cli.config.display()
        )
    })?;

    if cli.validate {
        println!("Configuration is valid");
        return Ok(());
    }

    if cli.dry_run {
        let report = RulesReport::from_config(&config);
        print!("{}", report.render(cli.output_format)?);
        return Ok(());
    }

    let listen = server::parse_listen_address(&cli.listen)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        debug = cli.debug,
        "Starting prom-relabel-proxy"
    );

    // Start server
    server::run(config, listen, cli.config).await?;

    Ok(())
}
