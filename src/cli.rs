//! CLI argument parsing for prom-relabel-proxy
//!
//! This module provides the command-line interface using clap derive macros.
//!
//! # Options
//!
//! - `--config` / `-c`: Configuration file path (default: configs/config.yaml, env: PROM_RELABEL_CONFIG)
//! - `--listen`: Listen address (default: :8080, env: PROM_RELABEL_LISTEN)
//! - `--debug`: Shorthand for `--log-level debug`
//! - `--log-level` / `-l`: Log level (trace/debug/info/warn/error, env: PROM_RELABEL_LOG_LEVEL)
//! - `--log-format`: Log output format (text/json, env: PROM_RELABEL_LOG_FORMAT)
//! - `--validate`: Validate configuration without starting the proxy
//! - `--dry-run`: Show the resolved rule tables
//! - `--output-format`: Output format for dry-run (text/json/yaml)

use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::PathBuf;

use crate::config::{Config, Direction, Rule};

/// prom-relabel-proxy - Prometheus label rewriting reverse proxy
///
/// Rewrites label names in PromQL queries sent to Prometheus and in the
/// JSON results returned by it.
#[derive(Parser, Debug)]
#[command(name = "prom-relabel-proxy")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "configs/config.yaml",
        env = "PROM_RELABEL_CONFIG"
    )]
    pub config: PathBuf,

    /// Address to listen on (":8080", "localhost:8080" or "IP:PORT")
    #[arg(
        long,
        value_name = "ADDRESS",
        default_value = ":8080",
        env = "PROM_RELABEL_LISTEN"
    )]
    pub listen: String,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Log level
    #[arg(
        short,
        long,
        value_enum,
        default_value = "info",
        env = "PROM_RELABEL_LOG_LEVEL"
    )]
    pub log_level: LogLevel,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "text",
        env = "PROM_RELABEL_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    /// Validate configuration without starting the proxy
    #[arg(long)]
    pub validate: bool,

    /// Show the resolved rule tables and exit
    #[arg(long)]
    pub dry_run: bool,

    /// Output format for --dry-run
    #[arg(long, value_enum, default_value = "text")]
    pub output_format: OutputFormat,
}

impl Cli {
    /// Effective log level, with `--debug` taking precedence
    pub fn effective_log_level(&self) -> LogLevel {
        if self.debug {
            LogLevel::Debug
        } else {
            self.log_level
        }
    }
}

/// Log level options
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// Trace level - most verbose
    Trace,
    /// Debug level
    Debug,
    /// Info level - default
    Info,
    /// Warn level
    Warn,
    /// Error level - least verbose
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Log output format
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per event
    Json,
}

/// Output format options for dry-run mode
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output
    Json,
    /// YAML output
    Yaml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Yaml => write!(f, "yaml"),
        }
    }
}

/// Resolved view of a configuration, as printed by `--dry-run`
#[derive(Debug, Serialize)]
pub struct RulesReport {
    /// Upstream base URL
    pub target_prometheus: String,
    /// Rules applied to outgoing queries
    pub query_rules: Vec<Rule>,
    /// Rules applied to backend results
    pub result_rules: Vec<Rule>,
}

impl RulesReport {
    /// Resolve the rule tables of `config`
    pub fn from_config(config: &Config) -> Self {
        Self {
            target_prometheus: config.target_prometheus.clone(),
            query_rules: config.rules_for(Direction::Query),
            result_rules: config.rules_for(Direction::Result),
        }
    }

    /// Render the report in the requested format
    pub fn render(&self, format: OutputFormat) -> anyhow::Result<String> {
        match format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(self)?),
            OutputFormat::Yaml => Ok(serde_yaml::to_string(self)?),
            OutputFormat::Text => {
                let mut out = String::new();
                writeln!(out, "Target: {}", self.target_prometheus)?;
                for (title, rules) in [
                    ("Query rules", &self.query_rules),
                    ("Result rules", &self.result_rules),
                ] {
                    writeln!(out, "{} ({}):", title, rules.len())?;
                    for rule in rules.iter() {
                        writeln!(out, "  {} -> {}", rule.source_label, rule.target_label)?;
                    }
                }
                Ok(out)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_display() {
        assert_eq!(LogLevel::Trace.to_string(), "trace");
        assert_eq!(LogLevel::Debug.to_string(), "debug");
        assert_eq!(LogLevel::Info.to_string(), "info");
        assert_eq!(LogLevel::Warn.to_string(), "warn");
        assert_eq!(LogLevel::Error.to_string(), "error");
    }

    #[test]
    fn test_output_format_display() {
        assert_eq!(OutputFormat::Text.to_string(), "text");
        assert_eq!(OutputFormat::Json.to_string(), "json");
        assert_eq!(OutputFormat::Yaml.to_string(), "yaml");
    }

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::parse_from(["prom-relabel-proxy"]);
        assert_eq!(cli.config, PathBuf::from("configs/config.yaml"));
        assert_eq!(cli.listen, ":8080");
        assert!(!cli.debug);
        assert!(!cli.validate);
        assert!(!cli.dry_run);
        assert_eq!(cli.log_level, LogLevel::Info);
        assert_eq!(cli.log_format, LogFormat::Text);
        assert_eq!(cli.output_format, OutputFormat::Text);
    }

    #[test]
    fn test_cli_with_options() {
        let cli = Cli::parse_from([
            "prom-relabel-proxy",
            "-c",
            "custom.yaml",
            "--listen",
            "127.0.0.1:9000",
            "--log-level",
            "warn",
            "--log-format",
            "json",
            "--validate",
        ]);
        assert_eq!(cli.config, PathBuf::from("custom.yaml"));
        assert_eq!(cli.listen, "127.0.0.1:9000");
        assert_eq!(cli.log_level, LogLevel::Warn);
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(cli.validate);
    }

    #[test]
    fn test_debug_overrides_log_level() {
        let cli = Cli::parse_from(["prom-relabel-proxy", "--debug", "-l", "error"]);
        assert_eq!(cli.effective_log_level(), LogLevel::Debug);

        let cli = Cli::parse_from(["prom-relabel-proxy", "-l", "error"]);
        assert_eq!(cli.effective_log_level(), LogLevel::Error);
    }

    #[test]
    fn test_cli_dry_run() {
        let cli = Cli::parse_from(["prom-relabel-proxy", "--dry-run", "--output-format", "yaml"]);
        assert!(cli.dry_run);
        assert_eq!(cli.output_format, OutputFormat::Yaml);
    }

    fn report() -> RulesReport {
        let config = Config::from_yaml(
            r#"
target_prometheus: "http://localhost:9090"
mappings:
  - direction: query
    rules:
      - source_label: instance
        target_label: host
  - direction: result
    rules:
      - source_label: host
        target_label: instance
"#,
        )
        .unwrap();
        RulesReport::from_config(&config)
    }

    #[test]
    fn test_report_text() {
        let out = report().render(OutputFormat::Text).unwrap();
        assert_eq!(
            out,
            "Target: http://localhost:9090\n\
             Query rules (1):\n  instance -> host\n\
             Result rules (1):\n  host -> instance\n"
        );
    }

    #[test]
    fn test_report_json() {
        let out = report().render(OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["query_rules"][0]["source_label"], "instance");
        assert_eq!(value["result_rules"][0]["target_label"], "instance");
    }
}
