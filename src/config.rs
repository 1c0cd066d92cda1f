//! Configuration management for prom-relabel-proxy
//!
//! Handles loading and validating the label mapping configuration from YAML files.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use url::Url;

use crate::rewriter::RuleTable;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Error reading the configuration file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Error parsing the configuration file
    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Configuration validation error
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Direction a mapping applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Outgoing queries only
    Query,
    /// Backend results only
    Result,
    /// Both queries and results
    Both,
}

impl Direction {
    /// Returns the configuration spelling of the direction
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Query => "query",
            Direction::Result => "result",
            Direction::Both => "both",
        }
    }

    /// Whether a mapping with this direction contributes to `target`
    pub fn applies_to(&self, target: Direction) -> bool {
        *self == target || *self == Direction::Both
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single label rename
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Label name to look for
    pub source_label: String,

    /// Label name to write instead
    pub target_label: String,
}

impl Rule {
    /// Create a new rule
    pub fn new(source_label: impl Into<String>, target_label: impl Into<String>) -> Self {
        Self {
            source_label: source_label.into(),
            target_label: target_label.into(),
        }
    }
}

/// A group of rules sharing a direction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    /// Which side of the proxy the rules apply to
    pub direction: Direction,

    /// Ordered rules
    #[serde(default)]
    pub rules: Vec<Rule>,
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the Prometheus backend
    #[serde(default)]
    pub target_prometheus: String,

    /// Ordered label mappings
    #[serde(default)]
    pub mappings: Vec<Mapping>,
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    /// A missing file is an error: the proxy has no upstream without one.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_prometheus.is_empty() {
            return Err(ConfigError::ValidationError(
                "target_prometheus is required".to_string(),
            ));
        }

        self.target_url()?;

        for (i, mapping) in self.mappings.iter().enumerate() {
            if mapping.rules.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "no rules defined in mapping {}",
                    i
                )));
            }

            for (j, rule) in mapping.rules.iter().enumerate() {
                if rule.source_label.is_empty() {
                    return Err(ConfigError::ValidationError(format!(
                        "source_label is required in mapping {}, rule {}",
                        i, j
                    )));
                }
                if rule.target_label.is_empty() {
                    return Err(ConfigError::ValidationError(format!(
                        "target_label is required in mapping {}, rule {}",
                        i, j
                    )));
                }
            }
        }

        Ok(())
    }

    /// Parse `target_prometheus` as an absolute http(s) URL
    pub fn target_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.target_prometheus).map_err(|e| {
            ConfigError::ValidationError(format!(
                "target_prometheus '{}' is not a valid URL: {}",
                self.target_prometheus, e
            ))
        })?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ConfigError::ValidationError(format!(
                "target_prometheus must use http or https, got '{}'",
                other
            ))),
        }
    }

    /// Rules for one direction, in mapping order then rule order
    pub fn rules_for(&self, direction: Direction) -> Vec<Rule> {
        self.mappings
            .iter()
            .filter(|m| m.direction.applies_to(direction))
            .flat_map(|m| m.rules.iter().cloned())
            .collect()
    }

    /// Build the resolved rule table for this configuration
    pub fn rule_table(&self, version: u64) -> RuleTable {
        RuleTable::new(
            version,
            self.rules_for(Direction::Query),
            self.rules_for(Direction::Result),
        )
    }
}
