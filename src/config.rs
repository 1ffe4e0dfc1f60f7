//! Configuration loading and validation.
//!
//! Targets and tunables come from a YAML file; the file path can be
//! overridden through the environment. The monitoring core assumes the
//! target list it receives here is already well-formed, so validation is
//! strict and fatal at startup.

use crate::monitor::{Method, PipelineConfig, Target};

use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Default config file path, next to the binary's working directory.
pub const DEFAULT_CONFIG_PATH: &str = "pulsewatch.yaml";

const DEFAULT_MAX_BODY_BYTES: u64 = 64 * 1024;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("config: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// HTTP port for the API server.
    pub http_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { http_port: 8080 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitoringConfig {
    pub workers: usize,
    pub jobs_buffer: usize,
    pub results_buffer: usize,
    pub events_buffer: usize,
    pub user_agent: String,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            jobs_buffer: 200,
            results_buffer: 200,
            events_buffer: 50,
            user_agent: "pulsewatch/0.1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "pulsewatch.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotifyConfig {
    /// Webhook to POST transition messages to. Absent disables notification.
    pub webhook_url: Option<String>,
}

/// One target as written in the config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetConfig {
    pub name: String,
    pub url: String,
    /// GET or HEAD.
    pub method: String,
    pub interval_secs: f64,
    pub timeout_secs: f64,
    /// Exact status to require; 0 accepts any 200..400.
    pub expected_status: u16,
    pub contains: Option<String>,
    pub max_body_bytes: u64,
    pub enabled: bool,
    pub tags: Vec<String>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            url: String::new(),
            method: "GET".to_string(),
            interval_secs: 30.0,
            timeout_secs: 5.0,
            expected_status: 200,
            contains: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            enabled: true,
            tags: Vec::new(),
        }
    }
}

impl Config {
    /// Load and validate configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    /// Parse and validate configuration from YAML text.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let cfg: Config = serde_yaml::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Config file path from `PULSEWATCH_CONFIG`, or the default.
    pub fn path_from_env() -> String {
        std::env::var("PULSEWATCH_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.targets.is_empty() {
            return Err(ConfigError::Invalid("no targets provided".to_string()));
        }

        let mut seen = HashSet::with_capacity(self.targets.len());

        for (i, t) in self.targets.iter().enumerate() {
            let name = t.name.trim();
            if name.is_empty() {
                return Err(ConfigError::Invalid(format!("target[{}] missing name", i)));
            }
            if !seen.insert(name.to_string()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate target name {:?}",
                    name
                )));
            }

            let url = t.url.trim();
            if url.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "target {:?} missing url",
                    name
                )));
            }
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::Invalid(format!(
                    "target {:?} url must start with http:// or https://",
                    name
                )));
            }

            let method = t.method.trim().to_uppercase();
            if method != "GET" && method != "HEAD" {
                return Err(ConfigError::Invalid(format!(
                    "target {:?} invalid method {:?} (use GET or HEAD)",
                    name, t.method
                )));
            }

            if t.interval_secs <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "target {:?} interval must be > 0",
                    name
                )));
            }
            if t.timeout_secs <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "target {:?} timeout must be > 0",
                    name
                )));
            }

            if t.expected_status != 0 && !(100..=599).contains(&t.expected_status) {
                return Err(ConfigError::Invalid(format!(
                    "target {:?} expected_status must be 0 or 100..599",
                    name
                )));
            }

            // HEAD responses carry no body; a keyword check can never pass.
            let has_keyword = t
                .contains
                .as_deref()
                .is_some_and(|kw| !kw.trim().is_empty());
            if method == "HEAD" && has_keyword {
                return Err(ConfigError::Invalid(format!(
                    "target {:?} uses method HEAD but has a contains check; use GET instead",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Convert the validated target list into monitoring targets.
    pub fn monitor_targets(&self) -> Vec<Arc<Target>> {
        self.targets
            .iter()
            .map(|t| {
                Arc::new(Target {
                    name: t.name.trim().to_string(),
                    url: t.url.trim().to_string(),
                    method: if t.method.trim().eq_ignore_ascii_case("HEAD") {
                        Method::Head
                    } else {
                        Method::Get
                    },
                    interval: Duration::from_secs_f64(t.interval_secs),
                    timeout: Duration::from_secs_f64(t.timeout_secs),
                    expected_status: t.expected_status,
                    contains: t
                        .contains
                        .as_deref()
                        .map(str::trim)
                        .filter(|kw| !kw.is_empty())
                        .map(str::to_string),
                    max_body_bytes: t.max_body_bytes,
                    enabled: t.enabled,
                    tags: t.tags.clone(),
                })
            })
            .collect()
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            workers: self.monitoring.workers.max(1),
            jobs_buffer: self.monitoring.jobs_buffer.max(1),
            results_buffer: self.monitoring.results_buffer.max(1),
            events_buffer: self.monitoring.events_buffer.max(1),
        }
    }
}
