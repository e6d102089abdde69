use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use logflow_core::{RedactionRule, ValidationLimits, Validator};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: {reason}")]
    InvalidEnv { var: String, reason: String },

    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Process configuration, read once at startup.
///
/// Layered as defaults ← TOML file ← environment variables.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub log_format: LogFormat,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub validation: ValidationConfig,

    #[serde(default)]
    pub redaction: RedactionConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_addr")]
    pub addr: String,

    /// Upper bound on waiting for the queue to accept a message
    #[serde(default = "default_publish_timeout_ms")]
    pub publish_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_worker_addr")]
    pub addr: String,

    /// Concurrent processing slots for the pull loop
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Simulated seconds of work per character of text
    #[serde(default = "default_rate_per_char")]
    pub processing_rate_per_char: f64,

    #[serde(default)]
    pub permanent_failure_policy: PermanentFailurePolicy,
}

/// What to do with a message that can never be processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PermanentFailurePolicy {
    /// Acknowledge with an error log only
    Drop,
    /// Acknowledge and keep the raw payload in the dead-letter partition
    #[default]
    DeadLetter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_topic")]
    pub topic: String,

    #[serde(default = "default_subscription")]
    pub subscription: String,

    #[serde(default = "default_redelivery_delay_ms")]
    pub redelivery_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// `sqlite://<path>` or `memory://`
    #[serde(default = "default_store_url")]
    pub url: String,

    #[serde(default = "default_tenants_collection")]
    pub tenants_collection: String,

    #[serde(default = "default_logs_collection")]
    pub logs_collection: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "default_min_text_length")]
    pub min_text_length: usize,

    #[serde(default = "default_max_text_length")]
    pub max_text_length: usize,

    #[serde(default = "default_max_tenant_id_length")]
    pub max_tenant_id_length: usize,

    #[serde(default = "default_max_log_id_length")]
    pub max_log_id_length: usize,

    #[serde(default = "default_tenant_id_pattern")]
    pub tenant_id_pattern: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedactionConfig {
    #[serde(default = "RedactionRule::defaults")]
    pub patterns: Vec<RedactionRule>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            addr: default_gateway_addr(),
            publish_timeout_ms: default_publish_timeout_ms(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            addr: default_worker_addr(),
            concurrency: default_concurrency(),
            processing_rate_per_char: default_rate_per_char(),
            permanent_failure_policy: PermanentFailurePolicy::default(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            topic: default_topic(),
            subscription: default_subscription(),
            redelivery_delay_ms: default_redelivery_delay_ms(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
            tenants_collection: default_tenants_collection(),
            logs_collection: default_logs_collection(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_text_length: default_min_text_length(),
            max_text_length: default_max_text_length(),
            max_tenant_id_length: default_max_tenant_id_length(),
            max_log_id_length: default_max_log_id_length(),
            tenant_id_pattern: default_tenant_id_pattern(),
        }
    }
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            patterns: RedactionRule::defaults(),
        }
    }
}

fn default_gateway_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_worker_addr() -> String {
    "0.0.0.0:8081".to_string()
}

fn default_publish_timeout_ms() -> u64 {
    10_000
}

fn default_concurrency() -> usize {
    4
}

fn default_rate_per_char() -> f64 {
    0.05
}

fn default_topic() -> String {
    "log-ingestion".to_string()
}

fn default_subscription() -> String {
    "log-ingestion-worker".to_string()
}

fn default_redelivery_delay_ms() -> u64 {
    1_000
}

fn default_store_url() -> String {
    "sqlite://logflow.db".to_string()
}

fn default_tenants_collection() -> String {
    "tenants".to_string()
}

fn default_logs_collection() -> String {
    "processed_logs".to_string()
}

fn default_min_text_length() -> usize {
    1
}

fn default_max_text_length() -> usize {
    10_000
}

fn default_max_tenant_id_length() -> usize {
    64
}

fn default_max_log_id_length() -> usize {
    128
}

fn default_tenant_id_pattern() -> String {
    "[A-Za-z0-9_-]+".to_string()
}

impl Config {
    /// Load from `path` (or the default location if it exists), apply
    /// environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Self::config_path();
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    Config::default()
                }
            }
        };

        config.apply_env(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Get config file path
    pub fn config_path() -> PathBuf {
        if let Some(dirs) = directories::ProjectDirs::from("dev", "logflow", "logflow") {
            dirs.config_dir().join("config.toml")
        } else {
            PathBuf::from("logflow.toml")
        }
    }

    /// Override fields from environment-style variables looked up through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("QUEUE_TOPIC") {
            self.queue.topic = v;
        }
        if let Some(v) = lookup("QUEUE_SUBSCRIPTION") {
            self.queue.subscription = v;
        }
        if let Some(v) = lookup("REDELIVERY_DELAY_MS") {
            self.queue.redelivery_delay_ms = parse_env("REDELIVERY_DELAY_MS", &v)?;
        }
        if let Some(v) = lookup("STORE_URL") {
            self.store.url = v;
        }
        if let Some(v) = lookup("TENANTS_COLLECTION") {
            self.store.tenants_collection = v;
        }
        if let Some(v) = lookup("LOGS_COLLECTION") {
            self.store.logs_collection = v;
        }
        if let Some(v) = lookup("MIN_TEXT_LENGTH") {
            self.validation.min_text_length = parse_env("MIN_TEXT_LENGTH", &v)?;
        }
        if let Some(v) = lookup("MAX_TEXT_LENGTH") {
            self.validation.max_text_length = parse_env("MAX_TEXT_LENGTH", &v)?;
        }
        if let Some(v) = lookup("MAX_TENANT_ID_LENGTH") {
            self.validation.max_tenant_id_length = parse_env("MAX_TENANT_ID_LENGTH", &v)?;
        }
        if let Some(v) = lookup("MAX_LOG_ID_LENGTH") {
            self.validation.max_log_id_length = parse_env("MAX_LOG_ID_LENGTH", &v)?;
        }
        if let Some(v) = lookup("TENANT_ID_PATTERN") {
            self.validation.tenant_id_pattern = v;
        }
        if let Some(v) = lookup("PROCESSING_RATE_PER_CHAR") {
            self.worker.processing_rate_per_char = parse_env("PROCESSING_RATE_PER_CHAR", &v)?;
        }
        if let Some(v) = lookup("WORKER_CONCURRENCY") {
            self.worker.concurrency = parse_env("WORKER_CONCURRENCY", &v)?;
        }
        if let Some(v) = lookup("PERMANENT_FAILURE_POLICY") {
            self.worker.permanent_failure_policy = match v.as_str() {
                "drop" => PermanentFailurePolicy::Drop,
                "dead_letter" => PermanentFailurePolicy::DeadLetter,
                other => {
                    return Err(ConfigError::InvalidEnv {
                        var: "PERMANENT_FAILURE_POLICY".to_string(),
                        reason: format!("expected drop or dead_letter, got {other}"),
                    });
                }
            };
        }
        if let Some(v) = lookup("REDACTION_PATTERNS") {
            self.redaction.patterns =
                serde_json::from_str(&v).map_err(|e| ConfigError::InvalidEnv {
                    var: "REDACTION_PATTERNS".to_string(),
                    reason: e.to_string(),
                })?;
        }
        if let Some(v) = lookup("GATEWAY_ADDR") {
            self.gateway.addr = v;
        }
        if let Some(v) = lookup("PUBLISH_TIMEOUT_MS") {
            self.gateway.publish_timeout_ms = parse_env("PUBLISH_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("WORKER_ADDR") {
            self.worker.addr = v;
        }
        if let Some(v) = lookup("LOG_FORMAT") {
            self.log_format = match v.as_str() {
                "text" => LogFormat::Text,
                "json" => LogFormat::Json,
                other => {
                    return Err(ConfigError::InvalidEnv {
                        var: "LOG_FORMAT".to_string(),
                        reason: format!("expected text or json, got {other}"),
                    });
                }
            };
        }

        Ok(())
    }

    /// Reject configurations the services cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue.topic.trim().is_empty() {
            return Err(ConfigError::Missing("QUEUE_TOPIC"));
        }
        if self.queue.subscription.trim().is_empty() {
            return Err(ConfigError::Missing("QUEUE_SUBSCRIPTION"));
        }
        if self.store.url.trim().is_empty() {
            return Err(ConfigError::Missing("STORE_URL"));
        }
        if self.store.tenants_collection.is_empty() || self.store.logs_collection.is_empty() {
            return Err(ConfigError::Invalid(
                "collection names must not be empty".to_string(),
            ));
        }

        let v = &self.validation;
        if v.max_text_length == 0 || v.max_tenant_id_length == 0 || v.max_log_id_length == 0 {
            return Err(ConfigError::Invalid(
                "length limits must be greater than zero".to_string(),
            ));
        }
        if v.min_text_length > v.max_text_length {
            return Err(ConfigError::Invalid(format!(
                "MIN_TEXT_LENGTH ({}) exceeds MAX_TEXT_LENGTH ({})",
                v.min_text_length, v.max_text_length
            )));
        }
        Validator::new(self.validation_limits())
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let rate = self.worker.processing_rate_per_char;
        if !rate.is_finite() || rate < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "PROCESSING_RATE_PER_CHAR must be a non-negative number, got {rate}"
            )));
        }
        // The longest accepted text must still map to a representable delay
        let longest = v.max_text_length as f64 * rate;
        if std::time::Duration::try_from_secs_f64(longest).is_err() {
            return Err(ConfigError::Invalid(format!(
                "PROCESSING_RATE_PER_CHAR ({rate}) times MAX_TEXT_LENGTH ({}) overflows the processing delay",
                v.max_text_length
            )));
        }
        if self.worker.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "WORKER_CONCURRENCY must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    pub fn validation_limits(&self) -> ValidationLimits {
        ValidationLimits {
            min_text_length: self.validation.min_text_length,
            max_text_length: self.validation.max_text_length,
            max_tenant_id_length: self.validation.max_tenant_id_length,
            max_log_id_length: self.validation.max_log_id_length,
            tenant_id_pattern: self.validation.tenant_id_pattern.clone(),
        }
    }
}

fn parse_env<T>(var: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidEnv {
        var: var.to_string(),
        reason: e.to_string(),
    })
}
