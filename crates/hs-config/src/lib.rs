//! HttpSink configuration
//!
//! Configuration is read from an optional TOML file, then overridden by
//! `HS_*` environment variables, then validated. Every field has a default.

use std::path::Path;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

mod http;

pub use http::{AuthScheme, HttpClientSettings, ProxySettings, ProxyType, RealmSettings};

pub const DEFAULT_QUEUE_NAME: &str = "default";
pub const DEFAULT_SUCCESS_PATTERN: &str = "^[1-4][0-9][0-9]$";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value '{value}' for {var}")]
    Env { var: String, value: String },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

// ============================================================================
// Configuration Types
// ============================================================================

/// Default retry policy applied to every call unless the request overrides it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub retries: u32,
    pub retry_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub retry_delay_factor: f64,
    pub retry_jitter_ms: u64,
    /// Regex over the three-digit status code; a match means "done, no retry"
    pub success_pattern: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            retry_delay_ms: 500,
            retry_max_delay_ms: 300_000,
            retry_delay_factor: 2.0,
            retry_jitter_ms: 100,
            success_pattern: DEFAULT_SUCCESS_PATTERN.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkTaskSettings {
    /// Headers added to every request that does not already carry them
    pub static_request_headers: IndexMap<String, String>,
    pub publish_to_in_memory_queue: bool,
    pub queue_name: String,
    /// Maximum calls in flight per batch of records
    pub concurrency: usize,
    pub require_correlation_id: bool,
    pub generate_missing_ids: bool,
}

impl Default for SinkTaskSettings {
    fn default() -> Self {
        Self {
            static_request_headers: IndexMap::new(),
            publish_to_in_memory_queue: false,
            queue_name: DEFAULT_QUEUE_NAME.to_string(),
            concurrency: 10,
            require_correlation_id: false,
            generate_missing_ids: true,
        }
    }
}

/// Shape of the outbound record value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceRecordFormat {
    /// Structured exchange record with nested request and response
    #[default]
    Exchange,
    /// Flattened acknowledgement keyed by correlation id
    Acknowledgement,
}

impl FromStr for SourceRecordFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EXCHANGE" => Ok(SourceRecordFormat::Exchange),
            "ACKNOWLEDGEMENT" => Ok(SourceRecordFormat::Acknowledgement),
            _ => Err(ConfigError::Invalid(format!("unknown record format '{}'", s))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceTaskSettings {
    pub enabled: bool,
    pub queue_name: String,
    pub success_topic: String,
    pub errors_topic: String,
    pub poll_batch_size: usize,
    pub record_format: SourceRecordFormat,
}

impl Default for SourceTaskSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            queue_name: DEFAULT_QUEUE_NAME.to_string(),
            success_topic: String::new(),
            errors_topic: String::new(),
            poll_batch_size: 100,
            record_format: SourceRecordFormat::Exchange,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub retry: RetryConfig,
    pub http: HttpClientSettings,
    pub sink: SinkTaskSettings,
    pub source: SourceTaskSettings,
}

impl SinkConfig {
    /// Load from an optional file, apply environment overrides, validate
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                info!(path = %path.display(), "Loading configuration file");
                Self::from_file(path)?
            }
            None => {
                debug!("No configuration file, using defaults");
                Self::default()
            }
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `HS_*` overrides from a variable lookup (the process environment in `load`)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        override_with(&lookup, "HS_RETRIES", &mut self.retry.retries)?;
        override_with(&lookup, "HS_RETRY_DELAY_MS", &mut self.retry.retry_delay_ms)?;
        override_with(&lookup, "HS_RETRY_MAX_DELAY_MS", &mut self.retry.retry_max_delay_ms)?;
        override_with(&lookup, "HS_RETRY_DELAY_FACTOR", &mut self.retry.retry_delay_factor)?;
        override_with(&lookup, "HS_RETRY_JITTER_MS", &mut self.retry.retry_jitter_ms)?;
        override_with(&lookup, "HS_SUCCESS_PATTERN", &mut self.retry.success_pattern)?;
        override_with(&lookup, "HS_CONNECT_TIMEOUT_MS", &mut self.http.connect_timeout_ms)?;
        override_with(&lookup, "HS_REQUEST_TIMEOUT_MS", &mut self.http.request_timeout_ms)?;
        override_with(&lookup, "HS_PUBLISH_TO_IN_MEMORY_QUEUE", &mut self.sink.publish_to_in_memory_queue)?;
        override_with(&lookup, "HS_CONCURRENCY", &mut self.sink.concurrency)?;
        override_with(&lookup, "HS_SOURCE_ENABLED", &mut self.source.enabled)?;
        override_with(&lookup, "HS_SUCCESS_TOPIC", &mut self.source.success_topic)?;
        override_with(&lookup, "HS_ERRORS_TOPIC", &mut self.source.errors_topic)?;
        override_with(&lookup, "HS_SOURCE_RECORD_FORMAT", &mut self.source.record_format)?;

        // one queue name feeds both sides
        if let Some(name) = lookup("HS_QUEUE_NAME") {
            self.sink.queue_name = name.clone();
            self.source.queue_name = name;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.retry.retry_delay_factor <= 0.0 || !self.retry.retry_delay_factor.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "retry_delay_factor must be positive, got {}",
                self.retry.retry_delay_factor
            )));
        }
        if let Err(e) = regex::Regex::new(&self.retry.success_pattern) {
            return Err(ConfigError::Invalid(format!(
                "success_pattern '{}' is not a valid regex: {}",
                self.retry.success_pattern, e
            )));
        }
        if self.sink.concurrency == 0 {
            return Err(ConfigError::Invalid("sink.concurrency must be at least 1".to_string()));
        }
        if self.sink.publish_to_in_memory_queue && self.sink.queue_name.is_empty() {
            return Err(ConfigError::Invalid("sink.queue_name cannot be empty".to_string()));
        }
        if let Some(proxy) = &self.http.proxy {
            if proxy.host.is_empty() || proxy.port == 0 {
                return Err(ConfigError::Invalid("http.proxy requires a host and a port".to_string()));
            }
        }
        if self.source.enabled {
            if self.source.queue_name.is_empty() {
                return Err(ConfigError::Invalid("source.queue_name cannot be empty".to_string()));
            }
            if self.source.success_topic.is_empty() || self.source.errors_topic.is_empty() {
                return Err(ConfigError::Invalid(
                    "source.success_topic and source.errors_topic are required".to_string(),
                ));
            }
            if self.source.poll_batch_size == 0 {
                return Err(ConfigError::Invalid("source.poll_batch_size must be at least 1".to_string()));
            }
        }
        Ok(())
    }
}

fn override_with<T, F>(lookup: &F, var: &str, target: &mut T) -> Result<()>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(var) {
        *target = value.trim().parse().map_err(|_| ConfigError::Env {
            var: var.to_string(),
            value,
        })?;
    }
    Ok(())
}
