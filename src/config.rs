use serde::{Deserialize, Deserializer};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::ConfigError;
use crate::models::Endpoint;
use crate::utils::parse_duration;

pub const ENV_URLS: &str = "HEALTH_MONITOR_URLS";
pub const ENV_INTERVAL: &str = "HEALTH_MONITOR_INTERVAL";
pub const ENV_TIMEOUT: &str = "HEALTH_MONITOR_TIMEOUT";
pub const ENV_SLOW_THRESHOLD: &str = "HEALTH_MONITOR_SLOW_THRESHOLD";
pub const ENV_WORKERS: &str = "HEALTH_MONITOR_WORKERS";
pub const ENV_QUEUE_CAPACITY: &str = "HEALTH_MONITOR_QUEUE_CAPACITY";

pub const MAX_CHECK_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
pub const MAX_TIMEOUT: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    pub urls: Vec<String>,
    #[serde(alias = "checkIntervalSeconds", deserialize_with = "deserialize_duration")]
    pub check_interval: Duration,
    #[serde(alias = "timeoutSeconds", deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
    #[serde(alias = "slowThresholdMs")]
    pub slow_threshold_ms: u64,
    pub workers: usize,
    pub queue_capacity: usize,
}

fn default_urls() -> Vec<String> {
    vec!["https://example.com".into(), "https://google.com".into()]
}
fn default_check_interval() -> Duration { Duration::from_secs(30) }
fn default_timeout() -> Duration { Duration::from_secs(5) }
fn default_slow_threshold_ms() -> u64 { 500 }
fn default_workers() -> usize { 5 }
fn default_queue_capacity() -> usize { 100 }

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            urls: default_urls(),
            check_interval: default_check_interval(),
            timeout: default_timeout(),
            slow_threshold_ms: default_slow_threshold_ms(),
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Integer seconds or a duration string such as "500ms".
#[derive(Deserialize)]
#[serde(untagged)]
enum DurationRepr {
    Secs(u64),
    Text(String),
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    match DurationRepr::deserialize(deserializer)? {
        DurationRepr::Secs(secs) => Ok(Duration::from_secs(secs)),
        DurationRepr::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
    }
}

impl MonitorConfig {
    /// Defaults, then the optional JSON file, then `HEALTH_MONITOR_*` variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    pub fn load_with<F>(path: Option<&Path>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_env<F>(&mut self, env: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(urls) = env(ENV_URLS).filter(|v| !v.trim().is_empty()) {
            self.urls = urls
                .split(',')
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(value) = env(ENV_INTERVAL) {
            self.check_interval = env_duration(ENV_INTERVAL, &value)?;
        }
        if let Some(value) = env(ENV_TIMEOUT) {
            self.timeout = env_duration(ENV_TIMEOUT, &value)?;
        }
        if let Some(value) = env(ENV_SLOW_THRESHOLD) {
            self.slow_threshold_ms = env_duration(ENV_SLOW_THRESHOLD, &value)?.as_millis() as u64;
        }
        if let Some(value) = env(ENV_WORKERS) {
            self.workers = env_usize(ENV_WORKERS, &value)?;
        }
        if let Some(value) = env(ENV_QUEUE_CAPACITY) {
            self.queue_capacity = env_usize(ENV_QUEUE_CAPACITY, &value)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.check_interval.is_zero() {
            return Err(invalid("check_interval", "must be greater than zero"));
        }
        if self.check_interval > MAX_CHECK_INTERVAL {
            return Err(invalid("check_interval", "must not exceed 24h"));
        }
        if self.timeout.is_zero() {
            return Err(invalid("timeout", "must be greater than zero"));
        }
        if self.timeout > MAX_TIMEOUT {
            return Err(invalid("timeout", "must not exceed 1h"));
        }
        if self.workers == 0 {
            return Err(invalid("workers", "at least one worker is required"));
        }
        if self.queue_capacity == 0 {
            return Err(invalid("queue_capacity", "must be greater than zero"));
        }
        Ok(())
    }

    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.urls.iter().map(Endpoint::new).collect()
    }

    pub fn log_summary(&self) {
        info!("Configuration loaded:");
        info!("  Endpoints: {}", self.urls.len());
        for url in &self.urls {
            info!("    - {}", url);
        }
        info!("  Interval: {:?}", self.check_interval);
        info!("  Timeout: {:?}", self.timeout);
        info!("  Slow threshold: {}ms", self.slow_threshold_ms);
        info!("  Workers: {}", self.workers);
        info!("  Queue capacity: {}", self.queue_capacity);
    }
}

fn invalid(key: &'static str, message: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        message: message.to_string(),
    }
}

fn env_duration(key: &str, value: &str) -> Result<Duration, ConfigError> {
    parse_duration(value).map_err(|e| ConfigError::Env {
        key: key.to_string(),
        value: value.to_string(),
        message: e.to_string(),
    })
}

fn env_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse().map_err(|e: std::num::ParseIntError| ConfigError::Env {
        key: key.to_string(),
        value: value.to_string(),
        message: e.to_string(),
    })
}
