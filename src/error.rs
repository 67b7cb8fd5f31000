use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while loading or validating the monitor configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to parse {key}='{value}': {message}")]
    Env {
        key: String,
        value: String,
        message: String,
    },

    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Why a single probe did not succeed. Carried as data inside a `CheckResult`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("failed to create request for {endpoint}: {message}")]
    Request { endpoint: String, message: String },

    #[error("request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },

    #[error("request to {endpoint} timed out after {timeout:?}")]
    Timeout { endpoint: String, timeout: Duration },

    #[error("request to {endpoint} cancelled by shutdown")]
    Cancelled { endpoint: String },

    #[error("service {endpoint} returned non-success status: {status}")]
    Status { endpoint: String, status: u16 },

    #[error("probe of {endpoint} panicked: {message}")]
    Panicked { endpoint: String, message: String },
}

/// Outcome of racing a future against a `Deadline`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeadlineError {
    #[error("deadline of {0:?} expired")]
    Expired(Duration),

    #[error("cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
}
