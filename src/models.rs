use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::ProbeError;

/// A monitored target, identified by its URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint(Arc<str>);

impl Endpoint {
    pub fn new(url: impl AsRef<str>) -> Self {
        Self(Arc::from(url.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Endpoint {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

impl From<String> for Endpoint {
    fn from(url: String) -> Self {
        Self(Arc::from(url))
    }
}

/// A scheduled request to probe one endpoint.
#[derive(Debug, Clone)]
pub struct Job {
    pub endpoint: Endpoint,
    pub queued_at: Instant,
}

impl Job {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            queued_at: Instant::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Up,
    Down,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Up => f.write_str("UP"),
            Status::Down => f.write_str("DOWN"),
        }
    }
}

/// A change of status between two consecutive results for the same endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Recovered,
    NewlyDown,
}

impl Transition {
    /// No previous result, or an unchanged status, yields no transition.
    pub fn between(previous: Option<&CheckResult>, current: &CheckResult) -> Option<Self> {
        match (previous.map(CheckResult::status), current.status()) {
            (Some(Status::Down), Status::Up) => Some(Transition::Recovered),
            (Some(Status::Up), Status::Down) => Some(Transition::NewlyDown),
            _ => None,
        }
    }
}

pub type Metrics = BTreeMap<String, serde_json::Value>;

/// Outcome of one completed, failed or timed-out probe.
///
/// `duration` is `None` when the probe never reached the network, e.g. when
/// the request could not be built.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub endpoint: Endpoint,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub duration: Option<Duration>,
    pub error: Option<ProbeError>,
    pub metrics: Metrics,
}

impl CheckResult {
    pub fn up(endpoint: Endpoint, duration: Duration) -> Self {
        Self {
            endpoint,
            timestamp: Utc::now(),
            success: true,
            duration: Some(duration),
            error: None,
            metrics: Metrics::new(),
        }
    }

    pub fn down(endpoint: Endpoint, duration: Option<Duration>, error: ProbeError) -> Self {
        Self {
            endpoint,
            timestamp: Utc::now(),
            success: false,
            duration,
            error: Some(error),
            metrics: Metrics::new(),
        }
    }

    pub fn with_metric(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metrics.insert(key.to_string(), value.into());
        self
    }

    pub fn status(&self) -> Status {
        if self.success {
            Status::Up
        } else {
            Status::Down
        }
    }

    pub fn latency_ms(&self) -> Option<f64> {
        self.duration.map(|d| d.as_secs_f64() * 1000.0)
    }

    /// Only successful responses can be slow; failures are reported as down.
    pub fn is_slow(&self, threshold_ms: u64) -> bool {
        self.success
            && self
                .duration
                .is_some_and(|d| d.as_millis() > u128::from(threshold_ms))
    }
}
