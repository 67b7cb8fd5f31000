use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{error, warn};

use crate::models::{CheckResult, Endpoint, Transition};
use crate::report::Reporter;

/// Process-wide check statistics and the last processed result per endpoint.
///
/// Counters are independent atomics: a concurrent reader can observe `total`
/// already incremented while `success` or `failure` is not yet. Once every
/// `process` call has returned, `total == success + failure`.
#[derive(Debug, Default)]
pub struct Aggregator {
    total: AtomicU64,
    success: AtomicU64,
    failure: AtomicU64,
    timed: AtomicU64,
    total_latency_us: AtomicU64,
    last_results: RwLock<HashMap<Endpoint, CheckResult>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counters {
    pub total: u64,
    pub success: u64,
    pub failure: u64,
}

impl Counters {
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.success as f64 / self.total as f64 * 100.0
        }
    }
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts the result, reports it against the stored predecessor, then
    /// stores it as the endpoint's latest. Reporting errors are logged only.
    pub fn process(&self, result: CheckResult, reporter: &dyn Reporter) -> Option<Transition> {
        self.total.fetch_add(1, Ordering::SeqCst);
        if result.success {
            self.success.fetch_add(1, Ordering::SeqCst);
        } else {
            self.failure.fetch_add(1, Ordering::SeqCst);
        }
        if let Some(duration) = result.duration {
            self.timed.fetch_add(1, Ordering::Relaxed);
            self.total_latency_us
                .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        }

        let previous = self.last_result(&result.endpoint);

        if let Err(e) = reporter.report(&result, previous.as_ref()) {
            warn!(endpoint = %result.endpoint, error = %e, "Failed to report check result");
        }

        let transition = Transition::between(previous.as_ref(), &result);
        match transition {
            Some(Transition::NewlyDown) => {
                error!(endpoint = %result.endpoint, "[CHANGE] {} -> DOWN", result.endpoint)
            }
            Some(Transition::Recovered) => {
                warn!(endpoint = %result.endpoint, "[CHANGE] {} -> UP", result.endpoint)
            }
            None => {}
        }

        self.last_results
            .write()
            .insert(result.endpoint.clone(), result);

        transition
    }

    /// Outcomes are loaded before `total`, so a snapshot taken while
    /// `process` runs elsewhere satisfies `total >= success + failure`.
    pub fn counters(&self) -> Counters {
        let success = self.success.load(Ordering::SeqCst);
        let failure = self.failure.load(Ordering::SeqCst);
        Counters {
            total: self.total.load(Ordering::SeqCst),
            success,
            failure,
        }
    }

    pub fn average_latency(&self) -> Option<Duration> {
        let timed = self.timed.load(Ordering::Relaxed);
        if timed == 0 {
            return None;
        }
        Some(Duration::from_micros(
            self.total_latency_us.load(Ordering::Relaxed) / timed,
        ))
    }

    pub fn last_result(&self, endpoint: &Endpoint) -> Option<CheckResult> {
        self.last_results.read().get(endpoint).cloned()
    }

    pub fn last_results(&self) -> HashMap<Endpoint, CheckResult> {
        self.last_results.read().clone()
    }

    pub fn summary(&self) -> Summary {
        Summary {
            counters: self.counters(),
            average_latency: self.average_latency(),
            last_results: self.last_results(),
        }
    }
}

/// Point-in-time copy of the aggregate state.
#[derive(Debug, Clone)]
pub struct Summary {
    pub counters: Counters,
    pub average_latency: Option<Duration>,
    pub last_results: HashMap<Endpoint, CheckResult>,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "=== Health Check Summary ===")?;
        writeln!(f, "Total Checks: {}", self.counters.total)?;
        writeln!(
            f,
            "Successful: {} ({:.2}%)",
            self.counters.success,
            self.counters.success_rate()
        )?;
        writeln!(f, "Failed: {}", self.counters.failure)?;
        if let Some(avg) = self.average_latency {
            writeln!(f, "Average Latency: {:.2}ms", avg.as_secs_f64() * 1000.0)?;
        }

        writeln!(f)?;
        write!(f, "Last Known Status:")?;

        let mut endpoints: Vec<_> = self.last_results.iter().collect();
        endpoints.sort_by(|a, b| a.0.cmp(b.0));
        for (endpoint, result) in endpoints {
            let latency = result
                .latency_ms()
                .map_or_else(|| "n/a".to_string(), |ms| format!("{:.2}ms", ms));
            write!(f, "\n- {}: {} ({})", endpoint, result.status(), latency)?;
        }
        Ok(())
    }
}
