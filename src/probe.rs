//! Single-shot endpoint probes and the deadlines they run under.

use async_trait::async_trait;
use chrono::Utc;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::{DeadlineError, ProbeError};
use crate::models::{CheckResult, Endpoint};

/// Expiry used when `now + timeout` is not representable.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Per-job deadline: a child of the shared cancellation token plus its own
/// expiry. Cancelling the parent cancels every deadline derived from it;
/// expiry fires regardless of the parent.
#[derive(Debug, Clone)]
pub struct Deadline {
    token: CancellationToken,
    expires_at: Instant,
    timeout: Duration,
}

impl Deadline {
    pub fn child_of(parent: &CancellationToken, timeout: Duration) -> Self {
        let now = Instant::now();
        let expires_at = now
            .checked_add(timeout)
            .unwrap_or_else(|| now + FAR_FUTURE);
        Self {
            token: parent.child_token(),
            expires_at,
            timeout,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Releases the deadline. Does not touch the parent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub async fn run<F>(&self, fut: F) -> Result<F::Output, DeadlineError>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(DeadlineError::Cancelled),
            _ = sleep_until(self.expires_at) => Err(DeadlineError::Expired(self.timeout)),
            output = fut => Ok(output),
        }
    }
}

/// Performs one check of an endpoint. Failures of any kind are captured in
/// the returned result.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, endpoint: &Endpoint, deadline: &Deadline) -> CheckResult;
}

/// GET probe; any 2xx response counts as up.
#[derive(Debug, Clone, Default)]
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, endpoint: &Endpoint, deadline: &Deadline) -> CheckResult {
        let timestamp = Utc::now();
        let request = match self.client.get(endpoint.as_str()).build() {
            Ok(request) => request,
            Err(e) => {
                return CheckResult::down(
                    endpoint.clone(),
                    None,
                    ProbeError::Request {
                        endpoint: endpoint.to_string(),
                        message: e.to_string(),
                    },
                );
            }
        };

        let start = Instant::now();
        let outcome = deadline.run(self.client.execute(request)).await;
        let elapsed = start.elapsed();

        let mut result = match outcome {
            Ok(Ok(response)) => {
                let status = response.status();
                let result = if status.is_success() {
                    CheckResult::up(endpoint.clone(), elapsed)
                } else {
                    CheckResult::down(
                        endpoint.clone(),
                        Some(elapsed),
                        ProbeError::Status {
                            endpoint: endpoint.to_string(),
                            status: status.as_u16(),
                        },
                    )
                };
                result
                    .with_metric("status_code", status.as_u16())
                    .with_metric("time_ms", elapsed.as_millis() as u64)
            }
            Ok(Err(e)) => CheckResult::down(
                endpoint.clone(),
                Some(elapsed),
                ProbeError::Transport {
                    endpoint: endpoint.to_string(),
                    message: e.to_string(),
                },
            ),
            Err(DeadlineError::Expired(timeout)) => CheckResult::down(
                endpoint.clone(),
                Some(elapsed),
                ProbeError::Timeout {
                    endpoint: endpoint.to_string(),
                    timeout,
                },
            ),
            Err(DeadlineError::Cancelled) => CheckResult::down(
                endpoint.clone(),
                Some(elapsed),
                ProbeError::Cancelled {
                    endpoint: endpoint.to_string(),
                },
            ),
        };
        result.timestamp = timestamp;
        result
    }
}
