use futures::future::join_all;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::ProbeError;
use crate::models::{CheckResult, Endpoint, Job};
use crate::probe::{Deadline, Probe};

/// Number of worker tasks currently alive.
#[derive(Debug, Clone, Default)]
pub struct WorkerTracker(Arc<AtomicUsize>);

impl WorkerTracker {
    pub fn live(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn enter(&self) -> LiveGuard {
        self.0.fetch_add(1, Ordering::SeqCst);
        LiveGuard(self.0.clone())
    }
}

struct LiveGuard(Arc<AtomicUsize>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Shared handles every worker needs.
#[derive(Clone)]
pub struct WorkerContext {
    pub probe: Arc<dyn Probe>,
    pub timeout: Duration,
    /// Closes intake.
    pub stop: CancellationToken,
    /// Parent of every per-job deadline.
    pub context: CancellationToken,
}

/// Fixed-size pool of probe workers pulling from one shared job queue.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    tracker: WorkerTracker,
}

impl WorkerPool {
    pub fn spawn(
        size: usize,
        ctx: WorkerContext,
        jobs: mpsc::Receiver<Job>,
        results: mpsc::Sender<CheckResult>,
    ) -> Self {
        let jobs = Arc::new(Mutex::new(jobs));
        let tracker = WorkerTracker::default();

        let handles = (0..size)
            .map(|id| {
                let worker = Worker {
                    id,
                    ctx: ctx.clone(),
                    jobs: jobs.clone(),
                    results: results.clone(),
                };
                // counted before spawn, released when the task ends
                let guard = tracker.enter();
                tokio::spawn(async move {
                    let _guard = guard;
                    worker.run().await;
                })
            })
            .collect();

        info!(workers = size, timeout = ?ctx.timeout, "Worker pool started");

        Self { handles, tracker }
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    pub fn tracker(&self) -> WorkerTracker {
        self.tracker.clone()
    }

    pub async fn join(self) {
        for (id, joined) in join_all(self.handles).await.into_iter().enumerate() {
            if let Err(e) = joined {
                error!(worker = id, error = %e, "Worker task failed");
            }
        }
    }
}

struct Worker {
    id: usize,
    ctx: WorkerContext,
    jobs: Arc<Mutex<mpsc::Receiver<Job>>>,
    results: mpsc::Sender<CheckResult>,
}

impl Worker {
    async fn run(self) {
        debug!(worker = self.id, "Worker started");

        loop {
            let job = tokio::select! {
                biased;
                _ = self.ctx.stop.cancelled() => break,
                _ = self.ctx.context.cancelled() => break,
                job = next_job(&self.jobs) => match job {
                    Some(job) => job,
                    None => break,
                },
            };

            debug!(
                worker = self.id,
                endpoint = %job.endpoint,
                queued_ms = job.queued_at.elapsed().as_millis() as u64,
                "Probing"
            );

            let deadline = Deadline::child_of(&self.ctx.context, self.ctx.timeout);
            let started = tokio::time::Instant::now();
            let outcome = AssertUnwindSafe(self.ctx.probe.probe(&job.endpoint, &deadline))
                .catch_unwind()
                .await;
            deadline.cancel();

            let result = match outcome {
                Ok(result) => result,
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!(worker = self.id, endpoint = %job.endpoint, %message, "Probe panicked");
                    panicked(&job.endpoint, started.elapsed(), message)
                }
            };

            tokio::select! {
                biased;
                _ = self.ctx.context.cancelled() => {
                    debug!(worker = self.id, endpoint = %job.endpoint, "Shutting down, discarding result");
                    break;
                }
                sent = self.results.send(result) => {
                    if sent.is_err() {
                        break;
                    }
                }
            }
        }

        debug!(worker = self.id, "Worker stopped");
    }
}

async fn next_job(jobs: &Mutex<mpsc::Receiver<Job>>) -> Option<Job> {
    jobs.lock().await.recv().await
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn panicked(endpoint: &Endpoint, elapsed: Duration, message: String) -> CheckResult {
    CheckResult::down(
        endpoint.clone(),
        Some(elapsed),
        ProbeError::Panicked {
            endpoint: endpoint.to_string(),
            message,
        },
    )
}
