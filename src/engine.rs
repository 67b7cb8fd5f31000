use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::aggregator::{Aggregator, Summary};
use crate::config::MonitorConfig;
use crate::models::CheckResult;
use crate::probe::Probe;
use crate::report::Reporter;
use crate::scheduler::Scheduler;
use crate::worker::{WorkerContext, WorkerPool, WorkerTracker};

/// Workers hand results straight to the single consumer.
const RESULT_QUEUE_CAPACITY: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Running,
    Draining,
    Stopped,
}

/// Scheduler, worker pool and result consumer wired together, with the
/// shutdown protocol that joins all of them.
pub struct Monitor {
    aggregator: Arc<Aggregator>,
    stop: CancellationToken,
    context: CancellationToken,
    phase: watch::Sender<Phase>,
    scheduler: Option<JoinHandle<()>>,
    workers: Option<WorkerPool>,
    consumer: Option<JoinHandle<()>>,
    tracker: WorkerTracker,
}

impl Monitor {
    /// Spawns the pipeline on the current tokio runtime.
    pub fn start(config: &MonitorConfig, probe: Arc<dyn Probe>, reporter: Arc<dyn Reporter>) -> Self {
        let aggregator = Arc::new(Aggregator::new());
        let stop = CancellationToken::new();
        let context = CancellationToken::new();

        let (job_tx, job_rx) = mpsc::channel(config.queue_capacity);
        let (result_tx, result_rx) = mpsc::channel(RESULT_QUEUE_CAPACITY);

        let workers = WorkerPool::spawn(
            config.workers,
            WorkerContext {
                probe,
                timeout: config.timeout,
                stop: stop.clone(),
                context: context.clone(),
            },
            job_rx,
            result_tx,
        );
        let tracker = workers.tracker();

        let consumer = tokio::spawn(consume_results(
            result_rx,
            aggregator.clone(),
            reporter,
            stop.clone(),
        ));

        let scheduler = Scheduler::new(config.endpoints(), config.check_interval, job_tx)
            .spawn(stop.clone());

        let (phase, _) = watch::channel(Phase::Running);

        info!(
            workers = config.workers,
            endpoints = config.urls.len(),
            "Health monitor running"
        );

        Self {
            aggregator,
            stop,
            context,
            phase,
            scheduler: Some(scheduler),
            workers: Some(workers),
            consumer: Some(consumer),
            tracker,
        }
    }

    pub fn aggregator(&self) -> &Arc<Aggregator> {
        &self.aggregator
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    pub fn worker_tracker(&self) -> WorkerTracker {
        self.tracker.clone()
    }

    /// Stops intake, cancels in-flight probes, waits for every task and
    /// returns the final summary.
    pub async fn shutdown(mut self) -> Summary {
        self.phase.send_replace(Phase::Draining);
        info!("Draining: stopping scheduler, workers and result consumer");

        self.stop.cancel();
        self.context.cancel();

        if let Some(scheduler) = self.scheduler.take() {
            if let Err(e) = scheduler.await {
                error!(error = %e, "Scheduler task failed");
            }
        }
        if let Some(workers) = self.workers.take() {
            workers.join().await;
        }
        if let Some(consumer) = self.consumer.take() {
            if let Err(e) = consumer.await {
                error!(error = %e, "Result consumer task failed");
            }
        }

        self.phase.send_replace(Phase::Stopped);
        info!(live_workers = self.tracker.live(), "All pipeline tasks joined");

        self.aggregator.summary()
    }

    pub async fn run_until<F>(self, signal: F) -> Summary
    where
        F: Future<Output = ()>,
    {
        signal.await;
        self.shutdown().await
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.stop.cancel();
        self.context.cancel();
    }
}

async fn consume_results(
    mut results: mpsc::Receiver<CheckResult>,
    aggregator: Arc<Aggregator>,
    reporter: Arc<dyn Reporter>,
    stop: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            result = results.recv() => match result {
                Some(result) => {
                    aggregator.process(result, reporter.as_ref());
                }
                None => break,
            },
        }
    }
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}
