use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::models::{Endpoint, Job};

/// Outcome of one scheduling tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Emission {
    pub sent: usize,
    pub dropped: usize,
    pub closed: bool,
}

/// Emits one job per endpoint immediately and then on every interval tick.
/// Never waits for queue space: a job that does not fit is dropped.
pub struct Scheduler {
    endpoints: Arc<[Endpoint]>,
    interval: Duration,
    jobs: mpsc::Sender<Job>,
}

impl Scheduler {
    pub fn new(endpoints: impl Into<Arc<[Endpoint]>>, interval: Duration, jobs: mpsc::Sender<Job>) -> Self {
        Self {
            endpoints: endpoints.into(),
            interval,
            jobs,
        }
    }

    pub fn emit(&self) -> Emission {
        let mut emission = Emission::default();
        for endpoint in self.endpoints.iter() {
            match self.jobs.try_send(Job::new(endpoint.clone())) {
                Ok(()) => emission.sent += 1,
                Err(TrySendError::Full(job)) => {
                    warn!(endpoint = %job.endpoint, "Job queue is full, skipping check");
                    emission.dropped += 1;
                }
                Err(TrySendError::Closed(_)) => {
                    emission.closed = true;
                    break;
                }
            }
        }
        emission
    }

    pub async fn run(self, stop: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            endpoints = self.endpoints.len(),
            interval = ?self.interval,
            "Scheduler started"
        );

        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                _ = ticker.tick() => {
                    let emission = self.emit();
                    debug!(sent = emission.sent, dropped = emission.dropped, "Scheduled checks");
                    if emission.closed {
                        debug!("Job queue closed, scheduler exiting");
                        break;
                    }
                }
            }
        }

        info!("Scheduler stopped");
    }

    pub fn spawn(self, stop: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(stop))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints(urls: &[&str]) -> Vec<Endpoint> {
        urls.iter().map(|u| Endpoint::from(*u)).collect()
    }

    #[tokio::test]
    async fn full_queue_drops_overflow() {
        let capacity = 4;
        let (tx, mut rx) = mpsc::channel(capacity);
        let same = vec![Endpoint::from("http://a"); capacity + 1];
        let scheduler = Scheduler::new(same, Duration::from_secs(1), tx);

        let emission = scheduler.emit();

        assert_eq!(emission, Emission { sent: capacity, dropped: 1, closed: false });
        let mut delivered = 0;
        while let Ok(job) = rx.try_recv() {
            assert_eq!(job.endpoint.as_str(), "http://a");
            delivered += 1;
        }
        assert_eq!(delivered, capacity);
    }

    #[tokio::test]
    async fn dropped_endpoint_is_scheduled_again_next_tick() {
        let (tx, mut rx) = mpsc::channel(1);
        let scheduler = Scheduler::new(endpoints(&["http://a", "http://b"]), Duration::from_secs(1), tx);

        assert_eq!(scheduler.emit().dropped, 1);
        assert_eq!(rx.recv().await.unwrap().endpoint.as_str(), "http://a");

        assert_eq!(scheduler.emit().dropped, 1);
        assert_eq!(rx.recv().await.unwrap().endpoint.as_str(), "http://a");
    }

    #[tokio::test]
    async fn empty_endpoint_list_emits_nothing() {
        let (tx, mut rx) = mpsc::channel(8);
        let scheduler = Scheduler::new(Vec::<Endpoint>::new(), Duration::from_secs(1), tx);
        assert_eq!(scheduler.emit(), Emission::default());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_queue_is_reported() {
        let (tx, rx) = mpsc::channel(8);
        drop(rx);
        let scheduler = Scheduler::new(endpoints(&["http://a"]), Duration::from_secs(1), tx);
        assert!(scheduler.emit().closed);
    }

    #[tokio::test(start_paused = true)]
    async fn emits_immediately_then_every_tick() {
        let (tx, mut rx) = mpsc::channel(64);
        let stop = CancellationToken::new();
        let handle = Scheduler::new(
            endpoints(&["http://a", "http://b"]),
            Duration::from_millis(100),
            tx,
        )
        .spawn(stop.clone());

        tokio::time::sleep(Duration::from_millis(250)).await;
        stop.cancel();
        handle.await.unwrap();

        let mut count = 0;
        while rx.try_recv().is_ok() {
            count += 1;
        }
        // ticks at 0ms, 100ms and 200ms
        assert_eq!(count, 6);
    }

    #[tokio::test]
    async fn stop_ends_run_loop() {
        let (tx, _rx) = mpsc::channel(64);
        let stop = CancellationToken::new();
        stop.cancel();
        let handle = Scheduler::new(endpoints(&["http://a"]), Duration::from_millis(10), tx).spawn(stop);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("scheduler did not stop")
            .unwrap();
    }
}
