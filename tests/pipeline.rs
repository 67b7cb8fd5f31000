use async_trait::async_trait;
use netpulse::error::{ProbeError, ReportError};
use netpulse::{CheckResult, Deadline, Endpoint, MonitorConfig, Monitor, Phase, Probe, Reporter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const HEALTHY: &str = "http://healthy.test";
const BROKEN: &str = "http://broken.test";

/// Up for `HEALTHY`, down for everything else.
struct Fixed;

#[async_trait]
impl Probe for Fixed {
    async fn probe(&self, endpoint: &Endpoint, _: &Deadline) -> CheckResult {
        if endpoint.as_str() == HEALTHY {
            CheckResult::up(endpoint.clone(), Duration::from_millis(3))
        } else {
            CheckResult::down(
                endpoint.clone(),
                Some(Duration::from_millis(1)),
                ProbeError::Status {
                    endpoint: endpoint.to_string(),
                    status: 500,
                },
            )
        }
    }
}

/// Holds every probe until its deadline fires, counting probes in flight.
struct Stuck {
    in_flight: Arc<AtomicUsize>,
}

#[async_trait]
impl Probe for Stuck {
    async fn probe(&self, endpoint: &Endpoint, deadline: &Deadline) -> CheckResult {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let outcome = deadline.run(tokio::time::sleep(Duration::from_secs(10))).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        CheckResult::down(
            endpoint.clone(),
            Some(Duration::from_millis(1)),
            ProbeError::Transport {
                endpoint: endpoint.to_string(),
                message: format!("{:?}", outcome.err()),
            },
        )
    }
}

/// Forwards every reported result to the test.
struct Forward(mpsc::UnboundedSender<(CheckResult, Option<CheckResult>)>);

impl Reporter for Forward {
    fn report(&self, result: &CheckResult, previous: Option<&CheckResult>) -> Result<(), ReportError> {
        let _ = self.0.send((result.clone(), previous.cloned()));
        Ok(())
    }
}

struct Discard;

impl Reporter for Discard {
    fn report(&self, _: &CheckResult, _: Option<&CheckResult>) -> Result<(), ReportError> {
        Ok(())
    }
}

fn config(urls: &[&str], interval: Duration, workers: usize) -> MonitorConfig {
    MonitorConfig {
        urls: urls.iter().map(|u| u.to_string()).collect(),
        check_interval: interval,
        timeout: Duration::from_secs(5),
        slow_threshold_ms: 500,
        workers,
        queue_capacity: 100,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn first_tick_is_aggregated_end_to_end() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    // the second tick is a minute away, so only the immediate emission counts
    let monitor = Monitor::start(
        &config(&[HEALTHY, BROKEN], Duration::from_secs(60), 3),
        Arc::new(Fixed),
        Arc::new(Forward(tx)),
    );

    for _ in 0..2 {
        let (result, previous) = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("no result within the first tick")
            .unwrap();
        assert!(previous.is_none(), "first observation of {}", result.endpoint);
    }

    let summary = monitor.shutdown().await;

    assert!(rx.try_recv().is_err(), "a second tick was reported");
    assert_eq!(summary.counters.total, 2);
    assert_eq!(summary.counters.success, 1);
    assert_eq!(summary.counters.failure, 1);
    assert!(summary.last_results[&Endpoint::from(HEALTHY)].success);
    assert!(!summary.last_results[&Endpoint::from(BROKEN)].success);

    let text = summary.to_string();
    assert!(text.contains("Successful: 1 (50.00%)"));
    assert!(text.contains(&format!("- {}: UP", HEALTHY)));
    assert!(text.contains(&format!("- {}: DOWN", BROKEN)));
}

#[tokio::test]
async fn later_ticks_see_previous_results() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let monitor = Monitor::start(
        &config(&[HEALTHY], Duration::from_millis(20), 1),
        Arc::new(Fixed),
        Arc::new(Forward(tx)),
    );

    let (_, first_previous) = rx.recv().await.unwrap();
    let (second, second_previous) = rx.recv().await.unwrap();
    let summary = monitor.shutdown().await;

    assert!(first_previous.is_none());
    let second_previous = second_previous.expect("second tick should see the first result");
    assert!(second_previous.success);
    assert!(second_previous.timestamp <= second.timestamp);
    assert!(summary.counters.total >= 2);
    assert_eq!(summary.last_results.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shutdown_with_queued_jobs_joins_every_worker() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let urls: Vec<String> = (0..40).map(|i| format!("http://host-{}.test", i)).collect();
    let url_refs: Vec<&str> = urls.iter().map(String::as_str).collect();

    let monitor = Monitor::start(
        &config(&url_refs, Duration::from_secs(60), 3),
        Arc::new(Stuck {
            in_flight: in_flight.clone(),
        }),
        Arc::new(Discard),
    );
    let tracker = monitor.worker_tracker();
    let mut phases = monitor.subscribe_phase();

    while in_flight.load(Ordering::SeqCst) < 3 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(tracker.live(), 3);

    let summary = tokio::time::timeout(Duration::from_secs(2), monitor.shutdown())
        .await
        .expect("shutdown did not finish before the probe deadline");

    assert_eq!(tracker.live(), 0);
    assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    assert_eq!(*phases.borrow_and_update(), Phase::Stopped);
    let c = summary.counters;
    assert_eq!(c.total, c.success + c.failure);
}

#[tokio::test]
async fn failing_reporter_does_not_stop_aggregation() {
    struct Broken;

    impl Reporter for Broken {
        fn report(&self, _: &CheckResult, _: Option<&CheckResult>) -> Result<(), ReportError> {
            Err(ReportError::Io(std::io::Error::other("stdout closed")))
        }
    }

    let monitor = Monitor::start(
        &config(&[HEALTHY, BROKEN], Duration::from_millis(100), 2),
        Arc::new(Fixed),
        Arc::new(Broken),
    );
    let aggregator = monitor.aggregator().clone();
    tokio::time::timeout(Duration::from_secs(2), async {
        while aggregator.last_results().len() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("results were not aggregated");

    let summary = monitor.shutdown().await;
    assert!(summary.counters.total >= 2);
    assert_eq!(summary.last_results.len(), 2);
}
