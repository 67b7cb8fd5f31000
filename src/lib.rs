//! Concurrent HTTP endpoint health monitor.
//!
//! A [`scheduler::Scheduler`] feeds a bounded job queue, a fixed
//! [`worker::WorkerPool`] probes endpoints under per-job deadlines, and an
//! [`aggregator::Aggregator`] keeps counters and the last result per endpoint
//! while handing each result to a [`report::Reporter`]. [`engine::Monitor`]
//! ties them together and owns the shutdown protocol.

pub mod aggregator;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod probe;
pub mod report;
pub mod scheduler;
pub mod utils;
pub mod worker;

pub use aggregator::{Aggregator, Counters, Summary};
pub use config::MonitorConfig;
pub use engine::{Monitor, Phase};
pub use models::{CheckResult, Endpoint, Job, Status, Transition};
pub use probe::{Deadline, HttpProbe, Probe};
pub use report::{ConsoleReporter, Reporter};
