use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use netpulse::config::MonitorConfig;
use netpulse::engine::{shutdown_signal, Monitor};
use netpulse::probe::HttpProbe;
use netpulse::report::ConsoleReporter;
use netpulse::utils;

/// Periodically probes HTTP endpoints and reports status changes.
#[derive(Debug, Parser)]
#[command(name = "netpulse", version, about)]
struct Args {
    /// Path to a JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of concurrent probe workers
    #[arg(short, long)]
    workers: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let ansi = utils::setup_console();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::INFO.into()))
        .with_ansi(ansi)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = MonitorConfig::load(args.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(workers) = args.workers {
        config.workers = workers;
        config.validate().context("Invalid --workers")?;
    }
    config.log_summary();

    info!(
        "Starting health monitor with {} workers, monitoring {} URLs every {:?}",
        config.workers,
        config.urls.len(),
        config.check_interval
    );

    let probe = Arc::new(HttpProbe::new());
    let reporter = Arc::new(ConsoleReporter::stdout(config.slow_threshold_ms));
    let monitor = Monitor::start(&config, probe, reporter);

    let summary = monitor.run_until(shutdown_signal()).await;
    println!("{}", summary);
    info!("Health monitor shut down successfully");

    Ok(())
}
