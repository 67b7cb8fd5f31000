use parking_lot::Mutex;
use std::io::{self, Write};

use crate::error::ReportError;
use crate::models::{CheckResult, Status, Transition};

/// Renders a check result, with the endpoint's previous result when one exists.
pub trait Reporter: Send + Sync {
    fn report(&self, result: &CheckResult, previous: Option<&CheckResult>) -> Result<(), ReportError>;
}

/// One line per result, plus an error line for failed probes.
pub struct ConsoleReporter<W: Write + Send = io::Stdout> {
    slow_threshold_ms: u64,
    out: Mutex<W>,
}

impl ConsoleReporter {
    pub fn stdout(slow_threshold_ms: u64) -> Self {
        Self::with_writer(slow_threshold_ms, io::stdout())
    }
}

impl<W: Write + Send> ConsoleReporter<W> {
    pub fn with_writer(slow_threshold_ms: u64, out: W) -> Self {
        Self {
            slow_threshold_ms,
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    pub fn render(&self, result: &CheckResult, previous: Option<&CheckResult>) -> String {
        let status = match result.status() {
            Status::Up => "✅ UP",
            Status::Down => "❌ DOWN",
        };

        let mut response_time = result
            .latency_ms()
            .map_or_else(|| "n/a".to_string(), |ms| format!("{:.2}ms", ms));
        if result.is_slow(self.slow_threshold_ms) {
            response_time = format!("⚠️ {} (slow)", response_time);
        }

        let mut line = format!(
            "[{}] {} | {} | {}",
            result.timestamp.to_rfc3339(),
            result.endpoint,
            status,
            response_time
        );
        match Transition::between(previous, result) {
            Some(Transition::Recovered) => line.push_str(" 🔄 RECOVERED"),
            Some(Transition::NewlyDown) => line.push_str(" 🔄 NEWLY DOWN"),
            None => {}
        }
        if let Some(err) = &result.error {
            line.push_str(&format!("\n  Error: {}", err));
        }
        line
    }
}

impl<W: Write + Send> Reporter for ConsoleReporter<W> {
    fn report(&self, result: &CheckResult, previous: Option<&CheckResult>) -> Result<(), ReportError> {
        let line = self.render(result, previous);
        let mut out = self.out.lock();
        writeln!(out, "{}", line)?;
        out.flush()?;
        Ok(())
    }
}
