//! Display logic for the pagerank-check CLI.
//!
//! This module handles all text output: the run header, spinner animation,
//! per-domain result lines, the dry-run plan and the final summary. Uses only
//! the `console` crate.

use console::{pad_str, style, Alignment, Term};
use pagerank_check_lib::{
    BatchReport, DelayPolicy, DispatchRecord, DomainFailure, FailureReason, MetricsRecord,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const DOMAIN_WIDTH: usize = 30;

// ── Spinner ──────────────────────────────────────────────────────────────────

const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// An async braille-dot spinner that writes to stderr so stdout stays clean.
pub struct Spinner {
    running: Arc<AtomicBool>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl Spinner {
    /// Start a spinner with the given message, or `None` when stderr isn't a TTY.
    pub fn start(message: String) -> Option<Self> {
        if !Term::stderr().is_term() {
            return None;
        }

        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();

        let handle = tokio::spawn(async move {
            let term = Term::stderr();
            let mut idx = 0usize;
            while running_clone.load(Ordering::Relaxed) {
                let frame = SPINNER_FRAMES[idx % SPINNER_FRAMES.len()];
                let _ = term.clear_line();
                let _ = term.write_str(&format!("{} {}", style(frame).cyan(), message));
                idx += 1;
                tokio::time::sleep(Duration::from_millis(80)).await;
            }
            let _ = term.clear_line();
        });

        Some(Self {
            running,
            handle: Some(handle),
        })
    }

    /// Stop the spinner and clear the line.
    pub async fn stop(mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(h) = self.handle.take() {
            let _ = h.await;
        }
    }
}

// ── Header ───────────────────────────────────────────────────────────────────

/// Print a styled header before the batch starts.
pub fn print_header(
    domain_count: usize,
    estimated: Duration,
    policy: &DelayPolicy,
    incremental_dump: bool,
) {
    println!(
        "{} {} {}",
        style("pagerank-check").bold(),
        style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim(),
        style(format!(
            "- Checking {} domain{}",
            domain_count,
            if domain_count == 1 { "" } else { "s" }
        ))
        .dim(),
    );

    let mut meta_parts = vec![
        format!("Delay: {}", describe_policy(policy)),
        format!("Estimated runtime: {}", format_duration(estimated)),
    ];
    if incremental_dump {
        meta_parts.push("Incremental dump: on".to_string());
    }

    println!("{}", style(meta_parts.join(" | ")).dim());
    println!();
}

/// "fixed 30s" or "random 35-60s"
pub fn describe_policy(policy: &DelayPolicy) -> String {
    match policy {
        DelayPolicy::Fixed { secs } => format!("fixed {}s", secs),
        DelayPolicy::Random { min_secs, max_secs } => {
            format!("random {}-{}s", min_secs, max_secs)
        }
    }
}

// ── Dry run ──────────────────────────────────────────────────────────────────

/// Print the planned dispatch offsets and any rejected inputs.
pub fn print_plan(plan: &[DispatchRecord], rejected: &[DomainFailure]) {
    for dispatch in plan {
        println!(
            "  {}  {}",
            style(format!("+{:>8}", format_duration(dispatch.offset))).dim(),
            dispatch.domain
        );
    }
    for failure in rejected {
        println!(
            "  {}  {}  {}",
            style(format!("{:>9}", "skipped")).yellow(),
            failure.domain,
            style(brief_reason(&failure.reason)).dim()
        );
    }
}

// ── Result lines ─────────────────────────────────────────────────────────────

/// Print one successful lookup with its metrics.
pub fn print_success(record: &MetricsRecord, debug: bool) {
    let padded_domain = pad_str(&record.domain, DOMAIN_WIDTH, Alignment::Left, Some(".."));
    println!(
        "  {}  {}  {}",
        style(&padded_domain).white(),
        style("OK").green().bold(),
        style(format_metrics(record)).dim(),
    );
    if debug {
        println!(
            "  {}",
            style(format!(
                "last checked {} | retrieved {}",
                record.last_checked,
                record.retrieved_at.format("%Y-%m-%d %H:%M:%S UTC")
            ))
            .dim()
        );
    }
}

/// Print one failed lookup with a short reason.
pub fn print_failure(failure: &DomainFailure, debug: bool) {
    let padded_domain = pad_str(&failure.domain, DOMAIN_WIDTH, Alignment::Left, Some(".."));
    let label = match &failure.reason {
        FailureReason::NoResults => style("NO RESULTS").yellow().bold(),
        _ => style("FAILED").red().bold(),
    };
    println!(
        "  {}  {}  {}",
        style(&padded_domain).white(),
        label,
        style(brief_reason(&failure.reason)).dim()
    );
    if debug {
        println!("  {}", style(failure.reason.to_string()).dim());
    }
}

/// Print every success, then every failure, in report order.
pub fn print_report(report: &BatchReport, debug: bool) {
    for record in &report.successes {
        print_success(record, debug);
    }
    for failure in &report.failures {
        print_failure(failure, debug);
    }
}

// ── Summary ──────────────────────────────────────────────────────────────────

/// Print the final summary bar with colored counts.
pub fn print_summary(report: &BatchReport) {
    let total = report.total();
    println!(
        "  {}",
        style("────────────────────────────────────────────────────").dim()
    );
    println!(
        "  {} domain{} in {}  {}  {}  {}  {}",
        style(total).bold(),
        if total == 1 { "" } else { "s" },
        format_duration(report.elapsed),
        style("|").dim(),
        style(format!("{} succeeded", report.successes.len())).green(),
        style("|").dim(),
        style(format!("{} failed", report.failures.len())).red(),
    );

    let no_results = report
        .failures
        .iter()
        .filter(|f| f.reason == FailureReason::NoResults)
        .count();
    if no_results > 0 {
        println!(
            "  {}",
            style(format!(
                "{} lookup{} returned no results; try a longer --delay",
                no_results,
                if no_results == 1 { "" } else { "s" }
            ))
            .yellow()
        );
    }
    if report.sink_errors > 0 {
        println!(
            "  {}",
            style(format!(
                "{} result{} could not be written to disk",
                report.sink_errors,
                if report.sink_errors == 1 { "" } else { "s" }
            ))
            .red()
        );
    }
}

// ── Formatting helpers ───────────────────────────────────────────────────────

/// "1h 02m", "12m 30s", "45s"
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{}h {:02}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// "domain_authority=96  page_authority=78"
pub fn format_metrics(record: &MetricsRecord) -> String {
    if record.metrics.is_empty() {
        return "no metrics".to_string();
    }
    record
        .metrics
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("  ")
}

fn brief_reason(reason: &FailureReason) -> String {
    match reason {
        FailureReason::InvalidDomain { .. } => "(invalid domain)".to_string(),
        FailureReason::TransportError {
            status: Some(status),
            ..
        } => format!("(HTTP {})", status),
        FailureReason::TransportError { status: None, .. } => "(network error)".to_string(),
        FailureReason::NoResults => "(rate limited?)".to_string(),
        FailureReason::Internal { .. } => "(internal error)".to_string(),
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
