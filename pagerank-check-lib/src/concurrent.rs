//! Units of work and the outcome collections they share.
//!
//! Every dispatched domain runs as its own task. Tasks record their outcome
//! through a single mutex that guards both the success and failure
//! collections, so each domain is appended exactly once.

use crate::protocols::ScoreFetcher;
use crate::sink::ResultSink;
use crate::types::{DomainFailure, FailureReason, FetchOutcome, MetricsRecord};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Outcome collections owned by one batch.
#[derive(Debug, Default)]
pub(crate) struct Outcomes {
    pub(crate) successes: Vec<MetricsRecord>,
    pub(crate) failures: Vec<DomainFailure>,
    pub(crate) sink_errors: usize,
}

impl Outcomes {
    pub(crate) fn record(&mut self, outcome: FetchOutcome) {
        match outcome {
            FetchOutcome::Success(record) => self.successes.push(record),
            FetchOutcome::Failure(failure) => self.failures.push(failure),
        }
    }
}

pub(crate) type SharedOutcomes = Arc<Mutex<Outcomes>>;

/// One unit of work: fetch, classify, optionally persist, then record.
///
/// The sink write happens before the outcome is recorded, so a success is
/// persisted before its unit counts as complete.
pub(crate) async fn run_unit(
    domain: String,
    fetcher: Arc<dyn ScoreFetcher>,
    sink: Option<Arc<dyn ResultSink>>,
    outcomes: SharedOutcomes,
) {
    let outcome = fetch_outcome(&domain, fetcher.as_ref()).await;

    let mut sink_failed = false;
    if let (FetchOutcome::Success(record), Some(sink)) = (&outcome, sink.as_ref()) {
        sink_failed = !store_record(&domain, record, sink.as_ref()).await;
    }

    match &outcome {
        FetchOutcome::Success(_) => debug!(domain = %domain, "lookup succeeded"),
        FetchOutcome::Failure(failure) => {
            debug!(domain = %domain, reason = failure.reason.code(), "lookup failed")
        }
    }

    let mut guard = outcomes.lock().await;
    if sink_failed {
        guard.sink_errors += 1;
    }
    guard.record(outcome);
}

/// Persist one success. Returns `false` when the sink failed or panicked;
/// either way the outcome is still recorded by the caller.
async fn store_record(domain: &str, record: &MetricsRecord, sink: &dyn ResultSink) -> bool {
    match AssertUnwindSafe(sink.store(record)).catch_unwind().await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!(domain = %domain, error = %e, "failed to persist result");
            false
        }
        Err(panic) => {
            warn!(
                domain = %domain,
                panic = panic_message(panic.as_ref()),
                "result sink panicked"
            );
            false
        }
    }
}

/// Call the fetcher and turn whatever happens into a [`FetchOutcome`].
///
/// A panicking fetcher becomes an `Internal` failure rather than a lost
/// domain.
pub(crate) async fn fetch_outcome(domain: &str, fetcher: &dyn ScoreFetcher) -> FetchOutcome {
    match AssertUnwindSafe(fetcher.fetch(domain)).catch_unwind().await {
        Ok(Ok(record)) => FetchOutcome::Success(record),
        Ok(Err(e)) => FetchOutcome::Failure(DomainFailure::from_error(domain, &e)),
        Err(panic) => FetchOutcome::Failure(DomainFailure::new(
            domain,
            FailureReason::Internal {
                message: format!("fetcher panicked: {}", panic_message(panic.as_ref())),
            },
        )),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}
