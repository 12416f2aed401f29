//! Batch orchestration.
//!
//! This module provides `BatchJob`, which owns a deduplicated domain set,
//! spaces dispatches out according to a precomputed delay schedule and runs
//! every lookup as its own concurrent unit of work.

use crate::concurrent::{run_unit, Outcomes, SharedOutcomes};
use crate::delay::{DelayPolicy, DelaySchedule, DelayScheduler};
use crate::error::PageRankError;
use crate::normalize::{DomainNormalizer, PslNormalizer};
use crate::protocols::ScoreFetcher;
use crate::sink::{JsonFileSink, ResultSink};
use crate::types::{BatchConfig, BatchReport, BatchState, DispatchRecord, DomainFailure};
use crate::utils::dedup_domains;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

/// A single-use batch of lookups.
///
/// The job starts `Idle`, is `Running` while [`process`](Self::process)
/// dispatches, and ends `Completed`. Processing drains the pending set, so a
/// job can only be processed once.
///
/// # Example
///
/// ```rust,no_run
/// use pagerank_check_lib::{BatchConfig, BatchJob, CheckPageRankClient};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = BatchConfig::default().with_normalize(true);
///     let fetcher = Arc::new(CheckPageRankClient::with_config(&config)?);
///     let domains = vec!["https://www.amazon.co.uk/".to_string(), "wikipedia.org".to_string()];
///
///     let mut job = BatchJob::new(&domains, &config, fetcher)?;
///     println!("Estimated runtime: {:?}", job.estimated_runtime());
///
///     let report = job.process().await?;
///     println!("{} succeeded, {} failed", report.successes.len(), report.failures.len());
///     Ok(())
/// }
/// ```
pub struct BatchJob {
    /// Domains still to dispatch, in dispatch order
    pending: VecDeque<String>,
    /// Waits between consecutive dispatches, computed at construction
    schedule: DelaySchedule,
    policy: DelayPolicy,
    fetcher: Arc<dyn ScoreFetcher>,
    /// Incremental persistence target, if enabled
    sink: Option<Arc<dyn ResultSink>>,
    /// Entries the normalizer refused
    rejected: Vec<DomainFailure>,
    state: BatchState,
}

impl BatchJob {
    /// Build a job from raw input and a batch configuration.
    ///
    /// Input is trimmed and deduplicated in first-seen order. With
    /// `config.normalize` set, every entry is reduced to its first-level
    /// domain by [`PslNormalizer`]; entries it rejects are reported as
    /// `invalid-domain` failures. With `config.incremental_dump` set, successes
    /// are written to a [`JsonFileSink`] under `config.output_dir`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the delay policy is invalid.
    pub fn new<S: AsRef<str>>(
        domains: &[S],
        config: &BatchConfig,
        fetcher: Arc<dyn ScoreFetcher>,
    ) -> Result<Self, PageRankError> {
        let normalizer = PslNormalizer::new();
        let normalizer: Option<&dyn DomainNormalizer> = if config.normalize {
            Some(&normalizer)
        } else {
            None
        };
        Self::build(domains, config, fetcher, normalizer)
    }

    /// Like [`new`](Self::new), but always normalizes with `normalizer`.
    pub fn with_normalizer<S: AsRef<str>>(
        domains: &[S],
        config: &BatchConfig,
        fetcher: Arc<dyn ScoreFetcher>,
        normalizer: &dyn DomainNormalizer,
    ) -> Result<Self, PageRankError> {
        Self::build(domains, config, fetcher, Some(normalizer))
    }

    fn build<S: AsRef<str>>(
        domains: &[S],
        config: &BatchConfig,
        fetcher: Arc<dyn ScoreFetcher>,
        normalizer: Option<&dyn DomainNormalizer>,
    ) -> Result<Self, PageRankError> {
        let mut scheduler = DelayScheduler::new(config.delay.clone())?;

        let unique = dedup_domains(domains);
        let mut rejected = Vec::new();

        let pending = match normalizer {
            Some(normalizer) => {
                let mut accepted = Vec::with_capacity(unique.len());
                for entry in unique {
                    match normalizer.normalize(&entry) {
                        Ok(domain) => accepted.push(domain),
                        Err(e) => {
                            debug!(input = %entry, error = %e, "rejected by normalizer");
                            rejected.push(DomainFailure::from_error(entry, &e));
                        }
                    }
                }
                // Different inputs can share a first-level domain
                dedup_domains(accepted)
            }
            None => unique,
        };

        let schedule = scheduler.schedule(pending.len());

        let sink: Option<Arc<dyn ResultSink>> = if config.incremental_dump {
            Some(Arc::new(JsonFileSink::for_batch(&config.output_dir)))
        } else {
            None
        };

        Ok(Self {
            pending: pending.into(),
            schedule,
            policy: config.delay.clone(),
            fetcher,
            sink,
            rejected,
            state: BatchState::Idle,
        })
    }

    /// Persist every success to `sink`, replacing any configured sink.
    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Domains waiting for dispatch, in dispatch order.
    pub fn pending(&self) -> Vec<String> {
        self.pending.iter().cloned().collect()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn schedule(&self) -> &DelaySchedule {
        &self.schedule
    }

    pub fn policy(&self) -> &DelayPolicy {
        &self.policy
    }

    /// Time until the last dispatch starts: the sum of the schedule.
    pub fn estimated_runtime(&self) -> Duration {
        self.schedule.total()
    }

    /// Planned dispatch offsets from the start of the batch.
    pub fn plan(&self) -> Vec<DispatchRecord> {
        let mut offset = Duration::ZERO;
        self.pending
            .iter()
            .enumerate()
            .map(|(index, domain)| {
                if index > 0 {
                    offset += self.schedule.get(index - 1).unwrap_or_default();
                }
                DispatchRecord {
                    domain: domain.clone(),
                    offset,
                }
            })
            .collect()
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn incremental_dump(&self) -> bool {
        self.sink.is_some()
    }

    /// Inputs the normalizer rejected at construction.
    pub fn rejected(&self) -> &[DomainFailure] {
        &self.rejected
    }

    /// Dispatch every pending domain and wait for all lookups to finish.
    ///
    /// Dispatch `i + 1` starts no earlier than `schedule[i]` after dispatch
    /// `i` started. Lookups run concurrently and finish in any order. Failed
    /// lookups and failed sink writes never stop the batch.
    ///
    /// # Errors
    ///
    /// - `AlreadyProcessed` if the job is not `Idle`
    /// - `EmptyBatch` if nothing is pending (no lookups are made)
    pub async fn process(&mut self) -> Result<BatchReport, PageRankError> {
        if self.state != BatchState::Idle {
            return Err(PageRankError::AlreadyProcessed {
                state: self.state.to_string(),
            });
        }
        if self.pending.is_empty() {
            return Err(PageRankError::EmptyBatch);
        }

        self.state = BatchState::Running;
        info!(
            domains = self.pending.len(),
            estimated_secs = self.estimated_runtime().as_secs(),
            incremental_dump = self.incremental_dump(),
            "starting batch"
        );

        let outcomes: SharedOutcomes = Arc::new(Mutex::new(Outcomes {
            failures: self.rejected.clone(),
            ..Outcomes::default()
        }));

        let started = Instant::now();
        let mut previous: Option<Instant> = None;
        let mut dispatches = Vec::with_capacity(self.pending.len());
        let mut tasks = JoinSet::new();

        while let Some(domain) = self.pending.pop_front() {
            if let Some(previous) = previous {
                let delay = self
                    .schedule
                    .get(dispatches.len() - 1)
                    .unwrap_or_default();
                sleep_until(previous + delay).await;
            }

            let dispatched_at = Instant::now();
            previous = Some(dispatched_at);
            debug!(domain = %domain, index = dispatches.len(), "dispatching lookup");

            dispatches.push(DispatchRecord {
                domain: domain.clone(),
                offset: dispatched_at - started,
            });
            tasks.spawn(run_unit(
                domain,
                Arc::clone(&self.fetcher),
                self.sink.clone(),
                Arc::clone(&outcomes),
            ));
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "unit of work did not complete");
            }
        }

        let collected = std::mem::take(&mut *outcomes.lock().await);
        self.state = BatchState::Completed;

        let report = BatchReport {
            remaining: self.pending(),
            successes: collected.successes,
            failures: collected.failures,
            dispatches,
            sink_errors: collected.sink_errors,
            elapsed: started.elapsed(),
        };

        info!(
            successes = report.successes.len(),
            failures = report.failures.len(),
            sink_errors = report.sink_errors,
            elapsed_secs = report.elapsed.as_secs(),
            "batch completed"
        );

        Ok(report)
    }
}
