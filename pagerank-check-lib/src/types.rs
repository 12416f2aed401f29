//! Core data types for batch lookups.
//!
//! This module defines the records produced by a fetch, the per-domain
//! outcome of a dispatch, the final batch report, and the configuration
//! a batch is built from.

use crate::delay::DelayPolicy;
use crate::error::PageRankError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default checkpagerank.net form endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://checkpagerank.net/check-page-rank.php";

/// Referer sent with every lookup.
pub const DEFAULT_REFERER: &str = "https://www.google.com/";

/// Default timeout for a single lookup request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Metrics scraped for one domain.
///
/// Serializes to a flat JSON object: `domain`, `last_checked`, `retrieved_at`
/// followed by every metric key. Metric keys are lower-case and
/// underscore-separated (`domain_authority`, `trust_flow`, ...). Values are
/// kept as the strings shown on the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    /// First-level domain the metrics belong to
    pub domain: String,

    /// "Last Checked" value reported by the page
    pub last_checked: String,

    /// When this record was retrieved
    pub retrieved_at: DateTime<Utc>,

    /// Metric name -> value, as displayed on the page
    #[serde(flatten)]
    pub metrics: BTreeMap<String, String>,
}

impl MetricsRecord {
    /// Create an empty record retrieved now.
    pub fn new<D: Into<String>, L: Into<String>>(domain: D, last_checked: L) -> Self {
        Self {
            domain: domain.into(),
            last_checked: last_checked.into(),
            retrieved_at: Utc::now(),
            metrics: BTreeMap::new(),
        }
    }

    /// Add a metric, returning the record.
    pub fn with_metric<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.metrics.insert(key.into(), value.into());
        self
    }

    /// Look up a metric value by its normalized key.
    pub fn metric(&self, key: &str) -> Option<&str> {
        self.metrics.get(key).map(String::as_str)
    }
}

/// Why a domain ended up in the failure collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum FailureReason {
    /// The input could not be normalized to a first-level domain
    InvalidDomain { message: String },

    /// The request failed or returned a non-200 status
    TransportError {
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
        message: String,
    },

    /// The page carried no results, most likely rate limited
    NoResults,

    /// The fetcher panicked or returned an error outside the fetch taxonomy
    Internal { message: String },
}

impl FailureReason {
    /// Stable reason code used in reports.
    pub fn code(&self) -> &'static str {
        match self {
            FailureReason::InvalidDomain { .. } => "invalid-domain",
            FailureReason::TransportError { .. } => "transport-error",
            FailureReason::NoResults => "no-results",
            FailureReason::Internal { .. } => "internal",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::InvalidDomain { message } => write!(f, "invalid domain: {}", message),
            FailureReason::TransportError {
                status: Some(code),
                message,
            } => write!(f, "transport error (HTTP {}): {}", code, message),
            FailureReason::TransportError {
                status: None,
                message,
            } => write!(f, "transport error: {}", message),
            FailureReason::NoResults => {
                write!(f, "no results (likely rate limited)")
            }
            FailureReason::Internal { message } => write!(f, "internal error: {}", message),
        }
    }
}

/// A domain paired with the reason it failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainFailure {
    pub domain: String,
    #[serde(flatten)]
    pub reason: FailureReason,
}

impl DomainFailure {
    pub fn new<D: Into<String>>(domain: D, reason: FailureReason) -> Self {
        Self {
            domain: domain.into(),
            reason,
        }
    }

    /// Build a failure from the error a fetcher or normalizer returned.
    pub fn from_error<D: Into<String>>(domain: D, error: &PageRankError) -> Self {
        Self::new(domain, error.to_failure_reason())
    }
}

/// Result of one fetch attempt for one domain.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success(MetricsRecord),
    Failure(DomainFailure),
}

impl FetchOutcome {
    /// Domain this outcome belongs to.
    pub fn domain(&self) -> &str {
        match self {
            FetchOutcome::Success(record) => &record.domain,
            FetchOutcome::Failure(failure) => &failure.domain,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }
}

/// When a domain was dispatched, relative to the start of the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRecord {
    pub domain: String,
    pub offset: Duration,
}

/// Lifecycle of a batch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchState {
    /// Constructed, not started
    Idle,
    /// Dispatch loop active
    Running,
    /// Every unit of work finished (terminal)
    Completed,
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchState::Idle => write!(f, "Idle"),
            BatchState::Running => write!(f, "Running"),
            BatchState::Completed => write!(f, "Completed"),
        }
    }
}

/// Aggregate result of a processed batch.
///
/// Every domain in the batch appears exactly once, either in `successes`
/// or in `failures`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    /// Domains not dispatched (always empty after a run)
    pub remaining: Vec<String>,

    /// Records in completion order
    pub successes: Vec<MetricsRecord>,

    /// Failures in completion order, normalization rejects first
    pub failures: Vec<DomainFailure>,

    /// Dispatch start times, in dispatch order
    pub dispatches: Vec<DispatchRecord>,

    /// Number of successes the result sink failed to persist
    pub sink_errors: usize,

    /// Wall time from first dispatch to last completion
    pub elapsed: Duration,
}

impl BatchReport {
    /// Total number of classified domains.
    pub fn total(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    pub fn success_for(&self, domain: &str) -> Option<&MetricsRecord> {
        self.successes.iter().find(|r| r.domain == domain)
    }

    pub fn failure_for(&self, domain: &str) -> Option<&DomainFailure> {
        self.failures.iter().find(|f| f.domain == domain)
    }
}

/// Configuration options for a batch.
///
/// The delay policy is validated by its own constructors; `BatchJob`
/// validates it again before accepting a configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Spacing between consecutive dispatches
    /// Default: random between 35s and 60s
    pub delay: DelayPolicy,

    /// Reduce every input to its first-level domain before deduplication
    /// Default: false
    pub normalize: bool,

    /// Persist every success as soon as it arrives
    /// Default: false
    pub incremental_dump: bool,

    /// Root directory for incremental dumps; each batch writes into its own
    /// `batch_<timestamp>` subdirectory
    /// Default: "json_outputs"
    pub output_dir: PathBuf,

    /// Keep the raw HTML of every response
    /// Default: false
    pub save_html: bool,

    /// Directory for captured HTML
    /// Default: "html_outputs"
    pub html_dir: PathBuf,

    /// Timeout for a single lookup request
    /// Default: 20 seconds
    #[serde(skip)] // Don't serialize Duration directly
    pub timeout: Duration,

    /// Form endpoint the lookups are posted to
    pub endpoint: String,

    /// Referer header sent with each lookup
    pub referer: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            delay: DelayPolicy::default(),
            normalize: false,
            incremental_dump: false,
            output_dir: PathBuf::from("json_outputs"),
            save_html: false,
            html_dir: PathBuf::from("html_outputs"),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            referer: DEFAULT_REFERER.to_string(),
        }
    }
}

impl BatchConfig {
    /// Use a constant delay between dispatches.
    ///
    /// Fails immediately when `secs` is below the 30 second minimum.
    pub fn with_fixed_delay(mut self, secs: u64) -> Result<Self, PageRankError> {
        self.delay = DelayPolicy::fixed(secs)?;
        Ok(self)
    }

    /// Draw each delay uniformly from `[min_secs, max_secs)`.
    pub fn with_random_delay(mut self, min_secs: u64, max_secs: u64) -> Result<Self, PageRankError> {
        self.delay = DelayPolicy::random(min_secs, max_secs)?;
        Ok(self)
    }

    /// Enable or disable first-level domain normalization.
    pub fn with_normalize(mut self, enabled: bool) -> Self {
        self.normalize = enabled;
        self
    }

    /// Enable or disable incremental JSON dumps.
    pub fn with_incremental_dump(mut self, enabled: bool) -> Self {
        self.incremental_dump = enabled;
        self
    }

    /// Set the root directory for incremental dumps.
    pub fn with_output_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Enable raw HTML capture into `dir`.
    pub fn with_html_capture<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.save_html = true;
        self.html_dir = dir.into();
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Point lookups at a different endpoint.
    pub fn with_endpoint<E: Into<String>>(mut self, endpoint: E) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}
