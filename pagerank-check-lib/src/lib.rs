//! # PageRank Check Library
//!
//! Batch lookups of domain authority scores from checkpagerank.net.
//!
//! The service rejects clients that ask more than about once every 30
//! seconds, so a batch spaces its lookups out with a precomputed delay
//! schedule while letting slow lookups overlap.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pagerank_check_lib::{BatchConfig, BatchJob, CheckPageRankClient};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BatchConfig::default().with_fixed_delay(30)?;
//!     let fetcher = Arc::new(CheckPageRankClient::with_config(&config)?);
//!
//!     let mut job = BatchJob::new(&["amazon.co.uk", "wikipedia.org"], &config, fetcher)?;
//!     let report = job.process().await?;
//!
//!     for record in &report.successes {
//!         println!("{}: {:?}", record.domain, record.metrics);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Rate-limit aware pacing**: fixed or randomized delays of at least 30s
//! - **Concurrent lookups**: a slow lookup never holds back the next dispatch
//! - **Domain normalization**: URLs reduced to first-level domains via the Public Suffix List
//! - **Incremental persistence**: each success written to JSON as soon as it arrives

// Re-export main public API types and functions
// This makes them available as pagerank_check_lib::TypeName
pub use batch::BatchJob;
pub use config::{
    load_env_config, load_env_config_from, parse_timeout_string, ConfigManager, DefaultsConfig,
    EnvConfig, FileConfig, ServiceConfig,
};
pub use delay::{
    DelayPolicy, DelaySchedule, DelayScheduler, DEFAULT_MAX_DELAY_SECS, DEFAULT_MIN_DELAY_SECS,
    MIN_SAFE_DELAY_SECS,
};
pub use error::PageRankError;
pub use normalize::{DomainNormalizer, PslNormalizer};
pub use protocols::{parse_scores, CheckPageRankClient, ScoreFetcher};
pub use sink::{JsonFileSink, MemorySink, ResultSink};
pub use types::{
    BatchConfig, BatchReport, BatchState, DispatchRecord, DomainFailure, FailureReason,
    FetchOutcome, MetricsRecord, DEFAULT_ENDPOINT, DEFAULT_REFERER, DEFAULT_REQUEST_TIMEOUT,
};
pub use utils::{dedup_domains, load_domains_from_file, parse_domain_list};

// Internal modules - these are not part of the public API
mod batch;
mod concurrent;
mod config;
mod delay;
mod error;
mod normalize;
mod protocols;
mod sink;
mod types;
mod utils;

// Type alias for convenience
pub type Result<T> = std::result::Result<T, PageRankError>;

// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
