//! Score fetching.
//!
//! This module contains the fetcher abstraction the batch orchestrator calls
//! for every domain, and the checkpagerank.net implementation of it.

use crate::error::PageRankError;
use crate::types::MetricsRecord;
use async_trait::async_trait;

/// checkpagerank.net HTTP client
pub mod checkpagerank;

/// Results page parsing
pub mod parser;

pub use checkpagerank::CheckPageRankClient;
pub use parser::parse_scores;

/// Performs one lookup for one first-level domain.
///
/// A call may take arbitrarily long. Calls for different domains are
/// independent; the orchestrator runs them concurrently.
#[async_trait]
pub trait ScoreFetcher: Send + Sync {
    async fn fetch(&self, domain: &str) -> Result<MetricsRecord, PageRankError>;
}
