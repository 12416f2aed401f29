//! First-level domain normalization.
//!
//! checkpagerank.net expects a bare first-level domain (`amazon.co.uk`), not a
//! URL or a host with subdomains. The normalizer reduces arbitrary user input
//! to that form using the Public Suffix List.

use crate::error::PageRankError;
use url::{Host, Url};

/// Reduces URL-like input to a canonical first-level domain.
///
/// Implementations must be idempotent on their own output.
pub trait DomainNormalizer: Send + Sync {
    fn normalize(&self, input: &str) -> Result<String, PageRankError>;
}

/// Normalizer backed by the compiled-in Public Suffix List.
///
/// - `https://www.amazon.co.uk/gp/bestsellers` -> `amazon.co.uk`
/// - `Sub.Example.COM` -> `example.com`
/// - IP addresses, bare suffixes (`co.uk`) and hostless input are rejected
#[derive(Debug, Clone, Copy, Default)]
pub struct PslNormalizer;

impl PslNormalizer {
    pub fn new() -> Self {
        Self
    }
}

impl DomainNormalizer for PslNormalizer {
    fn normalize(&self, input: &str) -> Result<String, PageRankError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(PageRankError::invalid_domain(
                input,
                "Domain name cannot be empty",
            ));
        }

        // Url needs a scheme before it will find the host
        let candidate = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("http://{}", trimmed)
        };

        let parsed = Url::parse(&candidate)
            .map_err(|e| PageRankError::invalid_domain(input, format!("Not a valid URL: {}", e)))?;

        let host = match parsed.host() {
            Some(Host::Domain(host)) => host.trim_end_matches('.').to_ascii_lowercase(),
            Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)) => {
                return Err(PageRankError::invalid_domain(
                    input,
                    "IP addresses do not have a first-level domain",
                ));
            }
            None => {
                return Err(PageRankError::invalid_domain(input, "No host component"));
            }
        };

        psl::domain_str(&host)
            .map(str::to_string)
            .ok_or_else(|| PageRankError::invalid_domain(input, "No registrable domain found"))
    }
}
