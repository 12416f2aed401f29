//! checkpagerank.net client.
//!
//! A lookup is a form POST of the domain to the check endpoint; the scores
//! come back embedded in an HTML page. The service only answers one request
//! per ~30 seconds per client; spacing requests out is the batch
//! orchestrator's job, not this client's.

use crate::error::PageRankError;
use crate::protocols::parser::parse_scores;
use crate::protocols::ScoreFetcher;
use crate::types::{BatchConfig, MetricsRecord, DEFAULT_ENDPOINT, DEFAULT_REFERER};
use async_trait::async_trait;
use reqwest::header::REFERER;
use reqwest::StatusCode;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP client for checkpagerank.net lookups.
#[derive(Clone)]
pub struct CheckPageRankClient {
    /// HTTP client for making lookup requests
    http_client: reqwest::Client,
    /// Form endpoint
    endpoint: String,
    /// Referer header value
    referer: String,
    /// Request timeout (also enforced by `http_client`)
    timeout: Duration,
    /// Where raw responses are captured, if enabled
    html_dir: Option<PathBuf>,
}

impl CheckPageRankClient {
    /// Create a client with default settings.
    pub fn new() -> Result<Self, PageRankError> {
        Self::with_config(&BatchConfig::default())
    }

    /// Create a client from a batch configuration.
    pub fn with_config(config: &BatchConfig) -> Result<Self, PageRankError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                PageRankError::network_with_source(
                    "Failed to create checkpagerank HTTP client",
                    e.to_string(),
                )
            })?;

        let endpoint = if config.endpoint.is_empty() {
            DEFAULT_ENDPOINT.to_string()
        } else {
            config.endpoint.clone()
        };
        let referer = if config.referer.is_empty() {
            DEFAULT_REFERER.to_string()
        } else {
            config.referer.clone()
        };

        Ok(Self {
            http_client,
            endpoint,
            referer,
            timeout: config.timeout,
            html_dir: config.save_html.then(|| config.html_dir.clone()),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Post the lookup form and return the response body.
    async fn request_page(&self, domain: &str) -> Result<String, PageRankError> {
        debug!(domain, endpoint = %self.endpoint, "requesting scores");

        let response = self
            .http_client
            .post(&self.endpoint)
            .header(REFERER, self.referer.as_str())
            .form(&[("name", domain)])
            .send()
            .await
            .map_err(|e| self.transport_error(domain, e))?;

        let status = response.status();
        debug!(domain, %status, "received response");

        if status != StatusCode::OK {
            return Err(PageRankError::transport(
                domain,
                Some(status.as_u16()),
                status
                    .canonical_reason()
                    .unwrap_or("Unexpected status")
                    .to_string(),
            ));
        }

        response
            .text()
            .await
            .map_err(|e| self.transport_error(domain, e))
    }

    fn transport_error(&self, domain: &str, err: reqwest::Error) -> PageRankError {
        if err.is_timeout() {
            return PageRankError::timeout(format!("lookup for '{}'", domain), self.timeout);
        }
        let message = if err.is_connect() {
            format!("Connection failed: {}", err)
        } else {
            format!("Request failed: {}", err)
        };
        PageRankError::transport(domain, err.status().map(|s| s.as_u16()), message)
    }
}

#[async_trait]
impl ScoreFetcher for CheckPageRankClient {
    async fn fetch(&self, domain: &str) -> Result<MetricsRecord, PageRankError> {
        let body = self.request_page(domain).await?;

        if let Some(dir) = &self.html_dir {
            match capture_html(dir, &body).await {
                Ok(path) => debug!(domain, path = %path.display(), "captured response html"),
                Err(e) => warn!(domain, error = %e, "failed to capture response html"),
            }
        }

        parse_scores(domain, &body)
    }
}

/// Write `body` to the first free `output_<n>.html` in `dir`.
async fn capture_html(dir: &Path, body: &str) -> Result<PathBuf, PageRankError> {
    tokio::fs::create_dir_all(dir).await?;

    let mut index = 1usize;
    loop {
        let path = dir.join(format!("output_{}.html", index));
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(mut file) => {
                use tokio::io::AsyncWriteExt;
                file.write_all(body.as_bytes()).await?;
                file.flush().await?;
                return Ok(path);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => index += 1,
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_client_creation() {
        let client = CheckPageRankClient::new();
        assert!(client.is_ok());
        assert_eq!(client.unwrap().endpoint(), DEFAULT_ENDPOINT);
    }

    #[tokio::test]
    async fn test_capture_html_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();

        let first = capture_html(dir.path(), "<html>1</html>").await.unwrap();
        let second = capture_html(dir.path(), "<html>2</html>").await.unwrap();

        assert_eq!(first, dir.path().join("output_1.html"));
        assert_eq!(second, dir.path().join("output_2.html"));
        assert_eq!(std::fs::read_to_string(first).unwrap(), "<html>1</html>");
    }
}
