//! Error handling for batch lookups.
//!
//! This module defines a single error type that covers configuration mistakes
//! (rejected before any request is made), per-domain fetch failures, and
//! persistence problems.

use crate::types::FailureReason;
use std::fmt;
use std::time::Duration;

/// Main error type for pagerank-check operations.
///
/// Only configuration-class variants ever abort a batch. Per-domain variants
/// are converted into a [`FailureReason`] and recorded in the batch report.
#[derive(Debug, Clone)]
pub enum PageRankError {
    /// Input could not be reduced to a first-level domain
    InvalidDomain { domain: String, reason: String },

    /// The scores endpoint answered with a non-success status, or the
    /// request never produced a response (`status` is `None`)
    TransportError {
        domain: String,
        status: Option<u16>,
        message: String,
    },

    /// The page had no results block, usually because the last request was
    /// less than 30 seconds ago
    NoResults { domain: String },

    /// Network-related errors that are not tied to a specific domain
    NetworkError {
        message: String,
        source: Option<String>,
    },

    /// The request outlived the client's configured timeout
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// The results block was present but could not be read
    ParseError { message: String },

    /// Configuration errors (invalid delay, malformed config file, etc.)
    ConfigError { message: String },

    /// `process()` was called on a batch with no domains left to dispatch
    EmptyBatch,

    /// `process()` was called on a batch that already ran
    AlreadyProcessed { state: String },

    /// A result sink could not persist a record
    SinkError { location: String, message: String },

    /// File I/O errors when reading domain lists
    FileError { path: String, message: String },

    /// Generic internal errors that don't fit other categories
    Internal { message: String },
}

impl PageRankError {
    /// Create a new invalid domain error.
    pub fn invalid_domain<D: Into<String>, R: Into<String>>(domain: D, reason: R) -> Self {
        Self::InvalidDomain {
            domain: domain.into(),
            reason: reason.into(),
        }
    }

    /// Create a transport error carrying the HTTP status of the response.
    pub fn transport<D: Into<String>, M: Into<String>>(
        domain: D,
        status: Option<u16>,
        message: M,
    ) -> Self {
        Self::TransportError {
            domain: domain.into(),
            status,
            message: message.into(),
        }
    }

    /// Create a new no-results error.
    pub fn no_results<D: Into<String>>(domain: D) -> Self {
        Self::NoResults {
            domain: domain.into(),
        }
    }

    /// Create a new network error with source information.
    pub fn network_with_source<M: Into<String>, S: Into<String>>(message: M, source: S) -> Self {
        Self::NetworkError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a new timeout error.
    pub fn timeout<O: Into<String>>(operation: O, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a new parse error.
    pub fn parse<M: Into<String>>(message: M) -> Self {
        Self::ParseError {
            message: message.into(),
        }
    }

    /// Create a new configuration error.
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new sink error.
    pub fn sink<L: Into<String>, M: Into<String>>(location: L, message: M) -> Self {
        Self::SinkError {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Create a new file error.
    pub fn file_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::FileError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Classify a fetch error into the reason recorded in a batch report.
    pub fn to_failure_reason(&self) -> FailureReason {
        match self {
            Self::InvalidDomain { reason, .. } => FailureReason::InvalidDomain {
                message: reason.clone(),
            },
            Self::TransportError {
                status, message, ..
            } => FailureReason::TransportError {
                status: *status,
                message: message.clone(),
            },
            Self::NetworkError { .. } | Self::Timeout { .. } => FailureReason::TransportError {
                status: None,
                message: self.to_string(),
            },
            // A page we cannot read is treated like an empty results page
            Self::NoResults { .. } | Self::ParseError { .. } => FailureReason::NoResults,
            other => FailureReason::Internal {
                message: other.to_string(),
            },
        }
    }
}

impl fmt::Display for PageRankError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDomain { domain, reason } => {
                write!(f, "Invalid domain '{}': {}", domain, reason)
            }
            Self::TransportError {
                domain,
                status,
                message,
            } => {
                if let Some(code) = status {
                    write!(
                        f,
                        "Error while contacting checkpagerank.net for '{}' (HTTP {}): {}",
                        domain, code, message
                    )
                } else {
                    write!(
                        f,
                        "Error while contacting checkpagerank.net for '{}': {}",
                        domain, message
                    )
                }
            }
            Self::NoResults { domain } => write!(
                f,
                "No results found for '{}', likely because more than one request was made in 30s",
                domain
            ),
            Self::NetworkError { message, source } => {
                if let Some(source) = source {
                    write!(f, "Network error: {} (source: {})", message, source)
                } else {
                    write!(f, "Network error: {}", message)
                }
            }
            Self::Timeout {
                operation,
                duration,
            } => {
                write!(f, "Timeout after {:?} during: {}", duration, operation)
            }
            Self::ParseError { message } => {
                write!(f, "Parse error: {}", message)
            }
            Self::ConfigError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            Self::EmptyBatch => write!(f, "Batch contains no domains to check"),
            Self::AlreadyProcessed { state } => {
                write!(f, "Batch has already been processed (state: {})", state)
            }
            Self::SinkError { location, message } => {
                write!(f, "Failed to store result at '{}': {}", location, message)
            }
            Self::FileError { path, message } => {
                write!(f, "File error at '{}': {}", path, message)
            }
            Self::Internal { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for PageRankError {}

impl From<serde_json::Error> for PageRankError {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError {
            message: format!("JSON serialization failed: {}", err),
        }
    }
}

impl From<std::io::Error> for PageRankError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal {
            message: format!("I/O error: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_reason_mapping() {
        let err = PageRankError::transport("example.com", Some(503), "Service Unavailable");
        assert_eq!(
            err.to_failure_reason(),
            FailureReason::TransportError {
                status: Some(503),
                message: "Service Unavailable".to_string()
            }
        );

        let err = PageRankError::no_results("example.com");
        assert_eq!(err.to_failure_reason(), FailureReason::NoResults);

        let err = PageRankError::parse("missing separator");
        assert_eq!(err.to_failure_reason(), FailureReason::NoResults);

        let err = PageRankError::invalid_domain("co.uk", "public suffix");
        assert_eq!(err.to_failure_reason().code(), "invalid-domain");

        let err = PageRankError::timeout("HTTP request", Duration::from_secs(20));
        assert!(matches!(
            err.to_failure_reason(),
            FailureReason::TransportError { status: None, .. }
        ));
    }

    #[test]
    fn test_timeout_reports_configured_duration() {
        let err = PageRankError::timeout("lookup for 'example.com'", Duration::from_secs(5));
        assert_eq!(
            err.to_string(),
            "Timeout after 5s during: lookup for 'example.com'"
        );
    }

    #[test]
    fn test_display_messages() {
        let err = PageRankError::transport("example.com", Some(500), "Internal Server Error");
        assert!(err.to_string().contains("HTTP 500"));

        let err = PageRankError::no_results("example.com");
        assert!(err.to_string().contains("30s"));
    }
}
