//! Error types for MedQuery-RS
//!
//! Only [`Error::InvalidInput`] ever crosses the orchestrator boundary. Source
//! failures are carried as data inside a `SourceResult`.

use thiserror::Error;

/// Errors surfaced to callers of the orchestrator
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// The query (or batch) was malformed
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

/// Failure of a single external source call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    /// Upstream answered 429
    #[error("rate limited by upstream")]
    RateLimited,

    #[error("HTTP error: {0}")]
    Http(u16),

    #[error("network error: {0}")]
    Network(String),

    #[error("failed to parse response: {0}")]
    Parse(String),

    /// Decision selected a source that has no registered client
    #[error("source is not configured")]
    NotConfigured,
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) if status.as_u16() == 429 => Self::RateLimited,
            Some(status) => Self::Http(status.as_u16()),
            None => Self::Network(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
