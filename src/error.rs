//! Error types for the generation gateway.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// What went wrong with a generation call, as reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Timeout,
    InvalidResponse,
    EmptyResponse,
    ConfigError,
    Upstream,
    DownloadFailed,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::InvalidResponse => "invalid_response",
            ErrorKind::EmptyResponse => "empty_response",
            ErrorKind::ConfigError => "config_error",
            ErrorKind::Upstream => "upstream",
            ErrorKind::DownloadFailed => "download_failed",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tagged failure returned by every gateway and poller operation.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{kind}: {detail}")]
pub struct GenerationError {
    pub kind: ErrorKind,
    pub detail: String,
}

pub type GenerationResult<T> = Result<T, GenerationError>;

impl GenerationError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(
            ErrorKind::Timeout,
            format!("generation timed out after {} seconds", after.as_secs()),
        )
    }

    pub fn invalid_response(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidResponse, detail)
    }

    pub fn empty_response(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::EmptyResponse, detail)
    }

    pub fn upstream(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Upstream, detail)
    }

    pub fn download_failed(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::DownloadFailed, detail)
    }

    pub fn cancelled(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, detail)
    }

    /// Whether an end user may simply try again.
    pub fn is_retryable(&self) -> bool {
        !matches!(self.kind, ErrorKind::ConfigError | ErrorKind::Cancelled)
    }
}

/// Failure reported by a model client before classification.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("API key not configured")]
    MissingCredential,

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("network error: {0}")]
    Network(reqwest::Error),

    #[error("{0}")]
    Other(String),
}

// reqwest errors print the request URL, which can carry credentials
impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        UpstreamError::Network(err.without_url())
    }
}

impl From<UpstreamError> for GenerationError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::MissingCredential => {
                GenerationError::new(ErrorKind::ConfigError, err.to_string())
            }
            UpstreamError::Malformed(_) => GenerationError::invalid_response(err.to_string()),
            UpstreamError::Network(ref e) if e.is_decode() => {
                GenerationError::invalid_response(err.to_string())
            }
            other => GenerationError::upstream(other.to_string()),
        }
    }
}
