//! Runtime error types.
//!
//! None of these ever reach content: the surface reports its own error
//! codes, and persistence failures are logged and absorbed.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use rte_kernel::domain::Element;
use rte_kernel::error_code::ErrorCode;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("I/O error while {operation} at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CacheError {
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("invalid backend endpoint '{endpoint}': {source}")]
    Endpoint {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl BackendError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            BackendError::Transport { .. } | BackendError::Unavailable(_) => true,
            BackendError::Status { status, .. } => matches!(status, 408 | 429 | 500..=599),
            BackendError::Endpoint { .. } | BackendError::Client(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error while reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("launch '{0}' already has a live session")]
    DuplicateLaunch(String),

    #[error("launch context rejected: {element:?} ({code})")]
    InvalidLaunch { element: Element, code: ErrorCode },

    #[error("session controller needs a tokio runtime")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
