//! Error types for batchpipe
//!
//! The taxonomy mirrors how failures are handled by the pipeline:
//! - [`FetchError`] - per-item network failures, retried by [`crate::retry`]
//! - [`TransformError`] - per-item decode/encode/write failures, never retried
//! - [`Error::Setup`] - fatal directory problems that abort a run before any task starts
//!
//! Task-level errors are converted into a [`crate::types::WorkResult`] at the pool
//! boundary; only setup and configuration errors reach the caller of a run.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for batchpipe operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for batchpipe
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "io_workers")
        key: Option<String>,
    },

    /// A required directory could not be created or read. Fatal for the run.
    #[error("setup failed for {path}: {source}")]
    Setup {
        /// The directory that could not be prepared
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Fetching a remote resource failed
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Transforming a file failed
    #[error("transform error: {0}")]
    Transform(#[from] TransformError),

    /// Every allowed attempt of a retried operation failed
    #[error("gave up after {attempts} attempt(s): {last_error}")]
    RetryExhausted {
        /// Number of attempts performed
        attempts: u32,
        /// Message of the last observed failure
        last_error: String,
    },

    /// The run was cancelled before the task could start or finish its retries
    #[error("cancelled before the item completed")]
    Cancelled,

    /// A task panicked; the panic was contained at the task boundary
    #[error("task panicked: {0}")]
    TaskPanicked(String),

    /// Serialization error (config files)
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Failures of a single fetch attempt
#[derive(Debug, Error)]
pub enum FetchError {
    /// The server answered with a non-success status
    #[error("HTTP {status} for {url}")]
    Status {
        /// HTTP status code
        status: u16,
        /// The requested URL
        url: String,
    },

    /// Transport-level failure (DNS, connect, reset, body read)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The attempt did not finish within its time budget
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The locator cannot be turned into a request
    #[error("invalid locator '{locator}': {reason}")]
    InvalidLocator {
        /// The offending locator
        locator: String,
        /// Why it was rejected
        reason: String,
    },

    /// Failed to persist the fetched bytes
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other failure reported by a fetcher implementation
    #[error("{0}")]
    Other(String),
}

/// Failures of the image transform chain
#[derive(Debug, Error)]
pub enum TransformError {
    /// Input could not be decoded as an image
    #[error("failed to decode {path}: {source}")]
    Decode {
        /// The input file
        path: PathBuf,
        /// Decoder error
        #[source]
        source: image::ImageError,
    },

    /// Output could not be encoded
    #[error("failed to encode {path}: {source}")]
    Encode {
        /// The output file
        path: PathBuf,
        /// Encoder error
        #[source]
        source: image::ImageError,
    },

    /// Reading the input or writing the output failed
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The file involved
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Create a configuration error for a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Machine-readable error code, used as a structured logging field
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Setup { .. } => "setup_error",
            Error::Io(_) => "io_error",
            Error::Fetch(e) => match e {
                FetchError::Status { .. } => "http_status",
                FetchError::Network(_) => "network_error",
                FetchError::Timeout(_) => "timeout",
                FetchError::InvalidLocator { .. } => "invalid_locator",
                FetchError::Io(_) => "io_error",
                FetchError::Other(_) => "fetch_error",
            },
            Error::Transform(e) => match e {
                TransformError::Decode { .. } => "decode_error",
                TransformError::Encode { .. } => "encode_error",
                TransformError::Io { .. } => "io_error",
            },
            Error::RetryExhausted { .. } => "retry_exhausted",
            Error::Cancelled => "cancelled",
            Error::TaskPanicked(_) => "task_panicked",
            Error::Serialization(_) => "serialization_error",
            Error::Other(_) => "internal_error",
        }
    }

    /// Whether this error must abort the whole run rather than a single item
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Setup { .. } | Error::Config { .. } | Error::Serialization(_)
        )
    }
}
