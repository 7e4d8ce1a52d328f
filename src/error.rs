//! Error types for filedrop
//!
//! This module provides the crate-wide error type, including:
//! - The per-job failure taxonomy (invalid source, transfer failure, liveness timeouts)
//! - Generic client-facing messages that never leak storage paths
//! - HTTP status code mapping for the upload endpoint

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for filedrop operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for filedrop
///
/// Per-job variants are caught at the job boundary and turned into a failure
/// message for the requesting client; they never terminate a session.
#[derive(Debug, Error)]
pub enum Error {
    /// Source reference is not a well-formed URI of the expected scheme
    #[error("invalid source {source_ref:?}: {reason}")]
    InvalidSource {
        /// The source reference as submitted by the client
        source_ref: String,
        /// Why the source was rejected
        reason: String,
    },

    /// Source could not be reached (connection failure or non-success status)
    #[error("source unreachable: {0}")]
    UnreachableSource(String),

    /// Source did not advertise a total length
    #[error("source {0} did not advertise a content length")]
    SizeUnknown(String),

    /// Transfer failed after it started
    #[error("transfer failed: {0}")]
    TransferFailed(#[source] Box<Error>),

    /// Identifier space collision retries exceeded
    #[error("no free identifier after {attempts} attempts")]
    Exhausted {
        /// Number of candidates generated before giving up
        attempts: u32,
    },

    /// Swarm metadata did not resolve in time
    #[error("swarm metadata not resolved within {0:?}")]
    MetadataTimeout(Duration),

    /// Swarm download made no progress for too long
    #[error("no swarm progress for {idle:?} ({completed} of {total} bytes)")]
    StalledTransfer {
        /// How long the transfer went without progress
        idle: Duration,
        /// Bytes completed when the stall was detected
        completed: u64,
        /// Total bytes expected
        total: u64,
    },

    /// Archiving a directory tree failed
    #[error("failed to archive {path}: {reason}")]
    Archive {
        /// The entry (or archive) that could not be processed
        path: PathBuf,
        /// The underlying failure
        reason: String,
    },

    /// The swarm engine reported a failure
    #[error("swarm engine error: {0}")]
    Swarm(String),

    /// Operation not supported by this build (e.g. no swarm engine compiled in)
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "ids.length")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP server error
    #[error("server error: {0}")]
    ApiServerError(String),
}

impl Error {
    /// Wrap a failure as [`Error::TransferFailed`], leaving already-wrapped errors alone.
    pub fn transfer_failed(cause: impl Into<Error>) -> Self {
        match cause.into() {
            wrapped @ Error::TransferFailed(_) => wrapped,
            other => Error::TransferFailed(Box::new(other)),
        }
    }

    /// Build an [`Error::InvalidSource`]
    pub fn invalid_source(source_ref: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidSource {
            source_ref: source_ref.into(),
            reason: reason.into(),
        }
    }

    /// Generic text sent to a client when its job fails.
    ///
    /// Deliberately coarse: paths and upstream error text stay in the logs.
    pub fn client_message(&self) -> &'static str {
        match self {
            Error::InvalidSource { .. } | Error::UnreachableSource(_) => "Bad url",
            Error::SizeUnknown(_) => "Bad url: unknown file size",
            Error::MetadataTimeout(_) => "Timed out waiting for torrent metadata",
            Error::StalledTransfer { .. } => "Torrent download stalled",
            Error::NotSupported(_) => "Torrent downloads are not available",
            Error::TransferFailed(cause) => match cause.as_ref() {
                Error::MetadataTimeout(_)
                | Error::StalledTransfer { .. }
                | Error::NotSupported(_)
                | Error::InvalidSource { .. } => cause.client_message(),
                _ => "Error downloading file",
            },
            _ => "Error downloading file",
        }
    }
}

/// API error response format
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "missing_file",
///     "message": "No file provided in 'file' field"
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "missing_file", "exhausted")
    pub code: String,

    /// Human-readable error message
    pub message: String,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input)
            Error::InvalidSource { .. } => 400,
            Error::Config { .. } => 400,

            // 411 Length Required - source must advertise its size
            Error::SizeUnknown(_) => 411,

            // 501 Not Implemented - Feature not compiled in
            Error::NotSupported(_) => 501,

            // 502 Bad Gateway - Upstream failures
            Error::UnreachableSource(_) => 502,
            Error::Swarm(_) => 502,

            // 503 Service Unavailable - Identifier space is saturated
            Error::Exhausted { .. } => 503,

            // 504 Gateway Timeout - Swarm liveness failures
            Error::MetadataTimeout(_) => 504,
            Error::StalledTransfer { .. } => 504,

            // 500 Internal Server Error - Server-side issues
            Error::TransferFailed(_) => 500,
            Error::Archive { .. } => 500,
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::InvalidSource { .. } => "invalid_source",
            Error::UnreachableSource(_) => "unreachable_source",
            Error::SizeUnknown(_) => "size_unknown",
            Error::TransferFailed(_) => "transfer_failed",
            Error::Exhausted { .. } => "exhausted",
            Error::MetadataTimeout(_) => "metadata_timeout",
            Error::StalledTransfer { .. } => "stalled_transfer",
            Error::Archive { .. } => "archive_error",
            Error::Swarm(_) => "swarm_error",
            Error::NotSupported(_) => "not_supported",
            Error::Config { .. } => "config_error",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "server_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        // Internal failures get a generic message; the full error is logged by the caller
        let message = match error.status_code() {
            500 => "internal server error".to_string(),
            _ => error.to_string(),
        };
        ApiError::new(error.error_code(), message)
    }
}
