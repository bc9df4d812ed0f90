//! Error types for the Marquee library.
//!
//! Filesystem failures are split into the transient class (retried inside
//! the resilient accessor and never surfaced unless retries run out) and
//! terminal failures that reach the caller.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the Marquee library.
#[derive(Debug, Error)]
pub enum MarqueeError {
    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// Optional cause description
        cause: Option<String>,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Rate limited by {service}, retry after {retry_after_secs:?} seconds")]
    RateLimited {
        service: String,
        retry_after_secs: Option<u64>,
    },

    #[error("Artwork catalog error: {message}")]
    Catalog {
        message: String,
        status_code: Option<u16>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Gave up on {path} after {attempts} attempts: {message}")]
    RetriesExhausted {
        path: PathBuf,
        attempts: u32,
        message: String,
    },

    #[error("Path is not a directory: {0}")]
    NotADirectory(PathBuf),

    // Library errors
    #[error("Media item not found: {folder} ({category})")]
    ItemNotFound { category: String, folder: String },

    #[error("{kind} artwork already exists for {folder}")]
    ArtworkPresent { folder: String, kind: String },

    #[error("Invalid image data: {message}")]
    InvalidImage { message: String },

    #[error("Ledger error: {message}")]
    Ledger { message: String },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Validation errors
    #[error("Invalid parameters: {message}")]
    InvalidParams { message: String },

    #[error("Operation cancelled")]
    Cancelled,

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for Marquee operations.
pub type Result<T> = std::result::Result<T, MarqueeError>;

impl From<std::io::Error> for MarqueeError {
    fn from(err: std::io::Error) -> Self {
        MarqueeError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for MarqueeError {
    fn from(err: serde_json::Error) -> Self {
        MarqueeError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for MarqueeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            MarqueeError::Timeout(std::time::Duration::from_secs(0))
        } else {
            MarqueeError::Network {
                message: err.to_string(),
                cause: err.status().map(|s| s.to_string()),
            }
        }
    }
}

impl From<image::ImageError> for MarqueeError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(e) => e.into(),
            other => MarqueeError::InvalidImage {
                message: other.to_string(),
            },
        }
    }
}

impl From<crate::cancel::CancelledError> for MarqueeError {
    fn from(_: crate::cancel::CancelledError) -> Self {
        MarqueeError::Cancelled
    }
}

impl MarqueeError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        MarqueeError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Convert to a JSON-RPC error code.
    ///
    /// Custom error codes (application-defined, -32000 to -32099):
    /// - -32000: Network/connectivity error
    /// - -32002: Media item not found
    /// - -32003: Artwork save failed
    /// - -32004: Cancelled
    /// - -32005: Validation error or refused mutation
    pub fn to_rpc_error_code(&self) -> i32 {
        match self {
            MarqueeError::Network { .. }
            | MarqueeError::Timeout(_)
            | MarqueeError::RateLimited { .. }
            | MarqueeError::Catalog { .. } => -32000,

            MarqueeError::ItemNotFound { .. } => -32002,

            MarqueeError::Io { .. } | MarqueeError::RetriesExhausted { .. } => -32003,

            MarqueeError::Cancelled => -32004,

            MarqueeError::ArtworkPresent { .. }
            | MarqueeError::InvalidImage { .. }
            | MarqueeError::InvalidParams { .. }
            | MarqueeError::NotADirectory(_) => -32005,

            _ => -32603,
        }
    }

    /// Check if a caller may reasonably try the operation again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MarqueeError::Network { .. }
                | MarqueeError::Timeout(_)
                | MarqueeError::RateLimited { .. }
                | MarqueeError::RetriesExhausted { .. }
        )
    }
}
