//! Error taxonomy for the record store, reader, aggregator and exporter.
//!
//! Two classes reach callers:
//!
//! - [`LogError::InvalidArgument`]: the request was rejected before any I/O
//!   (bad window, missing required field, bad or duplicate identifier).
//! - [`LogError::Storage`] / [`LogError::Serialization`]: the filesystem or
//!   the JSON encoder failed. Nothing is retried.
//!
//! Files that cannot be read back during aggregation are not errors; they
//! surface as [`crate::reader::ReadWarning`] values instead.

use std::path::PathBuf;

/// Result alias used by the core modules.
pub type LogResult<T> = Result<T, LogError>;

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("storage error at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LogError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// `true` for errors caused by the caller rather than the environment.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }
}
