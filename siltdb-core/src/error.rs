//! Error types for SiltDB

use thiserror::Error;

/// Result type alias for SiltDB operations
pub type Result<T> = std::result::Result<T, SiltError>;

/// SiltDB error types
#[derive(Error, Debug)]
pub enum SiltError {
    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Key not present in the index
    #[error("key not found")]
    NotFound,

    /// A record frame declared more bytes than are available
    #[error("truncated record: header declares {expected} bytes, {available} available")]
    TruncatedRecord { expected: u64, available: u64 },

    /// Unknown operation tag in a record header
    #[error("invalid record kind: {0:#04x}")]
    InvalidRecordKind(u8),

    /// Failure resolving or creating a log file location
    #[error("path error: {0}")]
    Path(String),
}

impl SiltError {
    /// Check if error indicates a damaged or incomplete frame
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            SiltError::TruncatedRecord { .. } | SiltError::InvalidRecordKind(_)
        )
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, SiltError::Io(_))
    }
}
