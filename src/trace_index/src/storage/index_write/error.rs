//! Error types for index write operations.
//!
//! Suppressing a redundant write is never an error. Everything here is either
//! a caller mistake caught before any I/O, or a failure the store reported.

use thiserror::Error;

/// Result type for index write operations.
pub type IndexResult<T> = std::result::Result<T, IndexError>;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failures reported by the backing column store.
///
/// These are passed through to the caller unmodified; the write layer never
/// retries on its own.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The store did not acknowledge the write in time.
    #[error("write to '{table}' timed out: {message}")]
    Timeout {
        /// Table the write targeted.
        table: String,
        /// Driver-reported details.
        message: String,
    },

    /// No replica was able to accept the write.
    #[error("store unavailable: {message}")]
    Unavailable {
        /// Driver-reported details.
        message: String,
    },

    /// The store rejected the write on its write path.
    #[error("write to '{table}' failed: {message}")]
    WriteFailure {
        /// Table the write targeted.
        table: String,
        /// Driver-reported details.
        message: String,
    },

    /// The statement could not be prepared or bound.
    #[error("invalid statement: {message}")]
    InvalidStatement {
        /// Driver-reported details.
        message: String,
    },
}

impl StoreError {
    /// Whether re-issuing the same write may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Timeout { .. } | StoreError::Unavailable { .. }
        )
    }

    /// Create a timeout error.
    pub fn timeout(table: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::Timeout {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        StoreError::Unavailable {
            message: message.into(),
        }
    }

    /// Create a write failure error.
    pub fn write_failure(table: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::WriteFailure {
            table: table.into(),
            message: message.into(),
        }
    }
}

/// Errors that can occur while building or issuing index writes.
#[derive(Debug, Error)]
pub enum IndexError {
    /// A write candidate is malformed and was rejected before any I/O.
    #[error("invalid index write candidate: {message}")]
    InvalidCandidate {
        /// Description of what is wrong with the candidate.
        message: String,
    },

    /// The factory configuration is inconsistent.
    #[error("invalid index write configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration problem.
        message: String,
    },

    /// The store reported a failure for a permitted write.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Configuration could not be parsed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IndexError {
    /// Create an invalid candidate error.
    pub fn invalid_candidate(message: impl Into<String>) -> Self {
        IndexError::InvalidCandidate {
            message: message.into(),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        IndexError::InvalidConfig {
            message: message.into(),
        }
    }

    /// Whether the failure came from the store and may succeed on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            IndexError::Store(e) => e.is_transient(),
            _ => false,
        }
    }
}
