//! Error types for ArcVault core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in ArcVault core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] arcvault_storage::StorageError),

    /// Record codec error.
    #[error("codec error: {0}")]
    Codec(#[from] arcvault_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A metadata payload could not be serialized or parsed.
    #[error("metadata encoding error: {0}")]
    Json(#[from] serde_json::Error),

    /// A caller-supplied argument was rejected before any I/O.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },

    /// A storage locator string could not be parsed or does not belong to
    /// this repository.
    #[error("invalid locator {locator:?}: {message}")]
    InvalidLocator {
        /// The offending locator.
        locator: String,
        /// Description of the problem.
        message: String,
    },

    /// A record decoded cleanly but does not describe an artifact or an
    /// overlay.
    #[error("invalid record: {message}")]
    InvalidRecord {
        /// Description of the problem.
        message: String,
    },

    /// The captured bytes do not start with a parseable HTTP response head.
    #[error("invalid HTTP response: {message}")]
    InvalidHttpResponse {
        /// Description of the problem.
        message: String,
    },

    /// The configured digest algorithm is not supported.
    #[error("unsupported digest algorithm: {name}")]
    UnsupportedDigestAlgorithm {
        /// The name that was requested.
        name: String,
    },

    /// Another process holds the repository lock.
    #[error("repository locked: another process has exclusive access")]
    RepositoryLocked,
}

impl CoreError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an invalid locator error.
    pub fn invalid_locator(locator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidLocator {
            locator: locator.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid record error.
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }

    /// Creates an invalid HTTP response error.
    pub fn invalid_http(message: impl Into<String>) -> Self {
        Self::InvalidHttpResponse {
            message: message.into(),
        }
    }

    /// Returns true if retrying the operation may succeed.
    ///
    /// Only storage and I/O failures qualify; caller faults and corrupt
    /// records will fail again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_retryable(),
            Self::Io(_) => true,
            Self::Codec(e) => !e.is_corruption(),
            _ => false,
        }
    }
}
