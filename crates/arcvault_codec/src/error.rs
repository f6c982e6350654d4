//! Error types for the codec crate.

use std::io;
use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while encoding or decoding records.
#[derive(Error, Debug)]
pub enum CodecError {
    /// The underlying reader or writer failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The record does not start with the expected version line.
    #[error("invalid version line at offset {offset}")]
    InvalidVersionLine {
        /// Offset of the record in the stream.
        offset: u64,
    },

    /// A header line is not of the form `Name: Value`, or a name or value
    /// contains characters that cannot be framed.
    #[error("invalid header: {message}")]
    InvalidHeader {
        /// Description of the problem.
        message: String,
    },

    /// A mandatory header is absent.
    #[error("missing mandatory header {name}")]
    MissingHeader {
        /// Header name.
        name: &'static str,
    },

    /// A header value could not be interpreted.
    #[error("invalid value for header {name}: {value:?}")]
    InvalidHeaderValue {
        /// Header name.
        name: &'static str,
        /// The offending value.
        value: String,
    },

    /// The record type is neither `response` nor `metadata`.
    #[error("unsupported record type {value:?}")]
    UnsupportedRecordType {
        /// The type value found in the header.
        value: String,
    },

    /// The header block exceeds the maximum size.
    #[error("header block at offset {offset} exceeds {limit} bytes")]
    HeaderTooLarge {
        /// Offset of the record in the stream.
        offset: u64,
        /// Maximum header block size.
        limit: usize,
    },

    /// The stream ended inside a record.
    #[error("record at offset {offset} is truncated")]
    Truncated {
        /// Offset of the record in the stream.
        offset: u64,
    },

    /// The payload is not followed by the record trailer.
    #[error("record at offset {offset} is missing its trailer")]
    MissingTrailer {
        /// Offset of the record in the stream.
        offset: u64,
    },
}

impl CodecError {
    /// Creates an invalid header error.
    pub fn invalid_header(message: impl Into<String>) -> Self {
        Self::InvalidHeader {
            message: message.into(),
        }
    }

    /// Returns true if the error describes damaged record bytes rather than
    /// a failing reader or writer.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}
