//! Error types for splitpoint-format.
//!
//! Two tiers exist. [`FormatError`] describes why a strategy could not fully
//! parse a file; it never escapes `parse_metadata` and is instead carried in
//! [`ParseOutcome::Degraded`](crate::ParseOutcome::Degraded). [`Error`] is
//! what the manager returns when a file cannot be handled at all.

use std::io;
use thiserror::Error;

/// Result type for splitpoint-format operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for manager-level operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error occurred while reading the source.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No registered strategy recognised the content or the file name.
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// Requested byte range is empty or inverted.
    #[error("Invalid byte range: {start}..{end}")]
    InvalidRange { start: u64, end: u64 },
}

impl Error {
    /// Create an unsupported format error.
    pub fn unsupported(name: impl Into<String>) -> Self {
        Self::UnsupportedFormat(name.into())
    }
}

/// Why a strategy fell back to degraded metadata.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum FormatError {
    /// No MPEG frame header was found in the search window.
    #[error("no valid MPEG frame header within {searched} bytes")]
    NoFrameSync { searched: usize },

    /// The container signature did not match.
    #[error("invalid {0} signature")]
    InvalidSignature(String),

    /// Buffer ended before a required structure was complete.
    #[error("truncated data: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },

    /// A chunk required for timing information is absent.
    #[error("missing required chunk: {0}")]
    MissingChunk(String),

    /// Reading from the source failed part way through parsing.
    #[error("read failed: {0}")]
    Read(String),
}

impl From<io::Error> for FormatError {
    fn from(err: io::Error) -> Self {
        Self::Read(err.to_string())
    }
}
