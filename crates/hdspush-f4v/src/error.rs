//! Error types for hdspush-f4v.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for hdspush-f4v operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for decoding and splitting HDS files.
#[derive(Debug, Error)]
pub enum Error {
    /// A read would run past the end of the source.
    #[error("Truncated input at offset {offset}: need {needed} bytes, have {available}")]
    Truncated {
        offset: u64,
        needed: u64,
        available: u64,
    },

    /// A string table entry was not valid UTF-8.
    #[error("Invalid UTF-8 string at offset {offset}")]
    InvalidString { offset: u64 },

    /// The file does not contain the box type the caller requires.
    #[error("Format mismatch: {0}")]
    FormatMismatch(String),

    /// The boxes at a fragment offset are not `afra`, `abst`, `moof`, `mdat`.
    #[error("HDS fragment composition incorrect in {} at offset {offset}: {detail}", path.display())]
    FragmentComposition {
        path: PathBuf,
        offset: u64,
        detail: String,
    },

    /// A required companion file does not exist.
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Create a format mismatch error.
    pub fn format_mismatch(msg: impl Into<String>) -> Self {
        Self::FormatMismatch(msg.into())
    }

    /// Create a fragment composition error.
    pub fn composition(path: impl Into<PathBuf>, offset: u64, detail: impl Into<String>) -> Self {
        Self::FragmentComposition {
            path: path.into(),
            offset,
            detail: detail.into(),
        }
    }

    /// Whether this error was caused by running out of input.
    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::Truncated { .. })
    }
}
