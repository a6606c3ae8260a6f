//! Error types for the hdspush pipeline.

use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The sink rejected or failed to store an object.
    #[error("Upload of {name} failed: {message}")]
    Upload { name: String, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] hdspush_f4v::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn upload(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upload {
            name: name.into(),
            message: message.into(),
        }
    }
}
