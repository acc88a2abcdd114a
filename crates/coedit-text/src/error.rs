//! Error types for the replicated text layer.

use thiserror::Error;

/// Errors that can occur while mutating or decoding a text document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TextError {
    #[error("Delta reaches past the end of the text: {index} (length: {length})")]
    IndexOutOfBounds { index: usize, length: usize },

    #[error("Malformed update: {0}")]
    MalformedUpdate(String),
}

impl From<serde_json::Error> for TextError {
    fn from(err: serde_json::Error) -> Self {
        TextError::MalformedUpdate(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TextError>;
