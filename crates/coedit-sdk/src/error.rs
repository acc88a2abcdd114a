//! Error types for the coedit SDK.

use coedit_text::TextError;
use thiserror::Error;

/// Error type for SDK operations.
///
/// None of these are fatal to the editing core: a failed operation is
/// logged and the next input, document change or awareness change tries
/// again.
#[derive(Error, Debug)]
pub enum SdkError {
    #[error("Document error: {0}")]
    Document(#[from] TextError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Persistence error: {0}")]
    Persistence(#[from] std::io::Error),

    #[error("Editor is not live")]
    NotLive,
}

/// Result type for SDK operations.
pub type Result<T> = std::result::Result<T, SdkError>;
