//! Errors raised while preparing headline data.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PrepError>;

#[derive(Debug, Error)]
pub enum PrepError {
    /// A required argument was missing or out of range for the requested mode.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A word or index was not present in the table it was looked up in.
    #[error("key not found: {0}")]
    KeyLookup(String),

    /// Malformed embedding text.
    #[error("malformed embedding file at line {line}: {message}")]
    Format { line: usize, message: String },

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PrepError {
    pub(crate) fn missing_word(word: &str) -> Self {
        PrepError::KeyLookup(format!("word {word:?}"))
    }

    pub(crate) fn missing_index(idx: usize) -> Self {
        PrepError::KeyLookup(format!("index {idx}"))
    }
}
