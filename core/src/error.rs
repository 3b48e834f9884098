use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A source record or collection does not have the expected shape.
    #[error("malformed document: {0}")]
    Format(String),

    /// A single-token accessor was handed a term that did not tokenize to exactly one token.
    #[error("term {term:?} must tokenize to exactly one token, got {tokens}")]
    InvalidTerm { term: String, tokens: usize },

    #[error("no index found at {0}, run build first")]
    NotFound(PathBuf),

    #[error("index format version {actual} is newer than supported version {expected}")]
    IncompatibleIndex { expected: u32, actual: u32 },

    #[error("index data is inconsistent: {0}")]
    Corrupt(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn format(msg: impl Into<String>) -> Self {
        Error::Format(msg.into())
    }

    /// True for errors caused by the caller's arguments rather than by storage.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Format(_) | Error::InvalidTerm { .. })
    }
}
