use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unrecognized date: {0}")]
    Parse(String),

    #[error("Vector dimension mismatch: index holds {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Index is empty")]
    IndexEmpty,

    #[error("Provider '{provider}' unavailable: {reason}")]
    ProviderUnavailable { provider: String, reason: String },

    #[error("Provider '{provider}' timed out after {after:?}")]
    Timeout { provider: String, after: Duration },

    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    #[error("Duplicate chunk id: {0}")]
    DuplicateChunk(String),

    #[error("Document already ingested: {0}")]
    DuplicateDocument(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Document could not be read: {0}")]
    Document(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Errors after which the next generation provider should be tried.
    pub fn is_provider_failure(&self) -> bool {
        matches!(self, Error::ProviderUnavailable { .. } | Error::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
