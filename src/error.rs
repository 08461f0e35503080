//! Error type shared by the engine, indexer, and seeker.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScoutError>;

/// Failures raised while reading or mutating the search index.
///
/// The engine adapter never wraps or recovers these; whatever the
/// indexer or seeker returns is handed to the caller as-is.
#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("index not found at {0}")]
    IndexNotFound(PathBuf),

    #[error("unsupported index schema version {0}")]
    UnsupportedSchema(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("index lock poisoned")]
    Poisoned,
}

impl ScoutError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_query(msg: impl Into<String>) -> Self {
        Self::InvalidQuery(msg.into())
    }
}
