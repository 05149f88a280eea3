//! Error types for batch orchestration

/// Errors from batch-level operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] common::Error),

    #[error(transparent)]
    Cache(#[from] steam_session::Error),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("roster error: {0}")]
    Roster(String),
}

/// Result alias for batch operations.
pub type Result<T> = std::result::Result<T, Error>;
