//! Error types for session-support structures
//!
//! Session outcomes themselves never cross the session boundary as errors;
//! they surface as log entries and fields on the final `AccountResult`.
//! This type covers the file-backed package cache only.

/// Errors from package cache persistence.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("package cache parse error: {0}")]
    CacheParse(String),
}

/// Result alias for session-support operations.
pub type Result<T> = std::result::Result<T, Error>;
