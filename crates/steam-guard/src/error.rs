//! Error types for two-factor code generation

/// Errors from Steam Guard code generation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid shared secret: {0}")]
    InvalidSecret(String),

    #[error("time reference query failed: {0}")]
    TimeQuery(String),
}

/// Result alias for Steam Guard operations.
pub type Result<T> = std::result::Result<T, Error>;
