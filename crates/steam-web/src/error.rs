//! Error types for the web tier

/// Errors from web endpoints.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("unexpected response: {0}")]
    Parse(String),

    #[error("web session not established")]
    NotAuthenticated,

    #[error("invalid logon material: {0}")]
    InvalidSession(String),
}

/// Result alias for web operations.
pub type Result<T> = std::result::Result<T, Error>;
