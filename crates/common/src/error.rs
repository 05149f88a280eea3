//! Shared error type for configuration and file handling

use thiserror::Error;

/// Errors raised while loading configuration or account files.
///
/// These are the fatal, pre-session failures: if the roster, results file
/// or TOML config cannot be read, the batch must not start.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result alias using the shared Error
pub type Result<T> = std::result::Result<T, Error>;
