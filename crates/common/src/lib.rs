//! Shared types for the account fetcher workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
