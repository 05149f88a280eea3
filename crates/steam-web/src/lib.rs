//! Web tier for the account fetcher
//!
//! Everything that talks HTTP rather than the wire protocol: the
//! cookie-authenticated community/store client (API key retrieval and
//! registration, app name lookup), the platform time reference backing
//! guard clock alignment, and the shared request pacer.

pub mod client;
pub mod error;
pub mod pacer;
pub mod time;

pub use client::WebClient;
pub use error::{Error, Result};
pub use pacer::{DEFAULT_REQUEST_SPACING, RequestPacer};
pub use time::WebTimeReference;
