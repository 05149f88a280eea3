//! Roster-driven batch fetcher
//!
//! Ties the other crates together: loads the configuration, the credential
//! roster, the results log and the package cache, then runs one session
//! per account with shared throttling state. The embedding binary supplies
//! the wire protocol transport and web client via factories.

pub mod batch;
pub mod config;
pub mod error;
pub mod results;
pub mod roster;

pub use batch::{BatchRunner, RunSummary, web_time_reference};
pub use config::{AuthFailurePolicy, FetcherConfig};
pub use error::{Error, Result};
pub use results::ResultsLog;
pub use roster::{ROSTER_HEADER, Roster};

use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Install the process-wide tracing subscriber. Honors `LOG_LEVEL` and
/// `RUST_LOG`, defaulting to `info`.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
