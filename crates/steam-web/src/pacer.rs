//! Web request pacing
//!
//! Community and store endpoints throttle aggressively, so every request
//! through the web tier is spaced out. One pacer is shared by all clients
//! in a run.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::debug;

/// Default spacing between web requests.
pub const DEFAULT_REQUEST_SPACING: Duration = Duration::from_secs(3);

/// Serializes and spaces web requests across clients.
#[derive(Debug)]
pub struct RequestPacer {
    spacing: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl Default for RequestPacer {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_SPACING)
    }
}

impl RequestPacer {
    pub fn new(spacing: Duration) -> Self {
        Self {
            spacing,
            last_request: Mutex::new(None),
        }
    }

    /// Wait until the spacing since the previous request has elapsed, then
    /// claim the current slot. The lock is held across the sleep so
    /// concurrent callers queue up.
    pub async fn pace(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let wait = self.spacing.saturating_sub(previous.elapsed());
            if !wait.is_zero() {
                debug!(wait_millis = wait.as_millis() as u64, "pacing web request");
                tokio::time::sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }
}
