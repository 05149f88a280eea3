//! Connection gating
//!
//! Consecutive connections are spaced out, and a platform rate-limit
//! response arms a one-shot penalty that is served before the next
//! connection. One gate is shared by every session in a run.

use std::time::{Duration, Instant};

use tracing::{info, warn};

/// Default spacing between consecutive connections.
pub const DEFAULT_MIN_SPACING: Duration = Duration::from_secs(30);

/// Default one-shot penalty after a platform rate-limit response.
pub const DEFAULT_PENALTY: Duration = Duration::from_secs(30 * 60);

/// Shared connection gate.
#[derive(Debug)]
pub struct RateGate {
    min_spacing: Duration,
    penalty: Duration,
    last_connection: Option<Instant>,
    penalty_pending: bool,
}

impl Default for RateGate {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SPACING, DEFAULT_PENALTY)
    }
}

impl RateGate {
    pub fn new(min_spacing: Duration, penalty: Duration) -> Self {
        Self {
            min_spacing,
            penalty,
            last_connection: None,
            penalty_pending: false,
        }
    }

    /// Wait required before the next connection as of `now`. Consumes a
    /// pending penalty.
    fn required_wait(&mut self, now: Instant) -> Duration {
        let mut wait = match self.last_connection {
            Some(last) => self.min_spacing.saturating_sub(now.duration_since(last)),
            None => Duration::ZERO,
        };
        if self.penalty_pending {
            wait += self.penalty;
            self.penalty_pending = false;
        }
        wait
    }

    /// Serve the gate before opening a connection.
    pub async fn before_connect(&mut self) {
        let wait = self.required_wait(Instant::now());
        if !wait.is_zero() {
            info!(wait_secs = wait.as_secs(), "waiting before next connection");
            tokio::time::sleep(wait).await;
        }
    }

    /// Record that a connection was established.
    pub fn on_connected(&mut self) {
        self.mark_connected(Instant::now());
    }

    // Timestamp never moves backwards.
    fn mark_connected(&mut self, at: Instant) {
        self.last_connection = Some(match self.last_connection {
            Some(previous) => previous.max(at),
            None => at,
        });
    }

    /// Arm the one-shot penalty after a platform rate-limit response.
    pub fn on_rate_limited(&mut self) {
        warn!(
            penalty_secs = self.penalty.as_secs(),
            "platform rate limit hit, next connection penalized"
        );
        self.penalty_pending = true;
    }

    pub fn penalty_pending(&self) -> bool {
        self.penalty_pending
    }
}
