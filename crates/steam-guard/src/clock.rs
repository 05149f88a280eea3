//! Clock alignment against the platform's time reference
//!
//! Code windows are computed from the server's clock, not the local one.
//! `GuardClock` queries a `TimeReference` on first use, caches the offset
//! for the rest of the process, and falls back to the local clock (retrying
//! on the next request) when the query fails. Generation never hard-fails
//! on an alignment failure.

use std::future::Future;
use std::pin::Pin;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use crate::error::Result;

/// Remote source of the platform's current unix time.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn TimeReference>` shared across sessions).
pub trait TimeReference: Send + Sync {
    /// Current unix time in seconds according to the remote platform.
    fn server_time(&self) -> Pin<Box<dyn Future<Output = Result<i64>> + Send + '_>>;
}

/// Process-wide clock with a cached server offset.
///
/// Alignment state transitions exactly once from pending to aligned; after
/// that no further network calls are made for the process lifetime.
#[derive(Debug, Default)]
pub struct GuardClock {
    offset_secs: i64,
    aligned: bool,
}

impl GuardClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a successful alignment has happened.
    pub fn is_aligned(&self) -> bool {
        self.aligned
    }

    /// Adjusted unix time, aligning lazily on first use.
    ///
    /// A failed alignment logs a warning and leaves the clock pending, so
    /// the next call retries; the returned time is then the unadjusted
    /// local clock.
    pub async fn now(&mut self, reference: &dyn TimeReference) -> i64 {
        if !self.aligned {
            match reference.server_time().await {
                Ok(server) => {
                    self.offset_secs = server - local_unix_time();
                    self.aligned = true;
                    debug!(offset_secs = self.offset_secs, "clock aligned to server time");
                }
                Err(e) => {
                    warn!(error = %e, "time alignment failed, falling back to local clock");
                }
            }
        }
        local_unix_time() + self.offset_secs
    }
}

fn local_unix_time() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fake reference returning a fixed server time, counting queries.
    struct FixedReference {
        server_time: std::result::Result<i64, String>,
        calls: AtomicU32,
    }

    impl FixedReference {
        fn ok(server_time: i64) -> Self {
            Self {
                server_time: Ok(server_time),
                calls: AtomicU32::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                server_time: Err("unreachable".into()),
                calls: AtomicU32::new(0),
            }
        }
    }

    impl TimeReference for FixedReference {
        fn server_time(&self) -> Pin<Box<dyn Future<Output = Result<i64>> + Send + '_>> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            let result = self
                .server_time
                .clone()
                .map_err(Error::TimeQuery);
            Box::pin(async move { result })
        }
    }

    #[tokio::test]
    async fn aligns_once_and_caches_offset() {
        let reference = FixedReference::ok(local_unix_time() + 1000);
        let mut clock = GuardClock::new();

        let first = clock.now(&reference).await;
        let second = clock.now(&reference).await;

        assert!(clock.is_aligned());
        assert_eq!(reference.calls.load(Ordering::Relaxed), 1, "one query only");
        // Offset of ~1000s applied to both reads
        assert!((first - local_unix_time() - 1000).abs() <= 2);
        assert!((second - local_unix_time() - 1000).abs() <= 2);
    }

    #[tokio::test]
    async fn failed_alignment_retries_on_next_request() {
        let reference = FixedReference::failing();
        let mut clock = GuardClock::new();

        let time = clock.now(&reference).await;
        assert!(!clock.is_aligned());
        // Falls back to the local clock
        assert!((time - local_unix_time()).abs() <= 2);

        clock.now(&reference).await;
        assert_eq!(
            reference.calls.load(Ordering::Relaxed),
            2,
            "pending alignment retried lazily"
        );
    }

    #[tokio::test]
    async fn alignment_failure_does_not_block_time_reads() {
        let reference = FixedReference::failing();
        let mut clock = GuardClock::new();
        let time = clock.now(&reference).await;
        assert!(time > 0);
    }
}
