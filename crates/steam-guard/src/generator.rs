//! Per-account code generator over the shared clock

use std::sync::Arc;

use common::Secret;
use tokio::sync::Mutex;

use crate::clock::{GuardClock, TimeReference};
use crate::error::Result;
use crate::totp;

/// Binds one account's shared secret to the process-wide aligned clock.
///
/// The transport asks for a fresh code whenever the platform requests one
/// during the handshake; every request regenerates from the latest aligned
/// time rather than reusing a previous code.
pub struct TwoFactorGenerator {
    shared_secret: Secret<String>,
    clock: Arc<Mutex<GuardClock>>,
    reference: Arc<dyn TimeReference>,
}

impl TwoFactorGenerator {
    pub fn new(
        shared_secret: Secret<String>,
        clock: Arc<Mutex<GuardClock>>,
        reference: Arc<dyn TimeReference>,
    ) -> Self {
        Self {
            shared_secret,
            clock,
            reference,
        }
    }

    /// Code for the current time window.
    pub async fn current_code(&self) -> Result<String> {
        let now = {
            let mut clock = self.clock.lock().await;
            clock.now(self.reference.as_ref()).await
        };
        totp::generate_code(self.shared_secret.expose(), now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::future::Future;
    use std::pin::Pin;

    struct LocalReference;

    impl TimeReference for LocalReference {
        fn server_time(&self) -> Pin<Box<dyn Future<Output = Result<i64>> + Send + '_>> {
            let now = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_secs() as i64;
            Box::pin(async move { Ok(now) })
        }
    }

    #[tokio::test]
    async fn generates_code_for_current_window() {
        let generator = TwoFactorGenerator::new(
            Secret::new("MDEyMzQ1Njc4OWFiY2RlZmdoaWo=".to_string()),
            Arc::new(Mutex::new(GuardClock::new())),
            Arc::new(LocalReference),
        );
        let code = generator.current_code().await.unwrap();
        assert_eq!(code.len(), 5);
    }

    #[tokio::test]
    async fn invalid_secret_surfaces_error() {
        let generator = TwoFactorGenerator::new(
            Secret::new("@@not-base64@@".to_string()),
            Arc::new(Mutex::new(GuardClock::new())),
            Arc::new(LocalReference),
        );
        let result = generator.current_code().await;
        assert!(matches!(result, Err(Error::InvalidSecret(_))));
    }
}
