//! External collaborator seams
//!
//! The wire protocol is not implemented here. `Transport` is the black-box
//! connection to the platform (connect, handshake, typed events, product
//! info RPC); `CredentialFetcher` is the authenticated web tier reachable
//! once a session is logged on. Both use `Pin<Box<dyn Future>>` return
//! types for dyn-compatibility, so the runner can be driven by scripted
//! implementations in tests.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use tracing::error;

/// Boxed future alias used across the collaborator traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One granted package delivered with the license list.
#[derive(Debug, Clone)]
pub struct LicenseGrant {
    pub package_id: u32,
    /// Grant registration time, unix milliseconds.
    pub registered_unix_millis: i64,
    /// Access token for the product info request.
    pub access_token: u64,
}

/// Account standing flags delivered out-of-band after logon.
#[derive(Debug, Clone, Copy)]
pub struct AccountStanding {
    pub limited: bool,
    pub banned: bool,
    pub locked: bool,
}

/// Typed events delivered by the transport.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    Connected,
    Disconnected { user_initiated: bool },
    LoggedOn { ok: bool, steam_id: u64 },
    LoggedOff { rate_limited: bool },
    LicenseList { grants: Vec<LicenseGrant> },
    Standing(AccountStanding),
}

/// Why the credentials handshake failed.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("connection attempts throttled by the platform")]
    RateLimited,

    #[error("authentication poll timed out")]
    Timeout,

    #[error("authentication denied: {0}")]
    Denied(String),
}

/// Tokens issued by a successful credentials handshake.
#[derive(Debug, Clone)]
pub struct AuthTokens {
    pub steam_id: u64,
    /// Bearer token for the web tier.
    pub access_token: String,
    /// Token used to resume the connection session.
    pub refresh_token: String,
}

/// Errors from the product info RPC.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("product info request timed out")]
    Timeout,

    #[error("product info incomplete: {0}")]
    Incomplete(String),
}

/// Source of fresh two-factor codes.
///
/// The platform may ask several times during one handshake; every call must
/// regenerate for the current time window. A request is not an error
/// signal.
pub trait CodeSource: Send + Sync {
    fn device_code(&self) -> BoxFuture<'_, String>;
}

impl CodeSource for steam_guard::TwoFactorGenerator {
    fn device_code(&self) -> BoxFuture<'_, String> {
        Box::pin(async move {
            match self.current_code().await {
                Ok(code) => code,
                Err(e) => {
                    error!(error = %e, "unable to generate device code");
                    String::new()
                }
            }
        })
    }
}

/// Black-box protocol connection to the platform.
///
/// One instance per session. `poll_event` drains at most one pending event;
/// the runner polls it in a fixed-interval loop. `disconnect` is expected
/// to surface as a `Disconnected { user_initiated: true }` event.
pub trait Transport: Send {
    fn connect(&mut self) -> BoxFuture<'_, ()>;

    fn disconnect(&mut self) -> BoxFuture<'_, ()>;

    /// Next pending event, if any.
    fn poll_event(&mut self) -> BoxFuture<'_, Option<TransportEvent>>;

    /// Credentials + two-factor handshake. `codes` is invoked whenever the
    /// platform requests a device code.
    fn authenticate<'a>(
        &'a mut self,
        username: &'a str,
        password: &'a str,
        codes: &'a dyn CodeSource,
    ) -> BoxFuture<'a, Result<AuthTokens, AuthError>>;

    /// Resume the connection session with the issued refresh token; the
    /// outcome arrives as a `LoggedOn` event.
    fn resume_session<'a>(
        &'a mut self,
        username: &'a str,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, ()>;

    /// Batched product-info RPC for one package.
    fn package_metadata(
        &mut self,
        package_id: u32,
        access_token: u64,
    ) -> BoxFuture<'_, Result<serde_json::Map<String, serde_json::Value>, MetadataError>>;
}

/// Error from a web credential operation.
///
/// Deliberately unstructured: web failures are terminal for the session and
/// surface only in logs and result flags.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct CredentialError(pub String);

/// Session-scoped web credential operations, reachable once logged on.
pub trait CredentialFetcher: Send {
    /// Establish the authenticated web context for this session.
    fn authenticate<'a>(
        &'a mut self,
        steam_id: u64,
        access_token: &'a str,
    ) -> BoxFuture<'a, Result<(), CredentialError>>;

    /// Retrieve (or register) the account's web API key.
    fn fetch_api_key(&mut self) -> BoxFuture<'_, Result<(bool, String), CredentialError>>;

    /// Resolve display names for a batch of app ids.
    fn app_names<'a>(
        &'a mut self,
        app_ids: &'a [u32],
    ) -> BoxFuture<'a, Result<HashMap<u32, String>, CredentialError>>;
}
