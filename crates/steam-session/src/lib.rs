//! Per-account session orchestration
//!
//! The core of the account fetcher: drives one account from connect to a
//! terminal state against a black-box protocol transport, collecting the
//! account's standing, license entitlements and web API key along the way.
//!
//! Session lifecycle:
//! 1. Orchestrator dequeues a credential and builds a `Session`
//! 2. `RateGate` spaces the connection attempt against the previous one
//! 3. The pure state machine (`machine`) maps transport events to actions
//! 4. The runner executes actions against the `Transport` and
//!    `CredentialFetcher` seams and feeds completion events back in
//! 5. The session freezes into a `SessionOutcome` at Done/Failed
//!
//! Process-wide state (rate bookkeeping, the package metadata cache, the
//! aligned clock, the session counter) lives in `RunContext`. Sessions are
//! processed strictly one at a time, so the context needs interior
//! mutability but no real synchronization.

pub mod account;
pub mod cache;
pub mod error;
pub mod machine;
pub mod rate;
pub mod runner;
pub mod transport;

pub use account::{AccountResult, Credential, Entitlement};
pub use cache::{PackageCache, PackageMetadata};
pub use error::{Error, Result};
pub use machine::{Disposition, SessionAction, SessionEvent, SessionState, handle_event};
pub use rate::RateGate;
pub use runner::{RunContext, Session, SessionConfig, SessionOutcome};
pub use transport::{
    AccountStanding, AuthError, AuthTokens, BoxFuture, CodeSource, CredentialError,
    CredentialFetcher, LicenseGrant, MetadataError, Transport, TransportEvent,
};
