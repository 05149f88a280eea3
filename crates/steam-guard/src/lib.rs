//! Steam Guard two-factor code generation
//!
//! Produces the 5-character time-windowed codes the platform expects during
//! the credentials handshake. Codes are derived from a per-account shared
//! secret and the *server's* notion of time, so the crate also maintains a
//! process-wide clock aligned against a remote time reference.
//!
//! Code flow:
//! 1. Session asks its `TwoFactorGenerator` for a code
//! 2. `GuardClock` lazily aligns against the `TimeReference` (once per
//!    process; retried on the next request if the query fails)
//! 3. `totp::generate_code()` derives the code for the current 30s window

pub mod clock;
pub mod error;
pub mod generator;
pub mod totp;

pub use clock::{GuardClock, TimeReference};
pub use error::{Error, Result};
pub use generator::TwoFactorGenerator;
pub use totp::generate_code;
