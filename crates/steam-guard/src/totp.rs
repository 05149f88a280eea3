//! Steam Guard TOTP variant
//!
//! Standard RFC 6238 up to the truncation step, then the 31-bit value is
//! repeatedly divided by a 26-symbol alphabet instead of being reduced
//! modulo 10^6. The alphabet is digits 2-9 plus uppercase consonants with
//! the visually ambiguous letters removed, matching what the mobile
//! authenticator displays.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::error::{Error, Result};

/// Symbols a Steam Guard code is drawn from.
const CODE_ALPHABET: &[u8] = b"23456789BCDFGHJKMNPQRTVWXY";

/// Length of a generated code.
const CODE_LEN: usize = 5;

/// Seconds per code window.
const TIME_STEP_SECS: i64 = 30;

type HmacSha1 = Hmac<Sha1>;

/// Generate the Steam Guard code for the given unix time.
///
/// `shared_secret` is the standard-base64 secret from the account's
/// authenticator enrollment. The same secret and time window always yield
/// the same code; the window advances every 30 seconds.
pub fn generate_code(shared_secret: &str, unix_time_secs: i64) -> Result<String> {
    let trimmed = shared_secret.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidSecret("shared secret is empty".into()));
    }

    let key = STANDARD
        .decode(trimmed)
        .map_err(|e| Error::InvalidSecret(format!("base64 decode failed: {e}")))?;

    let window = (unix_time_secs / TIME_STEP_SECS) as u64;

    let mut mac = HmacSha1::new_from_slice(&key)
        .map_err(|e| Error::InvalidSecret(format!("unusable HMAC key: {e}")))?;
    mac.update(&window.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    // Dynamic truncation: low nibble of the last byte selects a 4-byte
    // big-endian slice, sign bit cleared.
    let offset = (digest[19] & 0xF) as usize;
    let mut value = u32::from_be_bytes([
        digest[offset] & 0x7F,
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]);

    let mut code = String::with_capacity(CODE_LEN);
    for _ in 0..CODE_LEN {
        let index = (value as usize) % CODE_ALPHABET.len();
        code.push(CODE_ALPHABET[index] as char);
        value /= CODE_ALPHABET.len() as u32;
    }

    Ok(code)
}
