//! Wrapper for account passwords and shared secrets
//!
//! Credentials travel through the roster, the session and the transport.
//! Wrapping them keeps plaintext out of Debug output and log lines, and
//! zeroizes the backing memory when a session's copy is dropped.

use std::fmt;
use zeroize::Zeroize;

/// Sensitive value - redacted in Debug/Display/logs
pub struct Secret<T: Zeroize>(T);

impl<T: Zeroize> Secret<T> {
    /// Wrap a sensitive value
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Expose the inner value (use sparingly)
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl<T: Zeroize> From<T> for Secret<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> Drop for Secret<T> {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl<T: Zeroize + Clone> Clone for Secret<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_password() {
        let password = Secret::new(String::from("hunter2"));
        let debug = format!("{password:?}");
        assert_eq!(debug, "[REDACTED]");
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn expose_returns_inner_value() {
        let secret = Secret::new(String::from("c2hhcmVkLXNlY3JldA=="));
        assert_eq!(secret.expose(), "c2hhcmVkLXNlY3JldA==");
    }

    #[test]
    fn from_string_wraps() {
        let secret: Secret<String> = String::from("p4ss").into();
        assert_eq!(secret.expose(), "p4ss");
    }
}
