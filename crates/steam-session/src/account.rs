//! Account data model
//!
//! `Credential` is what the roster hands each session; `AccountResult` is
//! what a finished session hands back. Results are populated incrementally
//! by state transitions and frozen when the session reaches Done/Failed.

use common::Secret;
use serde::{Deserialize, Serialize};

/// Login material for one account.
///
/// Owned by the roster and cloned by value into each session. Password and
/// shared secret are wrapped so Debug output stays clean.
#[derive(Debug, Clone)]
pub struct Credential {
    pub username: String,
    pub password: Secret<String>,
    pub shared_secret: Secret<String>,
}

impl Credential {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        shared_secret: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: Secret::new(password.into()),
            shared_secret: Secret::new(shared_secret.into()),
        }
    }
}

/// One granted package on the account.
///
/// Extended metadata is not stored here; it lives in the cross-account
/// package cache, keyed by `package_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlement {
    #[serde(rename = "packageid")]
    pub package_id: u32,
    /// Grant registration time, unix milliseconds.
    #[serde(rename = "registration_time")]
    pub registered_unix_millis: i64,
}

/// Everything collected for one account over one session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountResult {
    pub username: String,
    pub steam_id: u64,
    pub packages: Vec<Entitlement>,
    pub is_limited: bool,
    pub is_banned: bool,
    pub is_locked: bool,
    pub api_key: String,
}

impl AccountResult {
    pub fn for_account(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Self::default()
        }
    }

    /// A session succeeded when it resolved both an identity and a key.
    pub fn succeeded(&self) -> bool {
        self.steam_id != 0 && !self.api_key.is_empty()
    }

    /// Drop everything collected so far except the username.
    ///
    /// Applied when a session ends before both completion flags are set, so
    /// half-populated records never reach the results file.
    pub(crate) fn reset_partial(&mut self) {
        self.steam_id = 0;
        self.packages.clear();
        self.is_limited = false;
        self.is_banned = false;
        self.is_locked = false;
        self.api_key.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_debug_redacts_secrets() {
        let credential = Credential::new("alice", "hunter2", "c2VjcmV0");
        let debug = format!("{credential:?}");
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("c2VjcmV0"));
    }

    #[test]
    fn success_requires_identity_and_key() {
        let mut result = AccountResult::for_account("alice");
        assert!(!result.succeeded());

        result.steam_id = 76_561_198_000_000_001;
        assert!(!result.succeeded(), "key still missing");

        result.api_key = "ABCD1234000000000000000000000000".into();
        assert!(result.succeeded());
    }

    #[test]
    fn reset_partial_keeps_username_only() {
        let mut result = AccountResult {
            username: "alice".into(),
            steam_id: 42,
            packages: vec![Entitlement {
                package_id: 303_386,
                registered_unix_millis: 1_500_000_000_000,
            }],
            is_limited: true,
            is_banned: true,
            is_locked: true,
            api_key: "ABCD1234000000000000000000000000".into(),
        };

        result.reset_partial();

        assert_eq!(result.username, "alice");
        assert_eq!(result.steam_id, 0);
        assert!(result.packages.is_empty());
        assert!(!result.is_limited && !result.is_banned && !result.is_locked);
        assert!(result.api_key.is_empty());
    }

    #[test]
    fn result_serializes_with_wire_field_names() {
        let result = AccountResult {
            username: "alice".into(),
            steam_id: 1,
            packages: vec![Entitlement {
                package_id: 7,
                registered_unix_millis: 99,
            }],
            ..Default::default()
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"packageid\":7"));
        assert!(json.contains("\"registration_time\":99"));
    }
}
