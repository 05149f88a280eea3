//! Configuration loading
//!
//! Everything is optional in the TOML: an empty file yields the stock
//! behavior (30s connection spacing, 30min rate-limit penalty, 3s web
//! request spacing, failed accounts dropped from the roster).

use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use steam_session::{RateGate, SessionConfig};
use steam_web::RequestPacer;

/// Root configuration for one fetcher run.
#[derive(Debug, Deserialize, Default)]
pub struct FetcherConfig {
    #[serde(default)]
    pub files: FilesConfig,
    #[serde(default)]
    pub throttle: ThrottleConfig,
    #[serde(default)]
    pub session: SessionTuning,
    /// What happens to an account whose session fails.
    #[serde(default)]
    pub auth_failure_policy: AuthFailurePolicy,
}

/// On-disk locations.
#[derive(Debug, Deserialize)]
pub struct FilesConfig {
    #[serde(default = "default_roster")]
    pub roster: PathBuf,
    #[serde(default = "default_results")]
    pub results: PathBuf,
    #[serde(default = "default_package_cache")]
    pub package_cache: PathBuf,
}

/// Cross-run throttling knobs.
#[derive(Debug, Deserialize)]
pub struct ThrottleConfig {
    #[serde(default = "default_connect_spacing")]
    pub connect_spacing_secs: u64,
    #[serde(default = "default_penalty")]
    pub rate_limit_penalty_secs: u64,
    #[serde(default = "default_web_spacing")]
    pub web_request_spacing_secs: u64,
}

/// Per-session tuning.
#[derive(Debug, Deserialize)]
pub struct SessionTuning {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_metadata_delay")]
    pub metadata_fetch_delay_secs: u64,
    #[serde(default = "default_max_reconnects")]
    pub max_reconnects: u32,
    /// Product info attempts per package; absent means retry until the
    /// endpoint stops timing out.
    #[serde(default)]
    pub metadata_fetch_attempts: Option<u32>,
}

/// Disposition of a failed account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthFailurePolicy {
    /// Remove from the roster and record the failed result.
    #[default]
    Drop,
    /// Put back at the end of the roster for one more try this run.
    Requeue,
}

fn default_roster() -> PathBuf {
    PathBuf::from("accounts.csv")
}

fn default_results() -> PathBuf {
    PathBuf::from("result.json")
}

fn default_package_cache() -> PathBuf {
    PathBuf::from("packages_info.json")
}

fn default_connect_spacing() -> u64 {
    30
}

fn default_penalty() -> u64 {
    30 * 60
}

fn default_web_spacing() -> u64 {
    3
}

fn default_poll_interval() -> u64 {
    1
}

fn default_metadata_delay() -> u64 {
    1
}

fn default_max_reconnects() -> u32 {
    10
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            roster: default_roster(),
            results: default_results(),
            package_cache: default_package_cache(),
        }
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            connect_spacing_secs: default_connect_spacing(),
            rate_limit_penalty_secs: default_penalty(),
            web_request_spacing_secs: default_web_spacing(),
        }
    }
}

impl Default for SessionTuning {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            metadata_fetch_delay_secs: default_metadata_delay(),
            max_reconnects: default_max_reconnects(),
            metadata_fetch_attempts: None,
        }
    }
}

impl FetcherConfig {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: FetcherConfig = toml::from_str(&contents)?;

        if config.session.max_reconnects == 0 {
            return Err(common::Error::Config(
                "max_reconnects must be greater than 0".into(),
            ));
        }

        if config.session.metadata_fetch_attempts == Some(0) {
            return Err(common::Error::Config(
                "metadata_fetch_attempts must be greater than 0 when set".into(),
            ));
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("steam-fetcher.toml")
    }

    pub fn rate_gate(&self) -> RateGate {
        RateGate::new(
            Duration::from_secs(self.throttle.connect_spacing_secs),
            Duration::from_secs(self.throttle.rate_limit_penalty_secs),
        )
    }

    pub fn pacer(&self) -> RequestPacer {
        RequestPacer::new(Duration::from_secs(self.throttle.web_request_spacing_secs))
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            poll_interval: Duration::from_secs(self.session.poll_interval_secs),
            metadata_fetch_delay: Duration::from_secs(self.session.metadata_fetch_delay_secs),
            max_reconnects: self.session.max_reconnects,
            metadata_fetch_attempts: self
                .session
                .metadata_fetch_attempts
                .and_then(NonZeroU32::new),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serializes tests that mutate environment variables; they race
    /// otherwise when the harness runs them in parallel.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn load_from(contents: &str) -> common::Result<FetcherConfig> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fetcher.toml");
        std::fs::write(&path, contents).unwrap();
        FetcherConfig::load(&path)
    }

    #[test]
    fn empty_file_yields_defaults() {
        let config = load_from("").unwrap();
        assert_eq!(config.files.roster, PathBuf::from("accounts.csv"));
        assert_eq!(config.throttle.connect_spacing_secs, 30);
        assert_eq!(config.throttle.rate_limit_penalty_secs, 1800);
        assert_eq!(config.throttle.web_request_spacing_secs, 3);
        assert_eq!(config.session.max_reconnects, 10);
        assert_eq!(config.auth_failure_policy, AuthFailurePolicy::Drop);
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = load_from(
            r#"
auth_failure_policy = "requeue"

[files]
roster = "/data/accounts.csv"

[throttle]
connect_spacing_secs = 5

[session]
max_reconnects = 3
metadata_fetch_attempts = 4
"#,
        )
        .unwrap();

        assert_eq!(config.auth_failure_policy, AuthFailurePolicy::Requeue);
        assert_eq!(config.files.roster, PathBuf::from("/data/accounts.csv"));
        assert_eq!(config.throttle.connect_spacing_secs, 5);
        assert_eq!(
            config.session_config().metadata_fetch_attempts,
            NonZeroU32::new(4)
        );
    }

    #[test]
    fn zero_max_reconnects_is_rejected() {
        let result = load_from("[session]\nmax_reconnects = 0\n");
        assert!(result.is_err());
    }

    #[test]
    fn zero_metadata_attempts_is_rejected() {
        let result = load_from("[session]\nmetadata_fetch_attempts = 0\n");
        assert!(result.is_err());
    }

    #[test]
    fn resolve_path_prefers_cli_arg() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/should-lose.toml") };
        let path = FetcherConfig::resolve_path(Some("/cli/wins.toml"));
        assert_eq!(path, PathBuf::from("/cli/wins.toml"));
        unsafe { remove_env("CONFIG_PATH") };
    }

    #[test]
    fn resolve_path_reads_the_env_var() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/fetcher.toml") };
        let path = FetcherConfig::resolve_path(None);
        assert_eq!(path, PathBuf::from("/env/fetcher.toml"));
        unsafe { remove_env("CONFIG_PATH") };
    }

    #[test]
    fn resolve_path_falls_back_to_the_default() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("CONFIG_PATH") };
        let path = FetcherConfig::resolve_path(None);
        assert_eq!(path, PathBuf::from("steam-fetcher.toml"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = FetcherConfig::load(Path::new("/nonexistent/fetcher.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let result = load_from("not valid {{{{ toml");
        assert!(result.is_err());
    }
}
