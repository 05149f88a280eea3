//! Results persistence
//!
//! Accumulated `AccountResult`s as a JSON array, rewritten after each
//! account. Loading is lenient: a missing or unreadable file starts a
//! fresh list so one corrupt run never blocks the next.

use std::path::{Path, PathBuf};

use steam_session::AccountResult;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Append-oriented log of finished accounts.
pub struct ResultsLog {
    path: PathBuf,
    entries: Vec<AccountResult>,
}

impl ResultsLog {
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<Vec<AccountResult>>(&raw) {
                Ok(entries) => {
                    info!(path = %path.display(), results = entries.len(), "results loaded");
                    entries
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "results file unreadable, starting fresh");
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "results file unreadable, starting fresh");
                Vec::new()
            }
        };
        Self { path, entries }
    }

    pub fn push(&mut self, result: AccountResult) {
        debug!(account = %result.username, succeeded = result.succeeded(), "result recorded");
        self.entries.push(result);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[AccountResult] {
        &self.entries
    }

    /// Write the full list to disk via temp file and rename.
    pub fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| Error::Io(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, &json).map_err(|e| Error::Io(e.to_string()))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| Error::Io(e.to_string()))?;
        Ok(())
    }
}
