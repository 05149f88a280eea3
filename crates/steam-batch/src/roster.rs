//! Credential roster
//!
//! The roster file is the fetcher's work queue: one `;`-separated line per
//! account under a fixed header. It is rewritten after every processed
//! account so an interrupted run resumes where it stopped. Lines that do
//! not parse are logged and skipped, never rewritten back.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use steam_session::Credential;
use tracing::{info, warn};

use crate::error::{Error, Result};

pub const ROSTER_HEADER: &str = "AccountLogin;AccountPassword;SharedSecret";

/// Work queue of account credentials, backed by the roster file.
pub struct Roster {
    path: PathBuf,
    entries: VecDeque<Credential>,
}

impl Roster {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let contents = std::fs::read_to_string(&path)
            .map_err(|e| Error::Io(format!("{}: {e}", path.display())))?;

        let mut lines = contents.lines();
        match lines.next() {
            Some(header) if header.trim() == ROSTER_HEADER => {}
            Some(other) => {
                return Err(Error::Roster(format!(
                    "unexpected roster header: {other:?}"
                )));
            }
            None => return Err(Error::Roster("roster file is empty".to_string())),
        }

        let mut entries = VecDeque::new();
        for (index, line) in lines.enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(';').collect();
            match fields.as_slice() {
                [username, password, shared_secret]
                    if !username.is_empty()
                        && !password.is_empty()
                        && !shared_secret.is_empty() =>
                {
                    entries.push_back(Credential::new(*username, *password, *shared_secret));
                }
                _ => {
                    // Line numbers are 1-based and include the header.
                    warn!(line = index + 2, "invalid roster line skipped");
                }
            }
        }

        info!(path = %path.display(), accounts = entries.len(), "roster loaded");
        Ok(Self { path, entries })
    }

    /// Next account to process.
    pub fn pop(&mut self) -> Option<Credential> {
        self.entries.pop_front()
    }

    /// Put an account back at the end of the queue.
    pub fn requeue(&mut self, credential: Credential) {
        self.entries.push_back(credential);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rewrite the roster with the remaining accounts. This file is the
    /// credential store itself, so secrets go back in the clear.
    pub fn save(&self) -> Result<()> {
        let mut contents = String::from(ROSTER_HEADER);
        contents.push('\n');
        for credential in &self.entries {
            contents.push_str(&format!(
                "{};{};{}\n",
                credential.username,
                credential.password.expose(),
                credential.shared_secret.expose()
            ));
        }

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, &contents).map_err(|e| Error::Io(e.to_string()))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| Error::Io(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_roster(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.csv");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn loads_accounts_in_order() {
        let (_dir, path) = write_roster(
            "AccountLogin;AccountPassword;SharedSecret\n\
             alice;pw1;c2VjcmV0MQ==\n\
             bob;pw2;c2VjcmV0Mg==\n",
        );
        let mut roster = Roster::load(&path).unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster.pop().unwrap().username, "alice");
        assert_eq!(roster.pop().unwrap().username, "bob");
        assert!(roster.pop().is_none());
    }

    #[test]
    fn invalid_lines_are_skipped() {
        let (_dir, path) = write_roster(
            "AccountLogin;AccountPassword;SharedSecret\n\
             alice;pw1;c2VjcmV0MQ==\n\
             missing-fields\n\
             ;empty-user;c2VjcmV0\n\
             bob;pw2;c2VjcmV0Mg==\n",
        );
        let roster = Roster::load(&path).unwrap();
        assert_eq!(roster.len(), 2);
    }

    #[test]
    fn wrong_header_is_rejected() {
        let (_dir, path) = write_roster("user;pass;secret\nalice;pw;c2VjcmV0\n");
        assert!(matches!(Roster::load(&path), Err(Error::Roster(_))));
    }

    #[test]
    fn empty_file_is_rejected() {
        let (_dir, path) = write_roster("");
        assert!(matches!(Roster::load(&path), Err(Error::Roster(_))));
    }

    #[test]
    fn save_rewrites_remaining_accounts() {
        let (_dir, path) = write_roster(
            "AccountLogin;AccountPassword;SharedSecret\n\
             alice;pw1;c2VjcmV0MQ==\n\
             bob;pw2;c2VjcmV0Mg==\n",
        );
        let mut roster = Roster::load(&path).unwrap();
        roster.pop();
        roster.save().unwrap();

        let reloaded = Roster::load(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with(ROSTER_HEADER));
        assert!(contents.contains("bob;pw2;c2VjcmV0Mg=="));
        assert!(!contents.contains("alice"));
    }

    #[test]
    fn requeued_account_goes_to_the_back() {
        let (_dir, path) = write_roster(
            "AccountLogin;AccountPassword;SharedSecret\n\
             alice;pw1;c2VjcmV0MQ==\n\
             bob;pw2;c2VjcmV0Mg==\n",
        );
        let mut roster = Roster::load(&path).unwrap();
        let alice = roster.pop().unwrap();
        roster.requeue(alice);
        assert_eq!(roster.pop().unwrap().username, "bob");
        assert_eq!(roster.pop().unwrap().username, "alice");
    }
}
