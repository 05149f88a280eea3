//! Package metadata cache
//!
//! Product info is fetched at most once per package id across all runs.
//! The cache is a JSON array on disk, loaded once at startup and rewritten
//! atomically after each account completes. Only complete entries are ever
//! inserted, so a partial fetch is retried on the next run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// One cached package record. Everything beyond the id is carried opaquely
/// so the disk format follows whatever the product info RPC returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageMetadata {
    #[serde(rename = "packageid")]
    pub package_id: u32,

    #[serde(flatten)]
    pub extension: serde_json::Map<String, serde_json::Value>,
}

/// Cross-run package metadata cache.
#[derive(Debug)]
pub struct PackageCache {
    path: PathBuf,
    state: Mutex<HashMap<u32, PackageMetadata>>,
}

impl PackageCache {
    /// Load the cache from `path`, creating an empty file if absent.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if !tokio::fs::try_exists(&path)
            .await
            .map_err(|e| Error::Io(e.to_string()))?
        {
            tokio::fs::write(&path, "[]")
                .await
                .map_err(|e| Error::Io(e.to_string()))?;
            info!(path = %path.display(), "created empty package cache");
        }

        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| Error::Io(e.to_string()))?;
        let entries: Vec<PackageMetadata> =
            serde_json::from_str(&raw).map_err(|e| Error::CacheParse(e.to_string()))?;

        let state: HashMap<u32, PackageMetadata> = entries
            .into_iter()
            .map(|entry| (entry.package_id, entry))
            .collect();
        info!(path = %path.display(), packages = state.len(), "package cache loaded");

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub async fn contains(&self, package_id: u32) -> bool {
        self.state.lock().await.contains_key(&package_id)
    }

    pub async fn get(&self, package_id: u32) -> Option<PackageMetadata> {
        self.state.lock().await.get(&package_id).cloned()
    }

    /// Insert a complete record. A second insert for the same id is a
    /// no-op.
    pub async fn insert(&self, entry: PackageMetadata) {
        let mut state = self.state.lock().await;
        if state.contains_key(&entry.package_id) {
            return;
        }
        debug!(package_id = entry.package_id, "package metadata cached");
        state.insert(entry.package_id, entry);
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.is_empty()
    }

    /// Write the cache to disk. Serializes to a temp file in the same
    /// directory, then renames over the target.
    pub async fn save(&self) -> Result<()> {
        let entries: Vec<PackageMetadata> = {
            let state = self.state.lock().await;
            let mut entries: Vec<PackageMetadata> = state.values().cloned().collect();
            entries.sort_by_key(|entry| entry.package_id);
            entries
        };

        let json = serde_json::to_string_pretty(&entries)
            .map_err(|e| Error::Io(e.to_string()))?;

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| Error::Io(e.to_string()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| Error::Io(e.to_string()))?;

        debug!(path = %self.path.display(), packages = entries.len(), "package cache saved");
        Ok(())
    }
}
