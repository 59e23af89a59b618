//! Persisted browser storage state
//!
//! The snapshot format mirrors what the browser context itself writes: a
//! `cookies` array plus an ordered `origins` list, each origin carrying an
//! ordered list of `localStorage` entries. Only the session-token entry is
//! ever rewritten by the harness; cookies, sibling entries and any fields
//! this version does not model round-trip untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use crate::error::HarnessResult;

/// A storage-state snapshot as persisted to disk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageState {
    /// Cookie records, kept opaque; the harness never edits them
    #[serde(default)]
    pub cookies: Vec<Value>,

    /// Per-origin browser storage
    #[serde(default)]
    pub origins: Vec<OriginState>,

    /// Fields newer browser versions may add
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Storage entries recorded for one origin
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OriginState {
    pub origin: String,

    #[serde(rename = "localStorage", default)]
    pub local_storage: Vec<StorageEntry>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// A single key/value browser-storage entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageEntry {
    pub name: String,
    pub value: String,
}

impl StorageState {
    /// Load a snapshot, falling back to an empty one when the file does
    /// not exist yet
    pub fn load(path: &Path) -> HarnessResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Write the snapshot, creating parent directories as needed
    pub fn save(&self, path: &Path) -> HarnessResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// The token value stored for `origin` under `key`, if any
    pub fn token(&self, origin: &str, key: &str) -> Option<&str> {
        self.origins
            .iter()
            .find(|o| o.origin == origin)?
            .local_storage
            .iter()
            .find(|e| e.name == key)
            .map(|e| e.value.as_str())
    }

    /// Overwrite the token entry in place. Exactly one entry changes:
    /// the first `key` entry of `origin` is updated, or inserted when no
    /// such entry exists; a missing origin is appended. Everything else in
    /// the snapshot is left as loaded.
    pub fn set_token(&mut self, origin: &str, key: &str, token: &str) {
        if let Some(origin_state) = self.origins.iter_mut().find(|o| o.origin == origin) {
            if let Some(entry) = origin_state
                .local_storage
                .iter_mut()
                .find(|e| e.name == key)
            {
                entry.value = token.to_string();
            } else {
                origin_state.local_storage.push(StorageEntry {
                    name: key.to_string(),
                    value: token.to_string(),
                });
            }
        } else {
            self.origins.push(OriginState {
                origin: origin.to_string(),
                local_storage: vec![StorageEntry {
                    name: key.to_string(),
                    value: token.to_string(),
                }],
                extra: serde_json::Map::new(),
            });
        }
    }
}
