//! Static fixture payloads
//!
//! Fixtures are JSON documents loaded once, ahead of scenario execution,
//! and treated as immutable from then on. Route handlers take owned clones
//! so the shared copy is never mutated, which keeps the store safe for
//! concurrent reads across parallel test cases.

use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

use crate::error::{HarnessError, HarnessResult};

/// Read-only map of fixture payloads, keyed by file stem
#[derive(Debug, Default)]
pub struct FixtureStore {
    payloads: HashMap<String, Value>,
}

impl FixtureStore {
    /// A store with no fixtures
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load every `*.json` document under `dir`. An unparseable document
    /// fails the load; a fixture that cannot be read must fail fast rather
    /// than surface later as a mysterious passthrough.
    pub fn load(dir: &Path) -> HarnessResult<Self> {
        if !dir.is_dir() {
            return Err(HarnessError::Fixture(format!(
                "fixture directory not found: {}",
                dir.display()
            )));
        }

        let mut payloads = HashMap::new();
        for entry in walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "json")
                    .unwrap_or(false)
            })
        {
            let path = entry.path();
            let content = std::fs::read_to_string(path)?;
            let value: Value = serde_json::from_str(&content).map_err(|e| {
                HarnessError::Fixture(format!("{}: {}", path.display(), e))
            })?;
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            payloads.insert(name, value);
        }

        Ok(Self { payloads })
    }

    /// Borrow a fixture for inspection
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.payloads.get(name)
    }

    /// Clone a fixture for use in a route rule. The clone is the handler's
    /// to mutate; the stored copy stays untouched.
    pub fn get_owned(&self, name: &str) -> HarnessResult<Value> {
        self.payloads
            .get(name)
            .cloned()
            .ok_or_else(|| HarnessError::Fixture(format!("unknown fixture: {name}")))
    }

    /// Names of all loaded fixtures
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.payloads.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }
}
