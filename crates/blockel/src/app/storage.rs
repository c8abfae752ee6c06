//! Storage backends for the rule store.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::errors::StoreError;
use crate::domain::model::{Rule, Settings, Statistics};

/// Everything the store persists, keyed the way the extension storage keys it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(rename = "be_settings", default)]
    pub settings: Settings,
    /// Rules grouped by domain, each group in insertion order.
    #[serde(rename = "be_rules", default)]
    pub rules: BTreeMap<String, Vec<Rule>>,
    #[serde(rename = "be_statistics", default)]
    pub statistics: Statistics,
}

/// Whole-snapshot persistence used by [`crate::app::rules::RuleService`].
pub trait Storage: Send {
    fn load(&self) -> Result<StoreSnapshot, StoreError>;
    fn save(&mut self, snapshot: &StoreSnapshot) -> Result<(), StoreError>;
}

/// Pretty-printed JSON file, created on first save.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl Storage for JsonFileStorage {
    fn load(&self) -> Result<StoreSnapshot, StoreError> {
        if !self.path.exists() {
            return Ok(StoreSnapshot::default());
        }
        let data = fs::read_to_string(&self.path).map_err(|err| self.io_error(err))?;
        if data.trim().is_empty() {
            return Ok(StoreSnapshot::default());
        }
        Ok(serde_json::from_str(&data)?)
    }

    fn save(&mut self, snapshot: &StoreSnapshot) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir).map_err(|err| self.io_error(err))?;
        }
        let data = serde_json::to_string_pretty(snapshot)?;
        fs::write(&self.path, data).map_err(|err| self.io_error(err))
    }
}

/// In-process storage, optionally refusing writes.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    snapshot: StoreSnapshot,
    reject_writes: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            snapshot,
            reject_writes: false,
        }
    }

    /// Storage whose every save fails, as when the sync quota is exhausted.
    pub fn read_only(snapshot: StoreSnapshot) -> Self {
        Self {
            snapshot,
            reject_writes: true,
        }
    }
}

impl Storage for MemoryStorage {
    fn load(&self) -> Result<StoreSnapshot, StoreError> {
        Ok(self.snapshot.clone())
    }

    fn save(&mut self, snapshot: &StoreSnapshot) -> Result<(), StoreError> {
        if self.reject_writes {
            return Err(StoreError::Rejected("storage is read-only".into()));
        }
        self.snapshot = snapshot.clone();
        Ok(())
    }
}
