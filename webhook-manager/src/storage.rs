//! Key-value slots backing the registry.
//!
//! Each key holds one complete JSON document. Writes replace the whole
//! document; there is no partial update.

use crate::error::{RegistryError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub trait KeyValueStore: Send + Sync {
    /// Read the document stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replace the document stored under `key`.
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// Stores each key as `<data_dir>/<key>.json`.
pub struct FileStore {
    data_dir: PathBuf,
}

impl FileStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        std::fs::read_to_string(&path)
            .map(Some)
            .map_err(|e| RegistryError::Storage(format!("failed to read {}: {e}", path.display())))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir).map_err(|e| {
            RegistryError::Storage(format!(
                "failed to create {}: {e}",
                self.data_dir.display()
            ))
        })?;
        let path = self.path_for(key);
        std::fs::write(&path, value)
            .map_err(|e| RegistryError::Storage(format!("failed to write {}: {e}", path.display())))
    }
}

/// In-process store, used by tests and as a scratch backend.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    slots: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.slots.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.slots.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
