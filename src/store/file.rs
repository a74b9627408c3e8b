//! File-based store with atomic writes.
//!
//! Keeps every key of a namespace in one JSON document under
//! `dirs::data_dir()/<namespace>/options.json`. Uses temp file + rename for
//! atomic writes. The file is re-read on every access, so separate
//! processes see each other's writes; there is no cross-process locking.

use super::OptionStore;
use crate::LicenseError;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const FILE_NAME: &str = "options.json";

/// File-based store.
pub struct FileStore {
    /// Path of the JSON document.
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Create a store with the given namespace.
    ///
    /// Files are stored under `dirs::data_dir()/<namespace>/`.
    pub fn new(namespace: &str) -> Result<Self, LicenseError> {
        if namespace.trim().is_empty() {
            return Err(LicenseError::ConfigurationMissing(
                "store namespace cannot be empty".to_string(),
            ));
        }
        let base_dir = dirs::data_dir()
            .ok_or_else(|| LicenseError::Store("Could not find data directory".to_string()))?;

        Self::with_path(base_dir.join(namespace))
    }

    /// Create a store in a specific directory.
    pub fn with_path(dir: PathBuf) -> Result<Self, LicenseError> {
        fs::create_dir_all(&dir)
            .map_err(|e| LicenseError::Store(format!("Failed to create store dir: {}", e)))?;
        Ok(Self {
            path: dir.join(FILE_NAME),
            write_lock: Mutex::new(()),
        })
    }

    /// Location of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, LicenseError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let json = fs::read_to_string(&self.path)
            .map_err(|e| LicenseError::Store(format!("Failed to read store: {}", e)))?;

        serde_json::from_str(&json)
            .map_err(|e| LicenseError::Store(format!("Failed to parse store: {}", e)))
    }

    fn save(&self, values: &BTreeMap<String, String>) -> Result<(), LicenseError> {
        let json = serde_json::to_string_pretty(values)
            .map_err(|e| LicenseError::Store(format!("Failed to serialize store: {}", e)))?;

        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, &json)
            .map_err(|e| LicenseError::Store(format!("Failed to write temp file: {}", e)))?;

        fs::rename(&temp_path, &self.path)
            .map_err(|e| LicenseError::Store(format!("Failed to rename store file: {}", e)))?;

        Ok(())
    }

    fn modify<F>(&self, f: F) -> Result<(), LicenseError>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| LicenseError::Store("store lock poisoned".to_string()))?;
        let mut values = self.load()?;
        f(&mut values);
        self.save(&values)
    }
}

impl OptionStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, LicenseError> {
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), LicenseError> {
        self.modify(|values| {
            values.insert(key.to_string(), value.to_string());
        })
    }

    fn delete(&self, key: &str) -> Result<(), LicenseError> {
        self.modify(|values| {
            values.remove(key);
        })
    }
}
