//! Local persistent storage: a set of string-keyed slots, each holding one string value.
//!
//! The savings mapping lives in a single slot as JSON. Reads and writes are synchronous so that a
//! local write is always complete before any network call starts.

use crate::model::Savings;
use crate::Result;
use anyhow::{ensure, Context};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::trace;
use uuid::Uuid;

/// A string-keyed store of string values.
pub trait LocalStorage: Send {
    /// Returns the value in slot `key`, or `None` when the slot has never been written.
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Overwrites slot `key` with `value`.
    fn set_item(&mut self, key: &str, value: &str) -> Result<()>;
}

/// Reads the savings mapping from `slot`. An empty slot is an empty mapping; a slot that holds
/// something other than a mapping is an error.
pub fn load_savings(storage: &dyn LocalStorage, slot: &str) -> Result<Savings> {
    match storage.get_item(slot)? {
        None => Ok(Savings::new()),
        Some(json) => serde_json::from_str(&json)
            .with_context(|| format!("The local storage slot '{slot}' does not hold savings data")),
    }
}

/// Overwrites `slot` with the JSON form of `savings`.
pub fn persist_savings(storage: &mut dyn LocalStorage, slot: &str, savings: &Savings) -> Result<()> {
    let json = serde_json::to_string(savings).context("Unable to serialize savings")?;
    storage.set_item(slot, &json)
}

/// Keeps each slot in its own file, `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// `dir` must already exist.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn slot_path(&self, key: &str) -> Result<PathBuf> {
        ensure!(is_valid_slot_name(key), "Invalid storage slot name '{key}'");
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl LocalStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let path = self.slot_path(key)?;
        match std::fs::read_to_string(&path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).context(format!("Unable to read file {}", path.display())),
        }
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.slot_path(key)?;
        // Write next to the slot, then rename over it, so a crash never leaves half a file.
        let tmp = self.dir.join(format!(".{key}.{}.tmp", Uuid::new_v4().simple()));
        std::fs::write(&tmp, value)
            .with_context(|| format!("Unable to write data to {}", tmp.display()))?;
        std::fs::rename(&tmp, &path).with_context(|| {
            format!(
                "Unable to move '{}' to '{}'",
                tmp.to_string_lossy(),
                path.to_string_lossy()
            )
        })?;
        trace!("Wrote {} bytes to {}", value.len(), path.display());
        Ok(())
    }
}

/// Keeps slots in memory; nothing survives the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Slot names become file names, so they are limited to ASCII letters, digits, `-` and `_`.
pub(crate) fn is_valid_slot_name(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Amount, DateKey};
    use std::str::FromStr;
    use tempfile::TempDir;

    #[test]
    fn test_file_storage_missing_slot() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path());
        assert!(storage.get_item("beanSavings").unwrap().is_none());
    }

    #[test]
    fn test_file_storage_overwrite() {
        let dir = TempDir::new().unwrap();
        let mut storage = FileStorage::new(dir.path());
        storage.set_item("slot", "one").unwrap();
        storage.set_item("slot", "two").unwrap();
        assert_eq!(storage.get_item("slot").unwrap().unwrap(), "two");
        assert!(dir.path().join("slot.json").is_file());
        let leftovers = std::fs::read_dir(dir.path())
            .unwrap()
            .filter(|entry| {
                let name = entry.as_ref().unwrap().file_name();
                name.to_string_lossy().ends_with(".tmp")
            })
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_file_storage_rejects_path_like_slots() {
        let dir = TempDir::new().unwrap();
        let mut storage = FileStorage::new(dir.path());
        assert!(storage.set_item("../escape", "x").is_err());
        assert!(storage.get_item("").is_err());
    }

    #[test]
    fn test_savings_round_trip_through_file() {
        let dir = TempDir::new().unwrap();
        let mut storage = FileStorage::new(dir.path());
        let savings: Savings = [
            (DateKey::from_str("2024-03-05").unwrap(), Amount::from(100)),
            (DateKey::from_str("2024-04-01").unwrap(), Amount::from(20)),
        ]
        .into_iter()
        .collect();

        persist_savings(&mut storage, "beanSavings", &savings).unwrap();
        let loaded = load_savings(&storage, "beanSavings").unwrap();
        assert_eq!(loaded, savings);

        let raw = storage.get_item("beanSavings").unwrap().unwrap();
        assert_eq!(raw, r#"{"2024-03-05":100,"2024-04-01":20}"#);
    }

    #[test]
    fn test_load_empty_slot() {
        let storage = MemoryStorage::new();
        assert!(load_savings(&storage, "beanSavings").unwrap().is_empty());
    }

    #[test]
    fn test_load_corrupt_slot_is_an_error() {
        let mut storage = MemoryStorage::new();
        storage.set_item("beanSavings", "not json").unwrap();
        let err = load_savings(&storage, "beanSavings").unwrap_err();
        assert!(err.to_string().contains("beanSavings"));
    }
}
