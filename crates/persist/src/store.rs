//! Key-value settings persistence.
//!
//! `JsonSettingsStore` keeps one file inside its directory:
//! ```text
//! settings.json   - schema version plus a flat string map
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Current settings schema version.
const SETTINGS_SCHEMA_VERSION: u32 = 1;

const SETTINGS_FILE: &str = "settings.json";

/// Errors from settings persistence.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("schema version mismatch: file has v{file_version}, expected v{expected_version}")]
    SchemaMismatch {
        file_version: u32,
        expected_version: u32,
    },
}

/// String-keyed settings storage.
pub trait SettingsStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    /// Returns whether the key was present.
    fn remove(&mut self, key: &str) -> Result<bool, StoreError>;
}

/// On-disk form of `settings.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsMeta {
    pub schema_version: u32,
    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

impl Default for SettingsMeta {
    fn default() -> Self {
        Self {
            schema_version: SETTINGS_SCHEMA_VERSION,
            values: BTreeMap::new(),
        }
    }
}

/// File-backed settings, rewritten on every change.
pub struct JsonSettingsStore {
    path: PathBuf,
    meta: SettingsMeta,
}

impl JsonSettingsStore {
    /// Open or create the settings file inside `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(SETTINGS_FILE);

        let meta = if path.exists() {
            let meta: SettingsMeta = serde_json::from_reader(std::fs::File::open(&path)?)?;
            if meta.schema_version != SETTINGS_SCHEMA_VERSION {
                return Err(StoreError::SchemaMismatch {
                    file_version: meta.schema_version,
                    expected_version: SETTINGS_SCHEMA_VERSION,
                });
            }
            meta
        } else {
            let meta = SettingsMeta::default();
            serde_json::to_writer_pretty(std::fs::File::create(&path)?, &meta)?;
            meta
        };
        tracing::debug!(path = %path.display(), entries = meta.values.len(), "settings opened");

        Ok(Self { path, meta })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn meta(&self) -> &SettingsMeta {
        &self.meta
    }

    fn save(&self) -> Result<(), StoreError> {
        let tmp = self.path.with_extension("json.tmp");
        serde_json::to_writer_pretty(std::fs::File::create(&tmp)?, &self.meta)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl SettingsStore for JsonSettingsStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.meta.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.meta.values.insert(key.to_string(), value.to_string());
        self.save()
    }

    fn remove(&mut self, key: &str) -> Result<bool, StoreError> {
        let existed = self.meta.values.remove(key).is_some();
        if existed {
            self.save()?;
        }
        Ok(existed)
    }
}

/// Non-durable settings for tests and headless runs.
#[derive(Debug, Clone, Default)]
pub struct MemorySettingsStore {
    values: BTreeMap<String, String>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool, StoreError> {
        Ok(self.values.remove(key).is_some())
    }
}

impl<S: SettingsStore + ?Sized> SettingsStore for Box<S> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<bool, StoreError> {
        (**self).remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonSettingsStore::open(tmp.path().join("cfg")).unwrap();
        assert!(store.path().is_file());
        assert_eq!(store.meta().schema_version, SETTINGS_SCHEMA_VERSION);
        assert!(store.meta().values.is_empty());
    }

    #[test]
    fn values_survive_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let mut store = JsonSettingsStore::open(tmp.path()).unwrap();
            store.set("render.profile", "quality").unwrap();
            store.set("other", "1").unwrap();
            assert!(store.remove("other").unwrap());
            assert!(!store.remove("other").unwrap());
        }
        let store = JsonSettingsStore::open(tmp.path()).unwrap();
        assert_eq!(store.get("render.profile").unwrap().as_deref(), Some("quality"));
        assert_eq!(store.get("other").unwrap(), None);
    }

    #[test]
    fn schema_mismatch_fail_closed() {
        let tmp = tempfile::tempdir().unwrap();
        let _store = JsonSettingsStore::open(tmp.path()).unwrap();

        let path = tmp.path().join(SETTINGS_FILE);
        let mut meta: SettingsMeta =
            serde_json::from_reader(std::fs::File::open(&path).unwrap()).unwrap();
        meta.schema_version = 999;
        serde_json::to_writer_pretty(std::fs::File::create(&path).unwrap(), &meta).unwrap();

        match JsonSettingsStore::open(tmp.path()) {
            Err(StoreError::SchemaMismatch {
                file_version,
                expected_version,
            }) => {
                assert_eq!(file_version, 999);
                assert_eq!(expected_version, SETTINGS_SCHEMA_VERSION);
            }
            Err(e) => panic!("expected SchemaMismatch, got: {e}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(SETTINGS_FILE), "{ not json").unwrap();
        assert!(matches!(
            JsonSettingsStore::open(tmp.path()),
            Err(StoreError::Json(_))
        ));
    }

    #[test]
    fn memory_store_round_trips() {
        let mut store = MemorySettingsStore::new();
        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
        assert!(store.remove("k").unwrap());
    }
}
