//! JSON snapshot persistence for registry-style stores.
//!
//! Each store owns one [`JsonStore`] bound to a named file under the state
//! directory. Loading is forgiving (a missing or unreadable file yields the
//! default value, so a corrupt snapshot never blocks startup); saving
//! rewrites the whole file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::Result;

/// Handle to one JSON snapshot file.
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    /// Create a store handle for `<state_dir>/<name>.json`.
    ///
    /// The file and directory are created lazily on first save.
    #[must_use]
    pub fn new(state_dir: &Path, name: &str) -> Self {
        Self {
            path: state_dir.join(format!("{name}.json")),
        }
    }

    /// The file this store reads and writes.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted value, falling back to the default when the file
    /// is absent or unreadable.
    #[must_use]
    pub fn load<T: DeserializeOwned + Default>(&self) -> T {
        let Ok(contents) = fs::read_to_string(&self.path) else {
            return T::default();
        };
        match serde_json::from_str(&contents) {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "failed to parse state file, starting from defaults"
                );
                T::default()
            }
        }
    }

    /// Persist a value, replacing the previous snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the state directory cannot be created or the
    /// file cannot be written.
    pub fn save<T: Serialize>(&self, value: &T) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn load_missing_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path(), "things");

        let value: HashMap<String, u32> = store.load();
        assert!(value.is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path(), "things");

        let mut value = HashMap::new();
        value.insert("a".to_string(), 1u32);
        value.insert("b".to_string(), 2u32);
        store.save(&value).unwrap();

        let loaded: HashMap<String, u32> = store.load();
        assert_eq!(loaded, value);
    }

    #[test]
    fn save_creates_nested_state_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("state/sub");
        let store = JsonStore::new(&nested, "things");

        store.save(&vec![1u32, 2, 3]).unwrap();
        assert!(nested.join("things.json").exists());
    }

    #[test]
    fn corrupt_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path(), "things");
        fs::write(store.path(), "{not valid json").unwrap();

        let value: HashMap<String, u32> = store.load();
        assert!(value.is_empty());
    }
}
