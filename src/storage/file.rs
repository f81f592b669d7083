// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! File-backed key-value store.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use super::KeyValueStore;
use crate::error::StorageError;

/// Persistent [`KeyValueStore`] kept as a single JSON object on disk.
///
/// The whole file is loaded once by [`FileStore::open`]. Reads are served
/// from memory; every mutation rewrites the file through a temporary
/// sibling and an atomic rename.
///
/// # Examples
///
/// ```no_run
/// use plug_telemetry::storage::{FileStore, KeyValueStore};
///
/// # fn example() -> plug_telemetry::Result<()> {
/// let store = FileStore::open("session.json")?;
/// store.set_token("secret")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    /// Opens the store at `path`, starting empty if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the file exists but cannot be read or is not
    /// a JSON object of strings.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        let entries = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), keys = entries.len(), "Opened session store");

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// Returns the path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let text = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn mutate(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, String>),
    ) -> Result<(), StorageError> {
        let mut entries = self.entries.write();
        let mut updated = entries.clone();
        f(&mut updated);
        self.persist(&updated).inspect_err(|e| {
            tracing::error!(path = %self.path.display(), error = %e, "Failed to persist session store");
        })?;
        *entries = updated;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.mutate(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.mutate(|entries| {
            entries.remove(key);
        })
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.mutate(BTreeMap::clear)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::keys;

    #[test]
    fn missing_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("session.json")).unwrap();

        assert!(store.token().is_none());
    }

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        {
            let store = FileStore::open(&path).unwrap();
            store.set_token("abc").unwrap();
            store.set(keys::HOUSE_NAME, "Home").unwrap();
            store.remove(keys::HOUSE_NAME).unwrap();
        }

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.token().as_deref(), Some("abc"));
        assert!(reopened.get(keys::HOUSE_NAME).is_none());
    }

    #[test]
    fn clear_empties_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = FileStore::open(&path).unwrap();
        store.set_token("abc").unwrap();
        store.clear().unwrap();

        let reopened = FileStore::open(&path).unwrap();
        assert!(reopened.token().is_none());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "[1, 2, 3]").unwrap();

        assert!(matches!(FileStore::open(&path), Err(StorageError::Json(_))));
    }

    #[test]
    fn failed_write_keeps_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("session.json");

        let store = FileStore::open(&path).unwrap();
        assert!(store.set_token("abc").is_err());
        assert!(store.token().is_none());
    }
}
