//! # Cart Storage
//!
//! Key/value persistence for the cart, one JSON document per key.
//!
//! ```text
//! CartStore ──save("sprig-cart", json)──► FileStorage
//!                                           │ write  {dir}/sprig-cart.json.tmp
//!                                           │ rename {dir}/sprig-cart.json
//!                                           ▼
//!                                         disk
//! ```
//!
//! The rename keeps a crash mid-write from leaving a truncated cart behind.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::error::{ClientError, ClientResult};

/// Persistence seam for [`CartStore`](crate::store::CartStore).
pub trait CartStorage: Send + Sync {
    /// Returns the stored document, or `None` if nothing was saved under `key`.
    fn load(&self, key: &str) -> ClientResult<Option<String>>;

    /// Replaces the document stored under `key`.
    fn save(&self, key: &str, value: &str) -> ClientResult<()>;
}

// =============================================================================
// File Storage
// =============================================================================

/// Stores each key as `{dir}/{key}.json`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileStorage { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl CartStorage for FileStorage {
    fn load(&self, key: &str) -> ClientResult<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ClientError::Storage(e.to_string())),
        }
    }

    fn save(&self, key: &str, value: &str) -> ClientResult<()> {
        let path = self.path_for(key);
        let tmp = self.dir.join(format!("{}.json.tmp", key));

        fs::create_dir_all(&self.dir).map_err(|e| ClientError::Storage(e.to_string()))?;
        fs::write(&tmp, value).map_err(|e| ClientError::Storage(e.to_string()))?;
        fs::rename(&tmp, &path).map_err(|e| ClientError::Storage(e.to_string()))?;

        debug!(?path, bytes = value.len(), "Cart written");
        Ok(())
    }
}

// =============================================================================
// Memory Storage
// =============================================================================

/// In-process storage for tests and for sessions that should not persist.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-populated with one document.
    pub fn with_entry(key: &str, value: &str) -> Self {
        let storage = Self::new();
        storage
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        storage
    }

    /// Current document under `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

impl CartStorage for MemoryStorage {
    fn load(&self, key: &str) -> ClientResult<Option<String>> {
        Ok(self.get(key))
    }

    fn save(&self, key: &str, value: &str) -> ClientResult<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_storage_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested"));

        assert_eq!(storage.load("sprig-cart").unwrap(), None);

        storage.save("sprig-cart", "[]").unwrap();
        storage.save("sprig-cart", r#"[{"productId":"tea"}]"#).unwrap();

        assert_eq!(
            storage.load("sprig-cart").unwrap().as_deref(),
            Some(r#"[{"productId":"tea"}]"#)
        );
        assert!(!dir.path().join("nested/sprig-cart.json.tmp").exists());
    }

    #[test]
    fn test_file_storage_unreadable_path() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be
        std::fs::create_dir_all(dir.path().join("sprig-cart.json")).unwrap();

        let storage = FileStorage::new(dir.path());
        assert!(matches!(
            storage.load("sprig-cart"),
            Err(ClientError::Storage(_))
        ));
    }

    #[test]
    fn test_memory_storage() {
        let storage = MemoryStorage::with_entry("sprig-cart", "[]");
        assert_eq!(storage.load("sprig-cart").unwrap().as_deref(), Some("[]"));
        assert_eq!(storage.load("other").unwrap(), None);

        storage.save("other", "{}").unwrap();
        assert_eq!(storage.get("other").as_deref(), Some("{}"));
    }
}
