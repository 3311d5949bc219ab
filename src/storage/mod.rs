//! Durable key-value storage substrate.
//!
//! The session layer persists through this interface rather than touching
//! the filesystem directly, so the storage medium can be swapped out
//! (files on disk in the app, an in-memory map in tests). Values are
//! opaque strings; the layers above decide what they encode.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};

/// Synchronous, process-local key-value storage surviving restarts.
///
/// Implementations report I/O failures as errors; callers in the session
/// layer treat any failure as "value absent" rather than surfacing it.
pub trait KeyValueStorage: Send {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// File-backed storage: one `<key>.json` file per key under a data directory.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create storage directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read storage key {}", key))?;
        Ok(Some(contents))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        std::fs::write(self.path_for(key), value)
            .with_context(|| format!("Failed to write storage key {}", key))
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove storage key {}", key))?;
        }
        Ok(())
    }
}

/// In-memory storage. Cloning shares the underlying map, which lets tests
/// keep a handle for inspecting and patching raw stored values.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("storage map poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("storage map poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("storage map poisoned"))?;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_roundtrip() {
        let mut storage = MemoryStorage::new();
        assert_eq!(storage.get("missing").unwrap(), None);

        storage.set("k", "v1").unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("v1"));

        // Single slot per key: set overwrites
        storage.set("k", "v2").unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("v2"));

        storage.remove("k").unwrap();
        assert_eq!(storage.get("k").unwrap(), None);

        // Remove is idempotent
        storage.remove("k").unwrap();
    }

    #[test]
    fn test_memory_storage_clone_shares_map() {
        let mut storage = MemoryStorage::new();
        let handle = storage.clone();
        storage.set("shared", "yes").unwrap();
        assert_eq!(handle.get("shared").unwrap().as_deref(), Some("yes"));
    }

    #[test]
    fn test_file_storage_roundtrip() {
        let dir = std::env::temp_dir().join(format!("coursecache-storage-{}", std::process::id()));
        let mut storage = FileStorage::new(dir.clone()).unwrap();

        assert_eq!(storage.get("session").unwrap(), None);
        storage.set("session", r#"{"a":1}"#).unwrap();
        assert_eq!(storage.get("session").unwrap().as_deref(), Some(r#"{"a":1}"#));
        storage.remove("session").unwrap();
        assert_eq!(storage.get("session").unwrap(), None);

        let _ = std::fs::remove_dir_all(dir);
    }
}
