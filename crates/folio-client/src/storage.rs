//! Best-effort key/value persistence with a primary → secondary → fallback
//! chain. Nothing here ever fails the caller; errors are logged and the next
//! link in the chain is tried.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::warn;

use crate::error::StorageError;

/// A string key/value store that may be unavailable at runtime.
pub trait KeyValueStore: Send + Sync {
    /// Short label used in log lines.
    fn name(&self) -> &'static str;
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Process-lifetime store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut values = self.values.lock().map_err(|_| StorageError::Poisoned)?;
        values.remove(key);
        Ok(())
    }
}

/// Persistent store backed by a single JSON object on disk.
///
/// Every operation re-reads the file, so several clients pointed at the same
/// path observe each other's writes. A missing file reads as empty.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match std::fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, values: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(values)?)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn name(&self) -> &'static str {
        "file"
    }

    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        let mut values = self.load()?;
        values.insert(key.to_string(), value.to_string());
        self.save(&values)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        let mut values = self.load()?;
        if values.remove(key).is_some() {
            self.save(&values)?;
        }
        Ok(())
    }
}

/// A store that always fails, e.g. when no writable location exists.
#[derive(Debug, Clone, Copy)]
pub struct UnavailableStore {
    name: &'static str,
}

impl UnavailableStore {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl KeyValueStore for UnavailableStore {
    fn name(&self) -> &'static str {
        self.name
    }

    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable(self.name))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable(self.name))
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable(self.name))
    }
}

#[derive(Debug, Clone)]
pub struct StorageOptions {
    /// Consult the secondary store when the primary misses or fails.
    pub fallback_to_session: bool,
    /// Returned by [`StorageChain::get_item`] when neither store has the key.
    pub fallback_value: Option<String>,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            fallback_to_session: true,
            fallback_value: None,
        }
    }
}

/// Primary store with a secondary behind it.
pub struct StorageChain {
    primary: Box<dyn KeyValueStore>,
    secondary: Box<dyn KeyValueStore>,
}

impl StorageChain {
    pub fn new(primary: Box<dyn KeyValueStore>, secondary: Box<dyn KeyValueStore>) -> Self {
        Self { primary, secondary }
    }

    /// Two independent in-memory stores; nothing survives the process.
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::new()), Box::new(MemoryStore::new()))
    }

    /// A JSON file as the primary with process memory behind it.
    pub fn persistent(path: impl Into<PathBuf>) -> Self {
        Self::new(Box::new(FileStore::new(path)), Box::new(MemoryStore::new()))
    }

    pub fn get_item(&self, key: &str, options: &StorageOptions) -> Option<String> {
        match self.primary.get(key) {
            Ok(Some(value)) => return Some(value),
            Ok(None) => {}
            Err(e) => warn!(store = self.primary.name(), key, error = %e, "Storage read failed"),
        }

        if options.fallback_to_session {
            match self.secondary.get(key) {
                Ok(Some(value)) => return Some(value),
                Ok(None) => {}
                Err(e) => {
                    warn!(store = self.secondary.name(), key, error = %e, "Storage read failed")
                }
            }
        }

        options.fallback_value.clone()
    }

    /// `true` if any store accepted the write.
    pub fn set_item(&self, key: &str, value: &str, options: &StorageOptions) -> bool {
        match self.primary.set(key, value) {
            Ok(()) => return true,
            Err(e) => warn!(store = self.primary.name(), key, error = %e, "Storage write failed"),
        }

        if options.fallback_to_session {
            match self.secondary.set(key, value) {
                Ok(()) => return true,
                Err(e) => {
                    warn!(store = self.secondary.name(), key, error = %e, "Storage write failed")
                }
            }
        }

        false
    }

    /// Remove from both stores; `true` if either removal succeeded.
    pub fn remove_item(&self, key: &str, options: &StorageOptions) -> bool {
        let mut removed = match self.primary.remove(key) {
            Ok(()) => true,
            Err(e) => {
                warn!(store = self.primary.name(), key, error = %e, "Storage remove failed");
                false
            }
        };

        if options.fallback_to_session {
            match self.secondary.remove(key) {
                Ok(()) => removed = true,
                Err(e) => {
                    warn!(store = self.secondary.name(), key, error = %e, "Storage remove failed")
                }
            }
        }

        removed
    }
}
