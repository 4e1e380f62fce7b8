//! Key/value persistence backed by a single JSON document on disk.
//! Every set rewrites the whole file; there are no partial writes.
//! A missing or unreadable file degrades to an empty document.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};

#[derive(Debug)]
pub enum StorageError {
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "storage IO error: {e}"),
            StorageError::Parse(e) => write!(f, "storage parse error: {e}"),
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Parse(e)
    }
}

/// JSON-file-backed string key/value store.
pub struct KeyValueStorage {
    path: PathBuf,
    items: Mutex<HashMap<String, String>>,
}

impl KeyValueStorage {
    /// Open the store at `path`, reading the existing document if any.
    /// A load failure yields an empty document with a warning, never an error.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let items = match load_document(&path) {
            Ok(items) => items,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "storage load failed, starting empty");
                HashMap::new()
            }
        };
        Self {
            path,
            items: Mutex::new(items),
        }
    }

    pub fn get_item(&self, key: &str) -> Option<String> {
        self.items.lock().get(key).cloned()
    }

    /// Set a key and rewrite the whole document.
    pub fn set_item(&self, key: &str, value: String) -> Result<(), StorageError> {
        let mut items = self.items.lock();
        items.insert(key.to_string(), value);
        write_document(&self.path, &items)
    }
}

fn load_document(path: &Path) -> Result<HashMap<String, String>, StorageError> {
    if !path.exists() {
        debug!(path = %path.display(), "storage file absent, starting empty");
        return Ok(HashMap::new());
    }
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn write_document(path: &Path, items: &HashMap<String, String>) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string(items)?;
    std::fs::write(path, content)?;
    Ok(())
}
