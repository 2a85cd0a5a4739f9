use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::error::CacheError;
use crate::utils::file;

/// Key-value store used to warm-start the snapshot store.
///
/// Purely an optimization: callers treat every error as "nothing cached".
pub trait SnapshotCache: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>, CacheError>;
    fn store(&self, key: &str, value: &str) -> Result<(), CacheError>;
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", name))
    }
}

impl SnapshotCache for FileCache {
    fn load(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(file::read_optional(&self.path_for(key))?)
    }

    fn store(&self, key: &str, value: &str) -> Result<(), CacheError> {
        Ok(file::write_atomic(&self.path_for(key), value)?)
    }
}

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotCache for MemoryCache {
    fn load(&self, key: &str) -> Result<Option<String>, CacheError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn store(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
