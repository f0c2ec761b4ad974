//! JSON document store backed by a single file
//!
//! The whole document is kept in memory; `flush` writes it to a temporary
//! sibling file and renames it over the target so a crash never leaves a
//! half-written file behind.

use crate::error::{Result, TrackerError};
use crate::storage::StateStore;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    document: RwLock<Map<String, Value>>,
}

impl JsonFileStore {
    /// Open a store, loading the existing document if there is one
    ///
    /// A missing file starts an empty document. A file that is not a JSON
    /// object is logged and replaced on the next flush.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let document = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Value>(&contents) {
                Ok(Value::Object(map)) => {
                    info!("Loaded state from {} ({} sections)", path.display(), map.len());
                    map
                }
                Ok(_) => {
                    warn!("State file {} is not a JSON object, starting fresh", path.display());
                    Map::new()
                }
                Err(e) => {
                    warn!("Failed to parse state file {}: {}, starting fresh", path.display(), e);
                    Map::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No existing state file at {}, starting fresh", path.display());
                Map::new()
            }
            Err(e) => {
                return Err(TrackerError::StorageError {
                    message: format!("Failed to read {}: {}", path.display(), e),
                }
                .into())
            }
        };

        Ok(Self {
            path,
            document: RwLock::new(document),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_lock(&self) -> Result<std::sync::RwLockReadGuard<'_, Map<String, Value>>> {
        self.document.read().map_err(|_| {
            TrackerError::InternalError {
                message: "Failed to acquire state document read lock".to_string(),
            }
            .into()
        })
    }

    fn write_lock(&self) -> Result<std::sync::RwLockWriteGuard<'_, Map<String, Value>>> {
        self.document.write().map_err(|_| {
            TrackerError::InternalError {
                message: "Failed to acquire state document write lock".to_string(),
            }
            .into()
        })
    }
}

impl StateStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.read_lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        self.write_lock()?.insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.write_lock()?.remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.read_lock()?.keys().cloned().collect())
    }

    fn flush(&self) -> Result<()> {
        let contents = {
            let document = self.read_lock()?;
            serde_json::to_string_pretty(&*document).map_err(|e| TrackerError::StorageError {
                message: format!("Failed to serialize state: {}", e),
            })?
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| TrackerError::StorageError {
                    message: format!("Failed to create {}: {}", parent.display(), e),
                })?;
            }
        }

        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, contents).map_err(|e| TrackerError::StorageError {
            message: format!("Failed to write {}: {}", tmp_path.display(), e),
        })?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| TrackerError::StorageError {
            message: format!("Failed to replace {}: {}", self.path.display(), e),
        })?;

        debug!("State flushed to {}", self.path.display());
        Ok(())
    }
}
