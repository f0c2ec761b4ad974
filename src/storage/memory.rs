//! In-memory state store for tests and dry runs

use crate::error::{Result, TrackerError};
use crate::storage::StateStore;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::RwLock;

#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    entries: RwLock<BTreeMap<String, Value>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with an existing document
    pub fn from_document(document: BTreeMap<String, Value>) -> Self {
        Self {
            entries: RwLock::new(document),
        }
    }
}

impl StateStore for InMemoryStateStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let entries = self.entries.read().map_err(|_| TrackerError::InternalError {
            message: "Failed to acquire state store read lock".to_string(),
        })?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| TrackerError::InternalError {
            message: "Failed to acquire state store write lock".to_string(),
        })?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.write().map_err(|_| TrackerError::InternalError {
            message: "Failed to acquire state store write lock".to_string(),
        })?;
        Ok(entries.remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let entries = self.entries.read().map_err(|_| TrackerError::InternalError {
            message: "Failed to acquire state store read lock".to_string(),
        })?;
        Ok(entries.keys().cloned().collect())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_set_delete() {
        let store = InMemoryStateStore::new();
        assert!(store.get("winstreaks").unwrap().is_none());

        store.set("winstreaks", json!({"steve": {"bed": 3}})).unwrap();
        assert_eq!(store.get("winstreaks").unwrap().unwrap()["steve"]["bed"], 3);
        assert_eq!(store.keys().unwrap(), vec!["winstreaks".to_string()]);

        assert!(store.delete("winstreaks").unwrap());
        assert!(!store.delete("winstreaks").unwrap());
    }
}
