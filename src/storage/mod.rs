//! Durable state storage
//!
//! The engine persists into a flat keyed store: one key per section, each
//! section a JSON object keyed by player. [`persisted`] owns the typed
//! encode/decode step including migration of legacy shapes.

pub mod file;
pub mod memory;
pub mod persisted;

pub use file::JsonFileStore;
pub use memory::InMemoryStateStore;
pub use persisted::{load_state, save_state, EngineState, LoadedState};

use crate::error::Result;
use serde_json::Value;

/// Trait for key/value state storage operations
pub trait StateStore: Send + Sync {
    /// Get the value stored under a key
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Store or replace a value
    fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Remove a key, returning whether it existed
    fn delete(&self, key: &str) -> Result<bool>;

    /// All stored keys
    fn keys(&self) -> Result<Vec<String>>;

    /// Make pending writes durable
    fn flush(&self) -> Result<()>;
}
