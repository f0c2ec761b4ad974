//! Configuration management for the tracker
//!
//! Handles configuration loading from environment variables and TOML files,
//! validation, and default values.

pub mod app;

// Re-export commonly used types
pub use app::{
    validate_config, AppConfig, ClassifierSettings, PollingSettings, ProviderSettings,
    RosterSettings, ServiceSettings, StorageSettings,
};
