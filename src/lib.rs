//! Hive Tracker - stats poller and match inference engine
//!
//! This crate polls a public stats provider for a roster of tracked players
//! and turns cumulative counters into discrete match events enriched with
//! winstreaks, queue forecasts, and sub-variant classification.

pub mod classifier;
pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod forecast;
pub mod metrics;
pub mod notify;
pub mod provider;
pub mod roster;
pub mod scheduler;
pub mod service;
pub mod storage;
pub mod streak;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{FetchError, Result, TrackerError};
pub use types::*;

// Re-export key components
pub use engine::TrackerEngine;
pub use notify::NotificationSink;
pub use provider::StatsProvider;
pub use scheduler::PollScheduler;
pub use storage::StateStore;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
