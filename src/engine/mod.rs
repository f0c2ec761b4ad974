//! Tracker engine: every per-player map behind one owner

pub mod engine;

pub use engine::{ApplyOutcome, EngineSettings, PlayerSummary, TrackerEngine};
