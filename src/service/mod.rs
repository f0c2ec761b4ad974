//! Service layer for the tracker
//!
//! Application state, background task management and health checks for the
//! long-running process.

pub mod app;
pub mod health;

pub use app::{AppState, ServiceError, ServiceHandle};
pub use health::{HealthCheck, HealthStatus};
