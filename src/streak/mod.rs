//! Winstreak tracking and milestone alerts

pub mod milestone;
pub mod tracker;

pub use milestone::{MilestoneAlert, MilestoneMonitor, MILESTONE_STEP};
pub use tracker::StreakTracker;
