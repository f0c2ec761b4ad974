//! Tracked-player roster and daily counters

pub mod daily;
pub mod roster;

pub use daily::{DailyKd, DailyStats, DailyStatsTracker};
pub use roster::{Roster, TrackedPlayer, TrackingKind};
