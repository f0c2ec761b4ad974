//! Utility functions for the tracker

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Normalise a player name into the key used for all per-player state
pub fn normalize_player_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Render the time elapsed since `then` as a short "ago" string
pub fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = now.signed_duration_since(then).num_seconds().max(0);
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("{}d ago", days)
    } else if hours > 0 {
        format!("{}h ago", hours)
    } else if minutes > 0 {
        format!("{}m ago", minutes)
    } else if seconds > 0 {
        format!("{}s ago", seconds)
    } else {
        "just now".to_string()
    }
}

/// Length of a temporary tracking grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackingDuration {
    OneDay,
    ThreeDays,
    SevenDays,
}

impl TrackingDuration {
    /// Parse `1d`, `3d` or `7d`; anything else falls back to one day
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "3d" => TrackingDuration::ThreeDays,
            "7d" => TrackingDuration::SevenDays,
            _ => TrackingDuration::OneDay,
        }
    }

    pub fn as_duration(&self) -> Duration {
        match self {
            TrackingDuration::OneDay => Duration::days(1),
            TrackingDuration::ThreeDays => Duration::days(3),
            TrackingDuration::SevenDays => Duration::days(7),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TrackingDuration::OneDay => "1d",
            TrackingDuration::ThreeDays => "3d",
            TrackingDuration::SevenDays => "7d",
        }
    }
}
