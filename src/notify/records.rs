//! Structured notification records

use crate::classifier::VariantDistribution;
use crate::forecast::CountdownTick;
use crate::roster::DailyKd;
use crate::types::{Family, PlayerId, StatRecord};
use crate::utils::TrackingDuration;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One inferred game, enriched with everything known at the time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameNotification {
    pub player_id: PlayerId,
    pub display_name: String,
    pub family: Family,
    pub family_display: String,
    pub is_win: bool,
    pub stats_delta: StatRecord,
    /// Streak after this game was applied
    pub streak: u32,
    pub variant_percentages: Option<VariantDistribution>,
    pub variant_summary: Option<String>,
    pub queue_eta_seconds: Option<u64>,
    pub daily_kd: Option<DailyKd>,
    pub occurred_at: DateTime<Utc>,
}

impl GameNotification {
    pub fn result_label(&self) -> &'static str {
        if self.is_win {
            "WIN"
        } else {
            "LOSS"
        }
    }

    /// Whether a presenter should start a countdown for this record
    pub fn wants_countdown(&self) -> bool {
        self.is_win && self.queue_eta_seconds.is_some_and(|eta| eta > 0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneNotification {
    pub player_id: PlayerId,
    pub display_name: String,
    pub family: Family,
    pub family_display: String,
    pub streak: u32,
    pub occurred_at: DateTime<Utc>,
}

/// A temporary grant ran out and the player was removed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingExpired {
    pub player_id: PlayerId,
    pub display_name: String,
    pub duration: TrackingDuration,
    pub added_at: DateTime<Utc>,
    pub expired_at: DateTime<Utc>,
}

/// One step of a running queue countdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountdownUpdate {
    pub player_id: PlayerId,
    pub display_name: String,
    pub family: Family,
    /// `None` once the countdown has run out
    pub remaining_seconds: Option<u64>,
}

impl CountdownUpdate {
    pub fn from_tick(game: &GameNotification, tick: CountdownTick) -> Self {
        let remaining_seconds = match tick {
            CountdownTick::Remaining(seconds) => Some(seconds),
            CountdownTick::Expired => None,
        };
        Self {
            player_id: game.player_id.clone(),
            display_name: game.display_name.clone(),
            family: game.family.clone(),
            remaining_seconds,
        }
    }
}

/// Record wrapped with delivery metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEnvelope<T> {
    pub payload: T,
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: String,
}

impl<T> NotificationEnvelope<T>
where
    T: Serialize,
{
    pub fn new(payload: T, kind: impl Into<String>) -> Self {
        Self {
            payload,
            correlation_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            kind: kind.into(),
        }
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        serde_json::to_string(self).map_err(|e| {
            crate::error::TrackerError::InternalError {
                message: format!("Failed to serialize notification: {}", e),
            }
            .into()
        })
    }
}
