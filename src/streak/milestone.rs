//! Milestone alerts for long winstreaks
//!
//! An alert fires once per multiple of [`MILESTONE_STEP`] per climb. When the
//! streak falls below the last alerted value the monitor re-arms, so climbing
//! past the same multiple again alerts again.

use crate::types::{Family, PlayerId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Streak multiple that triggers an alert
pub const MILESTONE_STEP: u32 = 50;

/// Last alerted streak keyed by player, then family
pub type MilestoneMap = HashMap<PlayerId, HashMap<Family, u32>>;

/// A streak crossing a milestone multiple
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneAlert {
    pub player_id: PlayerId,
    pub family: Family,
    pub streak: u32,
}

#[derive(Debug, Clone, Default)]
pub struct MilestoneMonitor {
    last_alerted: MilestoneMap,
}

impl MilestoneMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(last_alerted: MilestoneMap) -> Self {
        Self { last_alerted }
    }

    /// Observe a new streak value, returning an alert when a milestone is crossed
    pub fn check(&mut self, player_id: &str, family: &str, new_streak: u32) -> Option<MilestoneAlert> {
        let last = self
            .last_alerted
            .entry(player_id.to_string())
            .or_default()
            .entry(family.to_string())
            .or_insert(0);

        if new_streak < *last {
            *last = 0;
        }

        if new_streak > 0 && new_streak % MILESTONE_STEP == 0 && new_streak > *last {
            *last = new_streak;
            return Some(MilestoneAlert {
                player_id: player_id.to_string(),
                family: family.to_string(),
                streak: new_streak,
            });
        }

        None
    }

    pub fn last_alerted(&self, player_id: &str, family: &str) -> u32 {
        self.last_alerted
            .get(player_id)
            .and_then(|families| families.get(family))
            .copied()
            .unwrap_or(0)
    }

    pub fn remove_player(&mut self, player_id: &str) {
        self.last_alerted.remove(player_id);
    }

    pub fn as_map(&self) -> &MilestoneMap {
        &self.last_alerted
    }
}
