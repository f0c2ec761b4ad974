//! Per player, per family consecutive-win counter

use crate::types::{Family, MatchEvent, PlayerId};
use std::collections::HashMap;

/// Streaks keyed by player, then family
pub type StreakMap = HashMap<PlayerId, HashMap<Family, u32>>;

#[derive(Debug, Clone, Default)]
pub struct StreakTracker {
    streaks: StreakMap,
}

impl StreakTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(streaks: StreakMap) -> Self {
        Self { streaks }
    }

    /// Apply one event and return the resulting streak
    pub fn apply(&mut self, event: &MatchEvent) -> u32 {
        let slot = self
            .streaks
            .entry(event.player_id.clone())
            .or_default()
            .entry(event.family.clone())
            .or_insert(0);

        if event.is_win {
            *slot = slot.saturating_add(1);
        } else {
            *slot = 0;
        }
        *slot
    }

    pub fn get(&self, player_id: &str, family: &str) -> u32 {
        self.streaks
            .get(player_id)
            .and_then(|families| families.get(family))
            .copied()
            .unwrap_or(0)
    }

    /// Overwrite a streak (manual correction)
    pub fn set(&mut self, player_id: &str, family: &str, value: u32) {
        self.streaks
            .entry(player_id.to_string())
            .or_default()
            .insert(family.to_string(), value);
    }

    /// Start every given family at zero without touching existing values
    pub fn init_families<'a>(&mut self, player_id: &str, families: impl IntoIterator<Item = &'a Family>) {
        let entry = self.streaks.entry(player_id.to_string()).or_default();
        for family in families {
            entry.entry(family.clone()).or_insert(0);
        }
    }

    pub fn player_streaks(&self, player_id: &str) -> Option<&HashMap<Family, u32>> {
        self.streaks.get(player_id)
    }

    pub fn remove_player(&mut self, player_id: &str) {
        self.streaks.remove(player_id);
    }

    pub fn as_map(&self) -> &StreakMap {
        &self.streaks
    }
}
