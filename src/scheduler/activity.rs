//! Active/inactive bucketing
//!
//! A player is active while their last detected match is within the active
//! window. Inactive players are only re-checked once per inactive interval.

use crate::types::PlayerId;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityBucket {
    Active,
    Inactive,
}

impl ActivityBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityBucket::Active => "active",
            ActivityBucket::Inactive => "inactive",
        }
    }
}

impl std::fmt::Display for ActivityBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivitySettings {
    pub active_window: Duration,
    pub inactive_interval: Duration,
}

impl Default for ActivitySettings {
    fn default() -> Self {
        Self {
            active_window: Duration::minutes(30),
            inactive_interval: Duration::minutes(2),
        }
    }
}

/// Players selected for one scheduler tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollPlan {
    pub active: Vec<PlayerId>,
    pub inactive: Vec<PlayerId>,
    /// Inactive players skipped because they were checked recently
    pub deferred: usize,
}

impl PollPlan {
    pub fn is_empty(&self) -> bool {
        self.active.is_empty() && self.inactive.is_empty()
    }

    pub fn len(&self) -> usize {
        self.active.len() + self.inactive.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ActivityTracker {
    settings: ActivitySettings,
    last_match: HashMap<PlayerId, DateTime<Utc>>,
    last_inactive_check: HashMap<PlayerId, DateTime<Utc>>,
}

impl ActivityTracker {
    pub fn new(settings: ActivitySettings) -> Self {
        Self {
            settings,
            last_match: HashMap::new(),
            last_inactive_check: HashMap::new(),
        }
    }

    pub fn with_state(
        settings: ActivitySettings,
        last_match: HashMap<PlayerId, DateTime<Utc>>,
        last_inactive_check: HashMap<PlayerId, DateTime<Utc>>,
    ) -> Self {
        Self {
            settings,
            last_match,
            last_inactive_check,
        }
    }

    pub fn settings(&self) -> &ActivitySettings {
        &self.settings
    }

    /// Bucket for a player; a player never seen counts as active
    pub fn bucket(&self, player_id: &str, now: DateTime<Utc>) -> ActivityBucket {
        let last = self.last_match.get(player_id).copied().unwrap_or(now);
        if last < now - self.settings.active_window {
            ActivityBucket::Inactive
        } else {
            ActivityBucket::Active
        }
    }

    /// Record a detected match, moving the player to the active bucket
    pub fn mark_active(&mut self, player_id: &str, at: DateTime<Utc>) {
        self.last_match.insert(player_id.to_string(), at);
    }

    pub fn last_seen(&self, player_id: &str) -> Option<DateTime<Utc>> {
        self.last_match.get(player_id).copied()
    }

    /// Whether an inactive player is due for a check
    pub fn is_due(&self, player_id: &str, now: DateTime<Utc>) -> bool {
        match self.last_inactive_check.get(player_id) {
            Some(last) => now - *last >= self.settings.inactive_interval,
            None => true,
        }
    }

    pub fn mark_checked(&mut self, player_id: &str, now: DateTime<Utc>) {
        self.last_inactive_check.insert(player_id.to_string(), now);
    }

    /// Split players into this tick's fetch lists
    ///
    /// Inactive players that are due are marked as checked immediately,
    /// whatever the outcome of their fetch.
    pub fn plan<'a>(&mut self, players: impl IntoIterator<Item = &'a PlayerId>, now: DateTime<Utc>) -> PollPlan {
        let mut plan = PollPlan::default();
        for player_id in players {
            match self.bucket(player_id, now) {
                ActivityBucket::Active => plan.active.push(player_id.clone()),
                ActivityBucket::Inactive if self.is_due(player_id, now) => {
                    self.mark_checked(player_id, now);
                    plan.inactive.push(player_id.clone());
                }
                ActivityBucket::Inactive => plan.deferred += 1,
            }
        }
        plan
    }

    pub fn remove_player(&mut self, player_id: &str) {
        self.last_match.remove(player_id);
        self.last_inactive_check.remove(player_id);
    }

    pub fn last_seen_map(&self) -> &HashMap<PlayerId, DateTime<Utc>> {
        &self.last_match
    }

    pub fn inactive_check_map(&self) -> &HashMap<PlayerId, DateTime<Utc>> {
        &self.last_inactive_check
    }
}
