//! Test fixtures and mock implementations for integration testing

#![allow(dead_code)]

use async_trait::async_trait;
use hive_tracker::error::{FetchError, Result};
use hive_tracker::notify::{
    CountdownUpdate, GameNotification, MilestoneNotification, NotificationSink, TrackingExpired,
};
use hive_tracker::provider::{PlayerStats, StatsProvider};
use hive_tracker::types::{StatRecord, StatSnapshot};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Stats provider that replays queued responses per player
///
/// When a player's queue runs dry the last successful response is repeated,
/// which looks like a player who stopped playing.
#[derive(Debug, Default, Clone)]
pub struct ScriptedStatsProvider {
    scripts: Arc<Mutex<HashMap<String, VecDeque<std::result::Result<PlayerStats, FetchError>>>>>,
    last: Arc<Mutex<HashMap<String, PlayerStats>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedStatsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response for a player
    pub fn push(&self, player: &str, stats: PlayerStats) {
        self.push_result(player, Ok(stats));
    }

    pub fn push_result(&self, player: &str, result: std::result::Result<PlayerStats, FetchError>) {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts.entry(player.to_lowercase()).or_default().push_back(result);
        }
    }

    /// Names fetched so far, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn call_count(&self, player: &str) -> usize {
        self.calls().iter().filter(|name| name.as_str() == player).count()
    }
}

#[async_trait]
impl StatsProvider for ScriptedStatsProvider {
    async fn fetch(&self, player_name: &str) -> std::result::Result<PlayerStats, FetchError> {
        let key = player_name.to_lowercase();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(key.clone());
        }

        let next = self
            .scripts
            .lock()
            .ok()
            .and_then(|mut scripts| scripts.get_mut(&key).and_then(VecDeque::pop_front));

        match next {
            Some(Ok(stats)) => {
                if let Ok(mut last) = self.last.lock() {
                    last.insert(key, stats.clone());
                }
                Ok(stats)
            }
            Some(Err(e)) => Err(e),
            None => self
                .last
                .lock()
                .ok()
                .and_then(|last| last.get(&key).cloned())
                .ok_or(FetchError::NotFound),
        }
    }
}

/// Notification sink that keeps every record for inspection
#[derive(Debug, Default)]
pub struct CapturingNotificationSink {
    games: Mutex<Vec<GameNotification>>,
    milestones: Mutex<Vec<MilestoneNotification>>,
    expired: Mutex<Vec<TrackingExpired>>,
    countdowns: Mutex<Vec<CountdownUpdate>>,
}

impl CapturingNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn games(&self) -> Vec<GameNotification> {
        self.games.lock().map(|g| g.clone()).unwrap_or_default()
    }

    pub fn milestones(&self) -> Vec<MilestoneNotification> {
        self.milestones.lock().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn expired(&self) -> Vec<TrackingExpired> {
        self.expired.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn countdowns(&self) -> Vec<CountdownUpdate> {
        self.countdowns.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl NotificationSink for CapturingNotificationSink {
    async fn publish_game(&self, record: GameNotification) -> Result<()> {
        if let Ok(mut games) = self.games.lock() {
            games.push(record);
        }
        Ok(())
    }

    async fn publish_milestone(&self, record: MilestoneNotification) -> Result<()> {
        if let Ok(mut milestones) = self.milestones.lock() {
            milestones.push(record);
        }
        Ok(())
    }

    async fn publish_expired(&self, record: TrackingExpired) -> Result<()> {
        if let Ok(mut expired) = self.expired.lock() {
            expired.push(record);
        }
        Ok(())
    }

    async fn publish_countdown(&self, update: CountdownUpdate) -> Result<()> {
        if let Ok(mut countdowns) = self.countdowns.lock() {
            countdowns.push(update);
        }
        Ok(())
    }
}

/// Stats for one player in one family
pub fn player_stats(display_name: &str, family: &str, record: StatRecord) -> PlayerStats {
    let mut snapshot = StatSnapshot::new();
    snapshot.insert(family.to_string(), record);
    PlayerStats {
        display_name: display_name.to_string(),
        snapshot,
    }
}

pub fn record(played: u64, victories: u64, kills: u64, deaths: u64) -> StatRecord {
    StatRecord {
        played,
        victories,
        kills,
        deaths,
        ..Default::default()
    }
}
