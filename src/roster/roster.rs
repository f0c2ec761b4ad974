//! Roster of tracked players
//!
//! Players are tracked either permanently or temporarily with an expiry.
//! Both kinds share a single capacity limit.

use crate::error::{Result, TrackerError};
use crate::types::{PlayerId, StatSnapshot};
use crate::utils::TrackingDuration;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrackingKind {
    Permanent,
    Temporary {
        duration: TrackingDuration,
        expires_at: DateTime<Utc>,
    },
}

impl TrackingKind {
    pub fn temporary(duration: TrackingDuration, now: DateTime<Utc>) -> Self {
        TrackingKind::Temporary {
            duration,
            expires_at: now + duration.as_duration(),
        }
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self, TrackingKind::Temporary { .. })
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self {
            TrackingKind::Permanent => false,
            TrackingKind::Temporary { expires_at, .. } => *expires_at <= now,
        }
    }
}

/// A player on the roster together with the baseline snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedPlayer {
    pub player_id: PlayerId,
    pub display_name: String,
    pub kind: TrackingKind,
    pub added_at: DateTime<Utc>,
    #[serde(default)]
    pub last_snapshot: StatSnapshot,
    /// Set when the stored snapshot could not be trusted; the next fetch
    /// only re-establishes the baseline
    #[serde(default)]
    pub needs_baseline: bool,
}

impl TrackedPlayer {
    pub fn new(
        player_id: PlayerId,
        display_name: String,
        kind: TrackingKind,
        snapshot: StatSnapshot,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            player_id,
            display_name,
            kind,
            added_at: now,
            last_snapshot: snapshot,
            needs_baseline: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Roster {
    players: HashMap<PlayerId, TrackedPlayer>,
    max_players: usize,
}

impl Roster {
    pub fn new(max_players: usize) -> Self {
        Self {
            players: HashMap::new(),
            max_players,
        }
    }

    pub fn max_players(&self) -> usize {
        self.max_players
    }

    pub fn add(&mut self, player: TrackedPlayer) -> Result<()> {
        if self.players.contains_key(&player.player_id) {
            return Err(TrackerError::PlayerAlreadyTracked {
                player_id: player.player_id,
            }
            .into());
        }
        if self.players.len() >= self.max_players {
            return Err(TrackerError::RosterFull {
                limit: self.max_players,
            }
            .into());
        }

        self.players.insert(player.player_id.clone(), player);
        Ok(())
    }

    /// Insert without limit checks, used when restoring persisted state
    pub fn restore(&mut self, player: TrackedPlayer) {
        self.players.insert(player.player_id.clone(), player);
    }

    pub fn remove(&mut self, player_id: &str) -> Option<TrackedPlayer> {
        self.players.remove(player_id)
    }

    pub fn get(&self, player_id: &str) -> Option<&TrackedPlayer> {
        self.players.get(player_id)
    }

    pub fn get_mut(&mut self, player_id: &str) -> Option<&mut TrackedPlayer> {
        self.players.get_mut(player_id)
    }

    pub fn contains(&self, player_id: &str) -> bool {
        self.players.contains_key(player_id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedPlayer> {
        self.players.values()
    }

    /// Player ids in a stable order
    pub fn ids(&self) -> Vec<PlayerId> {
        let mut ids: Vec<PlayerId> = self.players.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn temporary_count(&self) -> usize {
        self.players.values().filter(|p| p.kind.is_temporary()).count()
    }

    /// Temporary players whose grant has run out
    pub fn expired(&self, now: DateTime<Utc>) -> Vec<PlayerId> {
        let mut expired: Vec<PlayerId> = self
            .players
            .values()
            .filter(|p| p.kind.is_expired(now))
            .map(|p| p.player_id.clone())
            .collect();
        expired.sort();
        expired
    }
}
