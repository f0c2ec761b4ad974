//! Stats provider boundary
//!
//! The scheduler only sees [`StatsProvider`]; the HTTP implementation for
//! the public Hive API lives in [`hive`].

pub mod extract;
pub mod hive;

pub use extract::{extract_game_stats, extract_player_stats};
pub use hive::{HiveProviderConfig, HiveStatsProvider};

use crate::error::FetchError;
use crate::types::StatSnapshot;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One successful fetch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    /// Name as the provider capitalises it
    pub display_name: String,
    pub snapshot: StatSnapshot,
}

impl PlayerStats {
    pub fn total_played(&self) -> u64 {
        self.snapshot.values().map(|r| r.played).sum()
    }

    pub fn total_victories(&self) -> u64 {
        self.snapshot.values().map(|r| r.victories).sum()
    }
}

/// Trait for fetching a player's cumulative stats
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatsProvider: Send + Sync {
    /// Fetch the current snapshot for a player name
    async fn fetch(&self, player_name: &str) -> std::result::Result<PlayerStats, FetchError>;
}
