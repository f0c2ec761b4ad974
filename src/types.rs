//! Common types used throughout the tracker

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Normalised (lower-case) player name used as the key for all per-player state
pub type PlayerId = String;

/// Top-level game category key as reported by the provider (e.g. `bed`, `sg`)
pub type Family = String;

/// Cumulative counters for one player in one game family
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatRecord {
    #[serde(default)]
    pub played: u64,
    #[serde(default)]
    pub victories: u64,
    #[serde(default)]
    pub deaths: u64,
    #[serde(default)]
    pub kills: u64,
    #[serde(default)]
    pub final_kills: u64,
    #[serde(default)]
    pub beds_destroyed: u64,
    #[serde(default)]
    pub coins: u64,
    #[serde(default)]
    pub murders: u64,
    #[serde(default)]
    pub murderer_eliminations: u64,
    #[serde(default)]
    pub goals: u64,
}

/// Counters that are split evenly across the games of one diff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatField {
    Deaths,
    Kills,
    FinalKills,
    BedsDestroyed,
    Coins,
    Murders,
    MurdererEliminations,
    Goals,
}

impl StatField {
    pub const ALL: [StatField; 8] = [
        StatField::Deaths,
        StatField::Kills,
        StatField::FinalKills,
        StatField::BedsDestroyed,
        StatField::Coins,
        StatField::Murders,
        StatField::MurdererEliminations,
        StatField::Goals,
    ];

    /// Provider field name
    pub fn key(&self) -> &'static str {
        match self {
            StatField::Deaths => "deaths",
            StatField::Kills => "kills",
            StatField::FinalKills => "final_kills",
            StatField::BedsDestroyed => "beds_destroyed",
            StatField::Coins => "coins",
            StatField::Murders => "murders",
            StatField::MurdererEliminations => "murderer_eliminations",
            StatField::Goals => "goals",
        }
    }
}

impl StatRecord {
    pub fn get(&self, field: StatField) -> u64 {
        match field {
            StatField::Deaths => self.deaths,
            StatField::Kills => self.kills,
            StatField::FinalKills => self.final_kills,
            StatField::BedsDestroyed => self.beds_destroyed,
            StatField::Coins => self.coins,
            StatField::Murders => self.murders,
            StatField::MurdererEliminations => self.murderer_eliminations,
            StatField::Goals => self.goals,
        }
    }

    pub fn set(&mut self, field: StatField, value: u64) {
        let slot = match field {
            StatField::Deaths => &mut self.deaths,
            StatField::Kills => &mut self.kills,
            StatField::FinalKills => &mut self.final_kills,
            StatField::BedsDestroyed => &mut self.beds_destroyed,
            StatField::Coins => &mut self.coins,
            StatField::Murders => &mut self.murders,
            StatField::MurdererEliminations => &mut self.murderer_eliminations,
            StatField::Goals => &mut self.goals,
        };
        *slot = value;
    }
}

/// Cumulative counters per family for one player as of the last successful fetch
pub type StatSnapshot = BTreeMap<Family, StatRecord>;

/// One inferred discrete game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchEvent {
    pub player_id: PlayerId,
    pub family: Family,
    pub is_win: bool,
    pub stats_delta: StatRecord,
    pub occurred_at: DateTime<Utc>,
}

/// Human-readable name for a game family key
pub fn family_display_name(family: &str) -> String {
    match family {
        "bed" => "BedWars".to_string(),
        "dr" => "Death Run".to_string(),
        "hide" => "Hide and Seek".to_string(),
        "party" => "Block Party".to_string(),
        "drop" => "Block Drop".to_string(),
        "ground" => "Ground Wars".to_string(),
        "sky" => "Sky Wars".to_string(),
        "ctf" => "Capture The Flag".to_string(),
        "bridge" => "The Bridge".to_string(),
        "murder" => "Murder Mystery".to_string(),
        "sg" => "Survival Games".to_string(),
        other => other.to_uppercase(),
    }
}
