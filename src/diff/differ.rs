//! Match event differ
//!
//! The provider only exposes cumulative counters, so the differ approximates
//! per-game values by splitting each counter's growth evenly across the games
//! played in the interval. Wins are emitted before losses; the true order of
//! games inside one poll interval cannot be recovered.

use crate::types::{Family, MatchEvent, PlayerId, StatField, StatRecord, StatSnapshot};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Aggregate change for one family between two snapshots
#[derive(Debug, Clone, PartialEq)]
pub struct FamilyDiff {
    pub family: Family,
    pub games: u64,
    pub wins: u64,
    pub per_game: StatRecord,
}

impl FamilyDiff {
    pub fn losses(&self) -> u64 {
        self.games - self.wins
    }
}

/// Stateless snapshot differ
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchEventDiffer;

impl MatchEventDiffer {
    pub fn new() -> Self {
        Self
    }

    /// Compute the change for a single family, or `None` when no game was played
    pub fn diff_family(&self, family: &str, old: &StatRecord, new: &StatRecord) -> Option<FamilyDiff> {
        let games = new.played as i128 - old.played as i128;
        if games <= 0 {
            return None;
        }

        let wins = (new.victories as i128 - old.victories as i128).clamp(0, games);

        let mut per_game = StatRecord {
            played: 1,
            ..StatRecord::default()
        };
        for field in StatField::ALL {
            let growth = new.get(field) as i128 - old.get(field) as i128;
            let share = growth.div_euclid(games).max(0);
            per_game.set(field, share as u64);
        }

        Some(FamilyDiff {
            family: family.to_string(),
            games: games as u64,
            wins: wins as u64,
            per_game,
        })
    }

    /// Produce the ordered match events implied by moving from `old` to `new`
    ///
    /// Families missing from `old` are compared against an all-zero record.
    /// Families missing from `new` produce nothing.
    pub fn diff(
        &self,
        player_id: &PlayerId,
        old: &StatSnapshot,
        new: &StatSnapshot,
        now: DateTime<Utc>,
    ) -> Vec<MatchEvent> {
        let mut events = Vec::new();
        let zero = StatRecord::default();

        for (family, new_record) in new {
            let old_record = old.get(family).unwrap_or(&zero);
            let Some(change) = self.diff_family(family, old_record, new_record) else {
                continue;
            };

            debug!(
                "Detected {} game(s) for {} in {} ({} win(s))",
                change.games, player_id, family, change.wins
            );

            for index in 0..change.games {
                let is_win = index < change.wins;
                let mut stats_delta = change.per_game;
                stats_delta.victories = u64::from(is_win);

                events.push(MatchEvent {
                    player_id: player_id.clone(),
                    family: family.clone(),
                    is_win,
                    stats_delta,
                    occurred_at: now,
                });
            }
        }

        events
    }
}
