//! Daily kill/death counters
//!
//! Counters roll over at local midnight in the configured timezone. Rollover
//! happens lazily on the next update and eagerly via [`DailyStatsTracker::reset_all`].

use crate::types::{Family, PlayerId};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

/// Kills and deaths accumulated since local midnight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStats {
    pub kills: u64,
    pub deaths: u64,
    pub reset_date: NaiveDate,
}

impl DailyStats {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            kills: 0,
            deaths: 0,
            reset_date: date,
        }
    }
}

/// Daily K/D summary shown on game notifications
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyKd {
    pub kills: u64,
    pub deaths: u64,
    pub ratio: f64,
}

impl std::fmt::Display for DailyKd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2} ({}K/{}D)", self.ratio, self.kills, self.deaths)
    }
}

pub type DailyStatsMap = HashMap<PlayerId, HashMap<Family, DailyStats>>;

#[derive(Debug, Clone)]
pub struct DailyStatsTracker {
    timezone: Tz,
    stats: DailyStatsMap,
}

impl DailyStatsTracker {
    pub fn new(timezone: Tz) -> Self {
        Self {
            timezone,
            stats: HashMap::new(),
        }
    }

    pub fn with_stats(timezone: Tz, stats: DailyStatsMap) -> Self {
        Self { timezone, stats }
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Local calendar date for an instant
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.timezone).date_naive()
    }

    /// Add one game's kills and deaths; games without either are ignored
    pub fn record(&mut self, player_id: &str, family: &str, kills: u64, deaths: u64, now: DateTime<Utc>) {
        if kills == 0 && deaths == 0 {
            return;
        }

        let today = self.local_date(now);
        let entry = self
            .stats
            .entry(player_id.to_string())
            .or_default()
            .entry(family.to_string())
            .or_insert_with(|| DailyStats::empty(today));

        if entry.reset_date != today {
            *entry = DailyStats::empty(today);
        }
        entry.kills += kills;
        entry.deaths += deaths;
    }

    /// Today's K/D, `None` when there are no kills today
    pub fn kd(&self, player_id: &str, family: &str, now: DateTime<Utc>) -> Option<DailyKd> {
        let stats = self.stats.get(player_id)?.get(family)?;
        if stats.reset_date != self.local_date(now) || stats.kills == 0 {
            return None;
        }

        let ratio = if stats.deaths == 0 {
            stats.kills as f64
        } else {
            stats.kills as f64 / stats.deaths as f64
        };

        Some(DailyKd {
            kills: stats.kills,
            deaths: stats.deaths,
            ratio,
        })
    }

    /// Zero every counter (midnight reset)
    pub fn reset_all(&mut self, now: DateTime<Utc>) {
        let today = self.local_date(now);
        for families in self.stats.values_mut() {
            for stats in families.values_mut() {
                *stats = DailyStats::empty(today);
            }
        }
        info!("Daily stats reset for {} players", self.stats.len());
    }

    /// Time until the next local midnight
    pub fn until_next_reset(&self, now: DateTime<Utc>) -> chrono::Duration {
        let today = self.local_date(now);
        let next = today
            .succ_opt()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .and_then(|naive| naive.and_local_timezone(self.timezone).earliest())
            .map(|local| local.with_timezone(&Utc));

        match next {
            Some(next) => next - now,
            None => chrono::Duration::hours(24),
        }
    }

    pub fn get(&self, player_id: &str, family: &str) -> Option<&DailyStats> {
        self.stats.get(player_id)?.get(family)
    }

    pub fn remove_player(&mut self, player_id: &str) {
        self.stats.remove(player_id);
    }

    pub fn as_map(&self) -> &DailyStatsMap {
        &self.stats
    }
}
