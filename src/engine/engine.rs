//! Tracker engine
//!
//! Owns every per-player map and applies one fetch result at a time. All
//! methods are synchronous; callers serialise access (the scheduler keeps
//! the engine behind a single lock), which makes each apply atomic.

use crate::classifier::{format_percentages, VariantClassifier, VariantTable};
use crate::diff::MatchEventDiffer;
use crate::error::{Result, TrackerError};
use crate::forecast::{BoundedWindow, ForecastSettings, QueueForecaster};
use crate::notify::{GameNotification, MilestoneNotification, TrackingExpired};
use crate::provider::PlayerStats;
use crate::roster::{DailyStatsTracker, Roster, TrackedPlayer, TrackingKind};
use crate::scheduler::activity::{ActivityBucket, ActivitySettings, ActivityTracker, PollPlan};
use crate::storage::EngineState;
use crate::streak::{MilestoneMonitor, StreakTracker};
use crate::types::{family_display_name, Family, PlayerId};
use crate::utils::{normalize_player_name, time_ago};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub max_players: usize,
    pub forecast: ForecastSettings,
    pub activity: ActivitySettings,
    pub timezone: Tz,
    pub variant_table: Arc<VariantTable>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_players: 75,
            forecast: ForecastSettings::default(),
            activity: ActivitySettings::default(),
            timezone: chrono_tz::Europe::Berlin,
            variant_table: Arc::new(VariantTable::default()),
        }
    }
}

/// Everything one applied fetch produced
#[derive(Debug, Clone, Default)]
pub struct ApplyOutcome {
    pub games: Vec<GameNotification>,
    pub milestones: Vec<MilestoneNotification>,
    /// The fetch only re-established a trusted baseline
    pub baseline_reset: bool,
}

impl ApplyOutcome {
    pub fn is_empty(&self) -> bool {
        self.games.is_empty() && self.milestones.is_empty()
    }
}

/// Row of the "last seen" report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerSummary {
    pub player_id: PlayerId,
    pub display_name: String,
    pub tracking: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub bucket: ActivityBucket,
    pub last_seen: Option<DateTime<Utc>>,
    pub last_seen_ago: String,
    pub streaks: BTreeMap<Family, u32>,
}

#[derive(Debug, Clone)]
pub struct TrackerEngine {
    settings: EngineSettings,
    roster: Roster,
    differ: MatchEventDiffer,
    streaks: StreakTracker,
    milestones: MilestoneMonitor,
    forecaster: QueueForecaster,
    classifier: VariantClassifier,
    daily: DailyStatsTracker,
    activity: ActivityTracker,
    dirty: bool,
}

impl Default for TrackerEngine {
    fn default() -> Self {
        Self::new(EngineSettings::default())
    }
}

impl TrackerEngine {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            roster: Roster::new(settings.max_players),
            differ: MatchEventDiffer::new(),
            streaks: StreakTracker::new(),
            milestones: MilestoneMonitor::new(),
            forecaster: QueueForecaster::new(settings.forecast.clone()),
            classifier: VariantClassifier::new(settings.variant_table.clone()),
            daily: DailyStatsTracker::new(settings.timezone),
            activity: ActivityTracker::new(settings.activity.clone()),
            dirty: false,
            settings,
        }
    }

    /// Rebuild an engine from persisted state
    pub fn from_state(settings: EngineSettings, state: EngineState) -> Self {
        let mut roster = Roster::new(settings.max_players);
        for player in state.players {
            roster.restore(player);
        }

        let window_capacity = settings.forecast.window_capacity;
        let match_times = state
            .match_times
            .into_iter()
            .map(|(player, families)| {
                let families = families
                    .into_iter()
                    .map(|(family, times)| (family, BoundedWindow::from_items(window_capacity, times)))
                    .collect();
                (player, families)
            })
            .collect();

        let history_capacity = settings.variant_table.history_capacity;
        let histories = state
            .variant_history
            .into_iter()
            .map(|(player, samples)| (player, BoundedWindow::from_items(history_capacity, samples)))
            .collect();

        Self {
            roster,
            differ: MatchEventDiffer::new(),
            streaks: StreakTracker::from_map(state.streaks),
            milestones: MilestoneMonitor::from_map(state.milestones),
            forecaster: QueueForecaster::with_windows(settings.forecast.clone(), match_times),
            classifier: VariantClassifier::with_histories(settings.variant_table.clone(), histories),
            daily: DailyStatsTracker::with_stats(settings.timezone, state.daily_stats),
            activity: ActivityTracker::with_state(
                settings.activity.clone(),
                state.last_seen,
                state.inactive_last_check,
            ),
            dirty: false,
            settings,
        }
    }

    /// Snapshot of everything that is persisted
    pub fn to_state(&self) -> EngineState {
        let mut players: Vec<TrackedPlayer> = self.roster.iter().cloned().collect();
        players.sort_by(|a, b| a.player_id.cmp(&b.player_id));

        EngineState {
            players,
            streaks: self.streaks.as_map().clone(),
            last_seen: self.activity.last_seen_map().clone(),
            match_times: self
                .forecaster
                .as_map()
                .iter()
                .map(|(player, families)| {
                    let families = families
                        .iter()
                        .map(|(family, window)| (family.clone(), window.iter().copied().collect()))
                        .collect();
                    (player.clone(), families)
                })
                .collect(),
            milestones: self.milestones.as_map().clone(),
            variant_history: self
                .classifier
                .as_map()
                .iter()
                .map(|(player, window)| (player.clone(), window.iter().copied().collect()))
                .collect(),
            daily_stats: self.daily.as_map().clone(),
            inactive_last_check: self.activity.inactive_check_map().clone(),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn streaks(&self) -> &StreakTracker {
        &self.streaks
    }

    pub fn milestones(&self) -> &MilestoneMonitor {
        &self.milestones
    }

    pub fn forecaster(&self) -> &QueueForecaster {
        &self.forecaster
    }

    pub fn classifier(&self) -> &VariantClassifier {
        &self.classifier
    }

    pub fn daily(&self) -> &DailyStatsTracker {
        &self.daily
    }

    pub fn activity(&self) -> &ActivityTracker {
        &self.activity
    }

    /// Whether anything changed since the last call, clearing the flag
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Flag state as unsaved again, e.g. after a failed save
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Start tracking a player from a fresh fetch
    ///
    /// The fetched snapshot becomes the baseline, so no events are produced
    /// for games played before tracking began.
    pub fn add_player(
        &mut self,
        requested_name: &str,
        stats: PlayerStats,
        kind: TrackingKind,
        now: DateTime<Utc>,
    ) -> Result<TrackedPlayer> {
        let player_id = normalize_player_name(requested_name);
        let display_name = if stats.display_name.is_empty() {
            requested_name.trim().to_string()
        } else {
            stats.display_name
        };

        let player = TrackedPlayer::new(player_id.clone(), display_name, kind, stats.snapshot, now);
        self.roster.add(player.clone())?;

        self.streaks.init_families(&player_id, player.last_snapshot.keys());
        self.activity.mark_active(&player_id, now);
        self.dirty = true;

        info!(
            "Now tracking {} ({} families, {})",
            player.display_name,
            player.last_snapshot.len(),
            if player.kind.is_temporary() { "temporary" } else { "permanent" }
        );
        Ok(player)
    }

    /// Stop tracking a player and drop all of their state
    pub fn remove_player(&mut self, player_id: &str) -> Result<TrackedPlayer> {
        let player_id = normalize_player_name(player_id);
        let player = self.roster.remove(&player_id).ok_or_else(|| TrackerError::PlayerNotTracked {
            player_id: player_id.clone(),
        })?;

        self.streaks.remove_player(&player_id);
        self.milestones.remove_player(&player_id);
        self.forecaster.remove_player(&player_id);
        self.classifier.remove_player(&player_id);
        self.daily.remove_player(&player_id);
        self.activity.remove_player(&player_id);
        self.dirty = true;

        info!("Stopped tracking {}", player.display_name);
        Ok(player)
    }

    /// Remove every temporary player whose grant has run out
    pub fn expire_temporary(&mut self, now: DateTime<Utc>) -> Vec<TrackingExpired> {
        let mut expired = Vec::new();
        for player_id in self.roster.expired(now) {
            let Ok(player) = self.remove_player(&player_id) else {
                continue;
            };
            if let TrackingKind::Temporary { duration, .. } = player.kind {
                expired.push(TrackingExpired {
                    player_id: player.player_id,
                    display_name: player.display_name,
                    duration,
                    added_at: player.added_at,
                    expired_at: now,
                });
            }
        }

        if !expired.is_empty() {
            info!("Expired {} temporary players", expired.len());
        }
        expired
    }

    /// Overwrite a player's streak for one family
    pub fn set_streak(&mut self, player_id: &str, family: &str, value: u32) -> Result<()> {
        let player_id = normalize_player_name(player_id);
        if !self.roster.contains(&player_id) {
            return Err(TrackerError::PlayerNotTracked { player_id }.into());
        }

        self.streaks.set(&player_id, family, value);
        self.dirty = true;
        info!("Streak for {} in {} set to {}", player_id, family, value);
        Ok(())
    }

    /// Choose who to fetch this tick
    pub fn plan_tick(&mut self, now: DateTime<Utc>) -> PollPlan {
        let ids = self.roster.ids();
        let plan = self.activity.plan(&ids, now);
        if !plan.inactive.is_empty() {
            self.dirty = true;
        }
        plan
    }

    /// Count of players per bucket
    pub fn bucket_counts(&self, now: DateTime<Utc>) -> (usize, usize) {
        self.roster
            .iter()
            .fold((0, 0), |(active, inactive), player| {
                match self.activity.bucket(&player.player_id, now) {
                    ActivityBucket::Active => (active + 1, inactive),
                    ActivityBucket::Inactive => (active, inactive + 1),
                }
            })
    }

    /// Apply one successful fetch
    ///
    /// Every derived map is updated before this returns, so the next fetch
    /// for the same player always diffs against a fully applied state.
    pub fn apply_snapshot(&mut self, player_id: &str, stats: PlayerStats, now: DateTime<Utc>) -> Result<ApplyOutcome> {
        let player_id = normalize_player_name(player_id);
        let player = self
            .roster
            .get_mut(&player_id)
            .ok_or_else(|| TrackerError::PlayerNotTracked {
                player_id: player_id.clone(),
            })?;

        if !stats.display_name.is_empty() && stats.display_name != player.display_name {
            player.display_name = stats.display_name.clone();
            self.dirty = true;
        }

        if player.needs_baseline {
            info!("Re-established stats baseline for {}", player.display_name);
            player.last_snapshot = stats.snapshot;
            player.needs_baseline = false;
            let families: Vec<Family> = player.last_snapshot.keys().cloned().collect();
            self.streaks.init_families(&player_id, families.iter());
            self.dirty = true;
            return Ok(ApplyOutcome {
                baseline_reset: true,
                ..Default::default()
            });
        }

        let events = self.differ.diff(&player_id, &player.last_snapshot, &stats.snapshot, now);
        if player.last_snapshot != stats.snapshot {
            player.last_snapshot = stats.snapshot;
            self.dirty = true;
        }
        let display_name = player.display_name.clone();

        let mut outcome = ApplyOutcome::default();
        if events.is_empty() {
            return Ok(outcome);
        }

        let families: BTreeSet<&Family> = events.iter().map(|e| &e.family).collect();
        for family in families {
            self.forecaster.record_match(&player_id, family, now);
        }
        self.activity.mark_active(&player_id, now);

        for event in &events {
            let streak = self.streaks.apply(event);
            let family_display = family_display_name(&event.family);

            if let Some(alert) = self.milestones.check(&player_id, &event.family, streak) {
                outcome.milestones.push(MilestoneNotification {
                    player_id: alert.player_id,
                    display_name: display_name.clone(),
                    family: alert.family,
                    family_display: family_display.clone(),
                    streak: alert.streak,
                    occurred_at: now,
                });
            }

            let variant_percentages = if self.classifier.applies_to(&event.family) {
                Some(self.classifier.classify(&player_id, &event.stats_delta, now))
            } else {
                None
            };
            let variant_summary = variant_percentages.as_ref().map(format_percentages);

            self.daily.record(
                &player_id,
                &event.family,
                event.stats_delta.kills,
                event.stats_delta.deaths,
                now,
            );
            let daily_kd = self.daily.kd(&player_id, &event.family, now);
            let queue_eta_seconds = self.forecaster.predict(&player_id, &event.family, now);

            outcome.games.push(GameNotification {
                player_id: player_id.clone(),
                display_name: display_name.clone(),
                family: event.family.clone(),
                family_display,
                is_win: event.is_win,
                stats_delta: event.stats_delta,
                streak,
                variant_percentages,
                variant_summary,
                queue_eta_seconds,
                daily_kd,
                occurred_at: event.occurred_at,
            });
        }

        debug!(
            "Applied {} events for {} ({} milestones)",
            outcome.games.len(),
            player_id,
            outcome.milestones.len()
        );
        Ok(outcome)
    }

    /// Zero every daily counter
    pub fn reset_daily_stats(&mut self, now: DateTime<Utc>) {
        self.daily.reset_all(now);
        self.dirty = true;
    }

    /// Last-seen report, most recently active first
    pub fn last_seen_report(&self, now: DateTime<Utc>) -> Vec<PlayerSummary> {
        let mut report: Vec<PlayerSummary> = self
            .roster
            .iter()
            .map(|player| {
                let last_seen = self.activity.last_seen(&player.player_id);
                let (tracking, expires_at) = match &player.kind {
                    TrackingKind::Permanent => ("permanent".to_string(), None),
                    TrackingKind::Temporary {
                        duration,
                        expires_at,
                    } => (format!("temporary ({})", duration.label()), Some(*expires_at)),
                };
                let streaks: BTreeMap<Family, u32> = self
                    .streaks
                    .player_streaks(&player.player_id)
                    .map(|s| s.iter().map(|(f, v)| (f.clone(), *v)).collect())
                    .unwrap_or_default();

                PlayerSummary {
                    player_id: player.player_id.clone(),
                    display_name: player.display_name.clone(),
                    tracking,
                    expires_at,
                    bucket: self.activity.bucket(&player.player_id, now),
                    last_seen,
                    last_seen_ago: last_seen
                        .map(|seen| time_ago(seen, now))
                        .unwrap_or_else(|| "never".to_string()),
                    streaks,
                }
            })
            .collect();

        report.sort_by(|a, b| b.last_seen.cmp(&a.last_seen).then_with(|| a.player_id.cmp(&b.player_id)));
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{StatRecord, StatSnapshot};
    use crate::utils::TrackingDuration;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 15, 0, 0).unwrap()
    }

    fn stats(family: &str, record: StatRecord) -> PlayerStats {
        let mut snapshot = StatSnapshot::new();
        snapshot.insert(family.to_string(), record);
        PlayerStats {
            display_name: "Steve".to_string(),
            snapshot,
        }
    }

    fn record(played: u64, victories: u64, kills: u64, deaths: u64) -> StatRecord {
        StatRecord {
            played,
            victories,
            kills,
            deaths,
            ..Default::default()
        }
    }

    fn engine_with_steve(initial: StatRecord) -> TrackerEngine {
        let mut engine = TrackerEngine::default();
        engine
            .add_player("Steve", stats("sg", initial), TrackingKind::Permanent, t0())
            .unwrap();
        engine
    }

    #[test]
    fn test_add_player_sets_baseline() {
        let mut engine = engine_with_steve(record(10, 4, 40, 6));

        assert!(engine.roster().contains("steve"));
        assert_eq!(engine.streaks().get("steve", "sg"), 0);
        assert_eq!(engine.activity().last_seen("steve"), Some(t0()));
        assert!(engine.take_dirty());
        assert!(!engine.take_dirty());

        let err = engine
            .add_player("STEVE", stats("sg", record(0, 0, 0, 0)), TrackingKind::Permanent, t0())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TrackerError>(),
            Some(TrackerError::PlayerAlreadyTracked { .. })
        ));
    }

    #[test]
    fn test_apply_snapshot_emits_enriched_games() {
        let mut engine = engine_with_steve(record(10, 4, 40, 6));
        let now = t0() + Duration::minutes(5);

        let outcome = engine
            .apply_snapshot("steve", stats("sg", record(12, 5, 48, 7)), now)
            .unwrap();

        assert_eq!(outcome.games.len(), 2);
        assert!(outcome.games[0].is_win);
        assert_eq!(outcome.games[0].streak, 1);
        assert!(!outcome.games[1].is_win);
        assert_eq!(outcome.games[1].streak, 0);
        assert_eq!(outcome.games[0].stats_delta.kills, 4);
        assert!(outcome.games[0].variant_percentages.is_none());

        // 8 kills, 0 deaths after the first game
        assert_eq!(outcome.games[0].daily_kd.unwrap().kills, 4);
        assert_eq!(engine.activity().last_seen("steve"), Some(now));
        assert_eq!(engine.forecaster().window("steve", "sg").unwrap().len(), 1);
        assert_eq!(engine.roster().get("steve").unwrap().last_snapshot["sg"].played, 12);
    }

    #[test]
    fn test_unchanged_snapshot_produces_nothing() {
        let mut engine = engine_with_steve(record(10, 4, 40, 6));
        engine.take_dirty();

        let outcome = engine
            .apply_snapshot("steve", stats("sg", record(10, 4, 40, 6)), t0())
            .unwrap();
        assert!(outcome.is_empty());
        assert!(!engine.take_dirty());
    }

    #[test]
    fn test_bed_games_are_classified() {
        let mut engine = TrackerEngine::default();
        engine
            .add_player("alex", stats("bed", record(5, 2, 10, 3)), TrackingKind::Permanent, t0())
            .unwrap();

        let mut next = record(6, 3, 20, 3);
        next.final_kills = 3;
        next.beds_destroyed = 3;
        let outcome = engine.apply_snapshot("alex", stats("bed", next), t0()).unwrap();

        let game = &outcome.games[0];
        assert_eq!(game.variant_percentages.as_ref().unwrap().total(), 100);
        assert!(game.variant_summary.as_ref().unwrap().contains('%'));
        assert_eq!(engine.classifier().history("alex").unwrap().len(), 1);
    }

    #[test]
    fn test_milestone_alert_on_fiftieth_win() {
        let mut engine = engine_with_steve(record(100, 60, 0, 0));
        engine.set_streak("steve", "sg", 49).unwrap();

        let outcome = engine
            .apply_snapshot("steve", stats("sg", record(101, 61, 0, 0)), t0())
            .unwrap();
        assert_eq!(outcome.milestones.len(), 1);
        assert_eq!(outcome.milestones[0].streak, 50);
        assert_eq!(outcome.milestones[0].display_name, "Steve");
    }

    #[test]
    fn test_queue_eta_after_repeated_games() {
        let mut engine = engine_with_steve(record(10, 4, 0, 0));
        let first = t0();
        let second = first + Duration::seconds(300);

        engine.apply_snapshot("steve", stats("sg", record(11, 5, 0, 0)), first).unwrap();
        let outcome = engine
            .apply_snapshot("steve", stats("sg", record(12, 6, 0, 0)), second)
            .unwrap();

        // One 300s gap, predicted next match 300s from now
        assert_eq!(outcome.games[0].queue_eta_seconds, Some(300));
        assert!(outcome.games[0].wants_countdown());
    }

    #[test]
    fn test_remove_player_drops_all_state() {
        let mut engine = engine_with_steve(record(10, 4, 40, 6));
        engine
            .apply_snapshot("steve", stats("sg", record(11, 5, 44, 6)), t0())
            .unwrap();

        engine.remove_player("Steve").unwrap();
        let state = engine.to_state();
        assert!(state.players.is_empty());
        assert!(state.streaks.is_empty());
        assert!(state.match_times.is_empty());
        assert!(state.last_seen.is_empty());
        assert!(state.daily_stats.is_empty());

        assert!(engine.remove_player("steve").is_err());
        assert!(engine.set_streak("steve", "sg", 3).is_err());
    }

    #[test]
    fn test_expire_temporary_players() {
        let mut engine = TrackerEngine::default();
        engine
            .add_player(
                "alex",
                stats("sg", record(1, 0, 0, 0)),
                TrackingKind::temporary(TrackingDuration::OneDay, t0()),
                t0(),
            )
            .unwrap();

        assert!(engine.expire_temporary(t0() + Duration::hours(23)).is_empty());
        let expired = engine.expire_temporary(t0() + Duration::days(1));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].duration, TrackingDuration::OneDay);
        assert!(engine.roster().is_empty());
    }

    #[test]
    fn test_needs_baseline_skips_first_diff() {
        let mut engine = engine_with_steve(record(10, 4, 40, 6));
        let mut state = engine.to_state();
        state.players[0].last_snapshot = StatSnapshot::new();
        state.players[0].needs_baseline = true;
        let mut engine = TrackerEngine::from_state(EngineSettings::default(), state);

        let outcome = engine
            .apply_snapshot("steve", stats("sg", record(500, 200, 0, 0)), t0())
            .unwrap();
        assert!(outcome.baseline_reset);
        assert!(outcome.is_empty());

        let outcome = engine
            .apply_snapshot("steve", stats("sg", record(501, 201, 0, 0)), t0())
            .unwrap();
        assert_eq!(outcome.games.len(), 1);
    }

    #[test]
    fn test_state_round_trip_through_engine() {
        let mut engine = engine_with_steve(record(10, 4, 40, 6));
        engine
            .apply_snapshot("steve", stats("sg", record(12, 6, 48, 6)), t0())
            .unwrap();

        let state = engine.to_state();
        let restored = TrackerEngine::from_state(EngineSettings::default(), state.clone());
        assert_eq!(restored.to_state(), state);
        assert_eq!(restored.streaks().get("steve", "sg"), 2);
    }

    #[test]
    fn test_last_seen_report_orders_by_recency() {
        let mut engine = engine_with_steve(record(10, 4, 0, 0));
        engine
            .add_player(
                "alex",
                stats("sg", record(1, 0, 0, 0)),
                TrackingKind::Permanent,
                t0() - Duration::hours(3),
            )
            .unwrap();

        let report = engine.last_seen_report(t0() + Duration::minutes(10));
        assert_eq!(report[0].player_id, "steve");
        assert_eq!(report[0].last_seen_ago, "10m ago");
        assert_eq!(report[0].bucket, ActivityBucket::Active);
        assert_eq!(report[1].bucket, ActivityBucket::Inactive);
        assert_eq!(engine.bucket_counts(t0() + Duration::minutes(10)), (1, 1));
    }
}
