//! Poll scheduler
//!
//! One call to [`PollScheduler::tick`] plans the roster scan, fetches every
//! selected player through the shared limiter and applies the results one at
//! a time under the engine lock. Fetches run in parallel; write-back does not.

use crate::engine::{ApplyOutcome, TrackerEngine};
use crate::error::{FetchError, Result, TrackerError};
use crate::forecast::QueueCountdown;
use crate::metrics::MetricsCollector;
use crate::notify::{run_countdown, CountdownOutcome, CountdownUpdate, GameNotification, NotificationSink};
use crate::provider::{PlayerStats, StatsProvider};
use crate::roster::{TrackedPlayer, TrackingKind};
use crate::scheduler::activity::{ActivityBucket, PollPlan};
use crate::scheduler::limiter::FetchLimiter;
use crate::storage::{save_state, StateStore};
use crate::types::PlayerId;
use crate::utils::normalize_player_name;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Time between ticks
    pub base_interval: Duration,
    /// Upper bound on the gap between two active fetches within a tick
    pub max_active_pacing: Duration,
    /// Gap between two inactive fetches within a tick
    pub inactive_pacing: Duration,
    /// Start a countdown presenter for predicted wins
    pub countdowns: bool,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_millis(5000),
            max_active_pacing: Duration::from_millis(1000),
            inactive_pacing: Duration::from_millis(500),
            countdowns: true,
        }
    }
}

impl SchedulerSettings {
    /// Spacing between active fetches for a bucket of the given size
    pub fn active_pacing(&self, active_count: usize) -> Duration {
        if active_count == 0 {
            return Duration::ZERO;
        }
        (self.base_interval / active_count as u32).min(self.max_active_pacing)
    }
}

/// Summary of one tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub planned_active: usize,
    pub planned_inactive: usize,
    pub deferred: usize,
    pub fetched: usize,
    pub not_found: usize,
    pub failed: usize,
    pub events: usize,
    pub milestones: usize,
    pub saved: bool,
}

struct FetchJob {
    player_id: PlayerId,
    bucket: ActivityBucket,
    offset: Duration,
}

struct FetchResult {
    job: FetchJob,
    result: std::result::Result<PlayerStats, FetchError>,
    elapsed: Duration,
    waited: Duration,
}

impl FetchResult {
    fn outcome_label(&self) -> &'static str {
        match &self.result {
            Ok(_) => "ok",
            Err(FetchError::NotFound) => "not_found",
            Err(FetchError::Transient { .. }) => "transient",
        }
    }
}

/// Drives the engine from the stats provider
pub struct PollScheduler {
    engine: Arc<RwLock<TrackerEngine>>,
    provider: Arc<dyn StatsProvider>,
    limiter: Arc<dyn FetchLimiter>,
    sink: Arc<dyn NotificationSink>,
    store: Arc<dyn StateStore>,
    metrics: Option<Arc<MetricsCollector>>,
    settings: SchedulerSettings,
    countdowns: Mutex<JoinSet<CountdownOutcome>>,
}

impl PollScheduler {
    pub fn new(
        engine: TrackerEngine,
        provider: Arc<dyn StatsProvider>,
        limiter: Arc<dyn FetchLimiter>,
        sink: Arc<dyn NotificationSink>,
        store: Arc<dyn StateStore>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            engine: Arc::new(RwLock::new(engine)),
            provider,
            limiter,
            sink,
            store,
            metrics: None,
            settings,
            countdowns: Mutex::new(JoinSet::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn engine(&self) -> Arc<RwLock<TrackerEngine>> {
        self.engine.clone()
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Run one roster scan
    ///
    /// A failing player never aborts the tick; it is logged and picked up
    /// again on its next scheduled turn.
    pub async fn tick(&self, now: DateTime<Utc>) -> TickReport {
        let started = Instant::now();
        let plan = self.engine.write().await.plan_tick(now);

        let mut report = TickReport {
            planned_active: plan.active.len(),
            planned_inactive: plan.inactive.len(),
            deferred: plan.deferred,
            ..Default::default()
        };

        if !plan.is_empty() {
            debug!(
                "Tick: {} active, {} inactive, {} deferred",
                plan.active.len(),
                plan.inactive.len(),
                plan.deferred
            );
        }

        let mut fetches = JoinSet::new();
        for job in self.stagger(plan) {
            let provider = self.provider.clone();
            let limiter = self.limiter.clone();
            fetches.spawn(async move {
                if !job.offset.is_zero() {
                    tokio::time::sleep(job.offset).await;
                }
                let fetch_started = Instant::now();
                let (result, waited) = match limiter.acquire().await {
                    Ok(permit) => (provider.fetch(&job.player_id).await, permit.waited),
                    Err(e) => (Err(FetchError::transient(e.to_string())), Duration::ZERO),
                };
                FetchResult {
                    job,
                    result,
                    elapsed: fetch_started.elapsed(),
                    waited,
                }
            });
        }

        while let Some(joined) = fetches.join_next().await {
            let fetch = match joined {
                Ok(fetch) => fetch,
                Err(e) => {
                    warn!("Fetch task failed: {}", e);
                    report.failed += 1;
                    continue;
                }
            };

            if let Some(metrics) = &self.metrics {
                metrics.record_fetch(
                    fetch.job.bucket.as_str(),
                    fetch.outcome_label(),
                    fetch.elapsed,
                    fetch.waited,
                );
            }

            let applied_at = now
                + chrono::Duration::from_std(started.elapsed()).unwrap_or_else(|_| chrono::Duration::zero());
            let FetchResult { job, result, .. } = fetch;
            match result {
                Ok(stats) => {
                    report.fetched += 1;
                    let applied = self.engine.write().await.apply_snapshot(&job.player_id, stats, applied_at);
                    match applied {
                        Ok(outcome) => {
                            report.events += outcome.games.len();
                            report.milestones += outcome.milestones.len();
                            self.publish(outcome).await;
                        }
                        // Removed while the fetch was in flight
                        Err(e) => debug!("Dropped result for {}: {}", job.player_id, e),
                    }
                }
                Err(FetchError::NotFound) => {
                    report.not_found += 1;
                    debug!("{} not found by the stats provider", job.player_id);
                }
                Err(e) => {
                    report.failed += 1;
                    warn!("Skipping {} ({} bucket) this tick: {}", job.player_id, job.bucket, e);
                }
            }
        }

        report.saved = self.save_if_dirty().await;

        if let Some(metrics) = &self.metrics {
            let engine = self.engine.read().await;
            let (active, inactive) = engine.bucket_counts(now);
            metrics.update_players(active, inactive);
            metrics.record_tick();
        }

        self.reap_countdowns().await;
        report
    }

    /// Start tracking a player
    ///
    /// The initial fetch goes through the same limiter as polling and its
    /// snapshot becomes the baseline.
    pub async fn add_player(&self, name: &str, kind: TrackingKind, now: DateTime<Utc>) -> Result<TrackedPlayer> {
        let player_id = normalize_player_name(name);
        {
            let engine = self.engine.read().await;
            if engine.roster().contains(&player_id) {
                return Err(TrackerError::PlayerAlreadyTracked { player_id }.into());
            }
            let limit = engine.roster().max_players();
            if engine.roster().len() >= limit {
                return Err(TrackerError::RosterFull { limit }.into());
            }
        }

        let _permit = self.limiter.acquire().await?;
        let stats = self
            .provider
            .fetch(&player_id)
            .await
            .map_err(|e| e.into_tracker_error(&player_id))?;

        let player = self.engine.write().await.add_player(name, stats, kind, now)?;
        self.save_if_dirty().await;
        Ok(player)
    }

    pub async fn remove_player(&self, name: &str) -> Result<TrackedPlayer> {
        let player = self.engine.write().await.remove_player(name)?;
        self.save_if_dirty().await;
        Ok(player)
    }

    pub async fn set_streak(&self, name: &str, family: &str, value: u32) -> Result<()> {
        self.engine.write().await.set_streak(name, family, value)?;
        self.save_if_dirty().await;
        Ok(())
    }

    /// Remove expired temporary players and announce each one
    pub async fn expire_temporary(&self, now: DateTime<Utc>) -> usize {
        let expired = self.engine.write().await.expire_temporary(now);
        let count = expired.len();

        for record in expired {
            if let Err(e) = self.sink.publish_expired(record).await {
                warn!("Failed to publish tracking expiry: {}", e);
            }
        }
        if count > 0 {
            if let Some(metrics) = &self.metrics {
                metrics.record_tracking_expired(count);
            }
            self.save_if_dirty().await;
        }
        count
    }

    pub async fn reset_daily_stats(&self, now: DateTime<Utc>) {
        self.engine.write().await.reset_daily_stats(now);
        info!("Daily stats reset");
        self.save_if_dirty().await;
    }

    /// Persist the full engine state unconditionally
    pub async fn save(&self) -> Result<()> {
        let state = {
            let mut engine = self.engine.write().await;
            engine.take_dirty();
            engine.to_state()
        };
        let result = save_state(self.store.as_ref(), &state);
        if let Some(metrics) = &self.metrics {
            metrics.record_state_save(result.is_ok());
        }
        if result.is_err() {
            self.engine.write().await.mark_dirty();
        }
        result
    }

    /// Stop every running countdown
    pub async fn abort_countdowns(&self) {
        self.countdowns.lock().await.abort_all();
    }

    async fn save_if_dirty(&self) -> bool {
        let state = {
            let mut engine = self.engine.write().await;
            if !engine.take_dirty() {
                return false;
            }
            engine.to_state()
        };

        let result = save_state(self.store.as_ref(), &state);
        if let Some(metrics) = &self.metrics {
            metrics.record_state_save(result.is_ok());
        }
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to save tracker state: {}", e);
                self.engine.write().await.mark_dirty();
                false
            }
        }
    }

    fn stagger(&self, plan: PollPlan) -> Vec<FetchJob> {
        let active_pacing = self.settings.active_pacing(plan.active.len());
        let inactive_pacing = self.settings.inactive_pacing;

        let active = plan.active.into_iter().enumerate().map(|(i, player_id)| FetchJob {
            player_id,
            bucket: ActivityBucket::Active,
            offset: active_pacing * i as u32,
        });
        let inactive = plan.inactive.into_iter().enumerate().map(|(i, player_id)| FetchJob {
            player_id,
            bucket: ActivityBucket::Inactive,
            offset: inactive_pacing * i as u32,
        });
        active.chain(inactive).collect()
    }

    async fn publish(&self, outcome: ApplyOutcome) {
        for game in outcome.games {
            if let Some(metrics) = &self.metrics {
                metrics.record_match_event(&game.family, game.is_win, game.queue_eta_seconds.is_some());
            }
            if self.settings.countdowns && game.wants_countdown() {
                self.start_countdown(&game).await;
            }
            if let Err(e) = self.sink.publish_game(game).await {
                warn!("Failed to publish game result: {}", e);
            }
        }

        for milestone in outcome.milestones {
            if let Some(metrics) = &self.metrics {
                metrics.record_milestone(&milestone.family);
            }
            if let Err(e) = self.sink.publish_milestone(milestone).await {
                warn!("Failed to publish milestone: {}", e);
            }
        }
    }

    async fn start_countdown(&self, game: &GameNotification) {
        let Some(eta) = game.queue_eta_seconds else {
            return;
        };
        let sink = self.sink.clone();
        let game = game.clone();
        self.countdowns.lock().await.spawn(async move {
            run_countdown(QueueCountdown::new(eta), move |tick| {
                let sink = sink.clone();
                let update = CountdownUpdate::from_tick(&game, tick);
                async move { sink.publish_countdown(update).await }
            })
            .await
        });
    }

    async fn reap_countdowns(&self) {
        let mut countdowns = self.countdowns.lock().await;
        while let Some(finished) = countdowns.try_join_next() {
            if let Ok(outcome) = finished {
                debug!("Countdown finished: {:?}", outcome);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineSettings;
    use crate::notify::{MilestoneNotification, TrackingExpired};
    use crate::provider::MockStatsProvider;
    use crate::scheduler::limiter::UnlimitedLimiter;
    use crate::storage::InMemoryStateStore;
    use crate::types::{StatRecord, StatSnapshot};
    use crate::utils::TrackingDuration;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Default)]
    struct RecordingSink {
        games: std::sync::Mutex<Vec<GameNotification>>,
        milestones: std::sync::Mutex<Vec<MilestoneNotification>>,
        expired: std::sync::Mutex<Vec<TrackingExpired>>,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn publish_game(&self, record: GameNotification) -> Result<()> {
            self.games.lock().unwrap().push(record);
            Ok(())
        }

        async fn publish_milestone(&self, record: MilestoneNotification) -> Result<()> {
            self.milestones.lock().unwrap().push(record);
            Ok(())
        }

        async fn publish_expired(&self, record: TrackingExpired) -> Result<()> {
            self.expired.lock().unwrap().push(record);
            Ok(())
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 15, 0, 0).unwrap()
    }

    fn stats(played: u64, victories: u64) -> PlayerStats {
        let mut snapshot = StatSnapshot::new();
        snapshot.insert(
            "sg".to_string(),
            StatRecord {
                played,
                victories,
                ..Default::default()
            },
        );
        PlayerStats {
            display_name: "Steve".to_string(),
            snapshot,
        }
    }

    fn scheduler(provider: MockStatsProvider, sink: Arc<RecordingSink>) -> (PollScheduler, Arc<InMemoryStateStore>) {
        let store = Arc::new(InMemoryStateStore::new());
        let scheduler = PollScheduler::new(
            TrackerEngine::new(EngineSettings::default()),
            Arc::new(provider),
            Arc::new(UnlimitedLimiter),
            sink,
            store.clone(),
            SchedulerSettings {
                countdowns: false,
                ..Default::default()
            },
        );
        (scheduler, store)
    }

    #[test]
    fn test_active_pacing() {
        let settings = SchedulerSettings::default();
        assert_eq!(settings.active_pacing(0), Duration::ZERO);
        assert_eq!(settings.active_pacing(2), Duration::from_millis(1000));
        assert_eq!(settings.active_pacing(10), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_applies_new_games() {
        let calls = Arc::new(AtomicU64::new(0));
        let counter = calls.clone();
        let mut provider = MockStatsProvider::new();
        provider.expect_fetch().returning(move |_| {
            // Baseline on add, one more win on every later fetch
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Ok(stats(10 + n, 4 + n))
        });

        let sink = Arc::new(RecordingSink::default());
        let (scheduler, store) = scheduler(provider, sink.clone());

        scheduler.add_player("Steve", TrackingKind::Permanent, t0()).await.unwrap();
        assert!(store.get("trackedUsers").unwrap().is_some());

        let report = scheduler.tick(t0() + chrono::Duration::seconds(5)).await;
        assert_eq!(report.planned_active, 1);
        assert_eq!(report.fetched, 1);
        assert_eq!(report.events, 1);
        assert!(report.saved);

        let games = sink.games.lock().unwrap();
        assert_eq!(games.len(), 1);
        assert!(games[0].is_win);
        assert_eq!(games[0].streak, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_keeps_snapshot() {
        let calls = Arc::new(AtomicU64::new(0));
        let counter = calls.clone();
        let mut provider = MockStatsProvider::new();
        provider.expect_fetch().returning(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(stats(10, 4))
            } else {
                Err(FetchError::transient("503 Service Unavailable"))
            }
        });

        let sink = Arc::new(RecordingSink::default());
        let (scheduler, _store) = scheduler(provider, sink.clone());
        scheduler.add_player("steve", TrackingKind::Permanent, t0()).await.unwrap();

        let report = scheduler.tick(t0()).await;
        assert_eq!(report.failed, 1);
        assert_eq!(report.events, 0);
        assert!(!report.saved);

        let engine = scheduler.engine();
        let engine = engine.read().await;
        assert_eq!(engine.roster().get("steve").unwrap().last_snapshot["sg"].played, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_unknown_player_fails() {
        let mut provider = MockStatsProvider::new();
        provider.expect_fetch().returning(|_| Err(FetchError::NotFound));

        let (scheduler, _store) = scheduler(provider, Arc::new(RecordingSink::default()));
        let err = scheduler
            .add_player("nobody", TrackingKind::Permanent, t0())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TrackerError>(),
            Some(TrackerError::PlayerNotFound { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_add_skips_fetch() {
        let mut provider = MockStatsProvider::new();
        provider.expect_fetch().times(1).returning(|_| Ok(stats(1, 0)));

        let (scheduler, _store) = scheduler(provider, Arc::new(RecordingSink::default()));
        scheduler.add_player("Steve", TrackingKind::Permanent, t0()).await.unwrap();
        assert!(scheduler.add_player("steve", TrackingKind::Permanent, t0()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_temporary_publishes_records() {
        let mut provider = MockStatsProvider::new();
        provider.expect_fetch().returning(|_| Ok(stats(1, 0)));

        let sink = Arc::new(RecordingSink::default());
        let (scheduler, _store) = scheduler(provider, sink.clone());
        scheduler
            .add_player("alex", TrackingKind::temporary(TrackingDuration::OneDay, t0()), t0())
            .await
            .unwrap();

        assert_eq!(scheduler.expire_temporary(t0() + chrono::Duration::days(2)).await, 1);
        assert_eq!(sink.expired.lock().unwrap().len(), 1);
        assert!(scheduler.engine().read().await.roster().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_inactive_player_checked_once_per_interval() {
        let calls = Arc::new(AtomicU64::new(0));
        let counter = calls.clone();
        let mut provider = MockStatsProvider::new();
        provider.expect_fetch().returning(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(stats(1, 0))
        });

        let (scheduler, _store) = scheduler(provider, Arc::new(RecordingSink::default()));
        scheduler.add_player("alex", TrackingKind::Permanent, t0()).await.unwrap();

        let later = t0() + chrono::Duration::hours(1);
        assert_eq!(scheduler.tick(later).await.planned_inactive, 1);
        let report = scheduler.tick(later + chrono::Duration::seconds(5)).await;
        assert_eq!(report.planned_inactive, 0);
        assert_eq!(report.deferred, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
