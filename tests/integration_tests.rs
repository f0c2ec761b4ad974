//! Integration tests for the Hive tracker
//!
//! These drive the poll scheduler end to end with a scripted stats provider,
//! exercising diffing, streaks, forecasts, milestones and persistence together.

mod fixtures;

use chrono::{DateTime, Duration, TimeZone, Utc};
use fixtures::{player_stats, record, CapturingNotificationSink, ScriptedStatsProvider};
use hive_tracker::engine::{EngineSettings, TrackerEngine};
use hive_tracker::error::FetchError;
use hive_tracker::roster::TrackingKind;
use hive_tracker::scheduler::{PollScheduler, SchedulerSettings, UnlimitedLimiter};
use hive_tracker::storage::{load_state, InMemoryStateStore, JsonFileStore, StateStore};
use hive_tracker::streak::MILESTONE_STEP;
use hive_tracker::utils::TrackingDuration;
use std::sync::Arc;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 17, 0, 0).unwrap()
}

fn create_test_system(
    provider: ScriptedStatsProvider,
    store: Arc<dyn StateStore>,
    countdowns: bool,
) -> (PollScheduler, Arc<CapturingNotificationSink>) {
    let sink = Arc::new(CapturingNotificationSink::new());
    let scheduler = PollScheduler::new(
        TrackerEngine::new(EngineSettings::default()),
        Arc::new(provider),
        Arc::new(UnlimitedLimiter),
        sink.clone(),
        store,
        SchedulerSettings {
            countdowns,
            ..Default::default()
        },
    );
    (scheduler, sink)
}

#[tokio::test(start_paused = true)]
async fn test_wins_and_losses_flow_through_scheduler() {
    let provider = ScriptedStatsProvider::new();
    provider.push("steve", player_stats("Steve", "sg", record(10, 4, 20, 6)));
    provider.push("steve", player_stats("Steve", "sg", record(11, 5, 23, 6)));
    // Two games in one interval, one of them won
    provider.push("steve", player_stats("Steve", "sg", record(13, 6, 27, 8)));

    let store = Arc::new(InMemoryStateStore::new());
    let (scheduler, sink) = create_test_system(provider.clone(), store.clone(), false);

    scheduler
        .add_player("Steve", TrackingKind::Permanent, t0())
        .await
        .expect("add should succeed");

    let first = scheduler.tick(t0() + Duration::seconds(60)).await;
    assert_eq!(first.fetched, 1);
    assert_eq!(first.events, 1);

    let second = scheduler.tick(t0() + Duration::seconds(120)).await;
    assert_eq!(second.events, 2);

    let games = sink.games();
    assert_eq!(games.len(), 3);
    assert!(games[0].is_win);
    assert_eq!(games[0].stats_delta.kills, 3);
    assert_eq!(games[0].streak, 1);

    // Wins are emitted before losses inside one interval
    assert!(games[1].is_win);
    assert_eq!(games[1].streak, 2);
    assert!(!games[2].is_win);
    assert_eq!(games[2].streak, 0);
    assert_eq!(games[2].stats_delta.kills, 2);
    assert_eq!(games[2].stats_delta.deaths, 1);

    assert!(games.iter().all(|g| g.display_name == "Steve"));
    assert!(games.iter().all(|g| g.variant_percentages.is_none()));

    let engine = scheduler.engine();
    let engine = engine.read().await;
    assert_eq!(engine.streaks().get("steve", "sg"), 0);
    assert_eq!(engine.roster().get("steve").unwrap().last_snapshot["sg"].played, 13);

    let report = engine.last_seen_report(t0() + Duration::seconds(180));
    assert_eq!(report.len(), 1);
    assert!(report[0].last_seen.is_some_and(|seen| seen >= t0() + Duration::seconds(120)));
}

#[tokio::test(start_paused = true)]
async fn test_bedwars_games_carry_variant_estimates() {
    let provider = ScriptedStatsProvider::new();
    provider.push("alex", player_stats("Alex", "bed", record(40, 20, 100, 30)));
    let mut after = record(41, 21, 104, 30);
    after.final_kills = 3;
    after.beds_destroyed = 1;
    provider.push("alex", player_stats("Alex", "bed", after));

    let (scheduler, sink) = create_test_system(provider, Arc::new(InMemoryStateStore::new()), false);
    scheduler.add_player("alex", TrackingKind::Permanent, t0()).await.unwrap();
    scheduler.tick(t0() + Duration::seconds(30)).await;

    let games = sink.games();
    assert_eq!(games.len(), 1);
    let distribution = games[0].variant_percentages.as_ref().expect("bed games are classified");
    assert_eq!(distribution.total(), 100);
    assert!(games[0].variant_summary.is_some());

    let engine = scheduler.engine();
    assert_eq!(engine.read().await.classifier().history("alex").map(|h| h.len()), Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_milestone_fires_once_at_fifty() {
    let provider = ScriptedStatsProvider::new();
    provider.push("steve", player_stats("Steve", "sg", record(100, 60, 0, 0)));
    provider.push("steve", player_stats("Steve", "sg", record(101, 61, 0, 0)));
    provider.push("steve", player_stats("Steve", "sg", record(102, 62, 0, 0)));

    let (scheduler, sink) = create_test_system(provider, Arc::new(InMemoryStateStore::new()), false);
    scheduler.add_player("steve", TrackingKind::Permanent, t0()).await.unwrap();
    scheduler.set_streak("steve", "sg", MILESTONE_STEP - 1).await.unwrap();

    let report = scheduler.tick(t0() + Duration::seconds(60)).await;
    assert_eq!(report.milestones, 1);
    scheduler.tick(t0() + Duration::seconds(120)).await;

    let milestones = sink.milestones();
    assert_eq!(milestones.len(), 1);
    assert_eq!(milestones[0].streak, MILESTONE_STEP);
    assert_eq!(milestones[0].family_display, "Survival Games");
    assert_eq!(sink.games().last().map(|g| g.streak), Some(MILESTONE_STEP + 1));
}

#[tokio::test(start_paused = true)]
async fn test_missing_and_failing_players_do_not_abort_tick() {
    let provider = ScriptedStatsProvider::new();
    provider.push("steve", player_stats("Steve", "sg", record(1, 0, 0, 0)));
    provider.push("steve", player_stats("Steve", "sg", record(2, 1, 0, 0)));
    provider.push("alex", player_stats("Alex", "sg", record(5, 0, 0, 0)));
    provider.push_result("alex", Err(FetchError::NotFound));
    provider.push("notch", player_stats("Notch", "sg", record(7, 0, 0, 0)));
    provider.push_result("notch", Err(FetchError::transient("429 Too Many Requests")));

    let (scheduler, sink) = create_test_system(provider.clone(), Arc::new(InMemoryStateStore::new()), false);
    for name in ["steve", "alex", "notch"] {
        scheduler.add_player(name, TrackingKind::Permanent, t0()).await.unwrap();
    }

    let report = scheduler.tick(t0() + Duration::seconds(10)).await;
    assert_eq!(report.planned_active, 3);
    assert_eq!(report.fetched, 1);
    assert_eq!(report.not_found, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(sink.games().len(), 1);

    // Missing players stay on the roster and are retried next tick
    let engine = scheduler.engine();
    assert_eq!(engine.read().await.roster().len(), 3);
    assert_eq!(provider.call_count("alex"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_adds_of_same_player() {
    let provider = ScriptedStatsProvider::new();
    for _ in 0..4 {
        provider.push("steve", player_stats("Steve", "sg", record(10, 4, 0, 0)));
    }

    let (scheduler, _sink) = create_test_system(provider, Arc::new(InMemoryStateStore::new()), false);
    let scheduler = Arc::new(scheduler);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.add_player("Steve", TrackingKind::Permanent, t0()).await })
        })
        .collect();

    let results = futures::future::join_all(handles).await;
    let added = results
        .into_iter()
        .filter(|joined| matches!(joined, Ok(Ok(_))))
        .count();

    assert_eq!(added, 1);
    assert_eq!(scheduler.engine().read().await.roster().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_player_cannot_be_added() {
    let provider = ScriptedStatsProvider::new();
    let (scheduler, _sink) = create_test_system(provider, Arc::new(InMemoryStateStore::new()), false);

    assert!(scheduler
        .add_player("ghost", TrackingKind::Permanent, t0())
        .await
        .is_err());
    assert!(scheduler.engine().read().await.roster().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_forecast_starts_countdown_for_wins() {
    let provider = ScriptedStatsProvider::new();
    provider.push("steve", player_stats("Steve", "sg", record(10, 0, 0, 0)));
    provider.push("steve", player_stats("Steve", "sg", record(11, 1, 0, 0)));
    provider.push("steve", player_stats("Steve", "sg", record(12, 2, 0, 0)));

    let (scheduler, sink) = create_test_system(provider, Arc::new(InMemoryStateStore::new()), true);
    scheduler.add_player("steve", TrackingKind::Permanent, t0()).await.unwrap();

    scheduler.tick(t0() + Duration::seconds(60)).await;
    scheduler.tick(t0() + Duration::seconds(120)).await;

    let games = sink.games();
    assert_eq!(games[0].queue_eta_seconds, None);
    let eta = games[1].queue_eta_seconds.expect("two recent matches give a forecast");
    assert!((30..=60).contains(&eta));

    // Let the countdown run out
    tokio::time::sleep(std::time::Duration::from_secs(eta + 60)).await;

    let countdowns = sink.countdowns();
    assert!(!countdowns.is_empty());
    assert_eq!(countdowns.last().map(|c| c.remaining_seconds), Some(None));
    assert!(countdowns.iter().all(|c| c.player_id == "steve"));
}

#[tokio::test(start_paused = true)]
async fn test_temporary_player_expires_and_is_announced() {
    let provider = ScriptedStatsProvider::new();
    provider.push("alex", player_stats("Alex", "sg", record(3, 1, 0, 0)));

    let store = Arc::new(InMemoryStateStore::new());
    let (scheduler, sink) = create_test_system(provider, store.clone(), false);
    scheduler
        .add_player("Alex", TrackingKind::temporary(TrackingDuration::ThreeDays, t0()), t0())
        .await
        .unwrap();

    assert_eq!(scheduler.expire_temporary(t0() + Duration::days(1)).await, 0);
    assert_eq!(scheduler.expire_temporary(t0() + Duration::days(3)).await, 1);

    let expired = sink.expired();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].display_name, "Alex");
    assert_eq!(expired[0].duration, TrackingDuration::ThreeDays);

    let loaded = load_state(store.as_ref(), t0() + Duration::days(3)).unwrap();
    assert!(loaded.state.players.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_state_survives_restart_through_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bot_data.json");

    let provider = ScriptedStatsProvider::new();
    provider.push("steve", player_stats("Steve", "sg", record(10, 4, 0, 0)));
    provider.push("steve", player_stats("Steve", "sg", record(12, 6, 0, 0)));
    provider.push("alex", player_stats("Alex", "sg", record(1, 0, 0, 0)));

    {
        let store = Arc::new(JsonFileStore::open(&path).unwrap());
        let (scheduler, _sink) = create_test_system(provider, store, false);
        scheduler.add_player("Steve", TrackingKind::Permanent, t0()).await.unwrap();
        scheduler
            .add_player("alex", TrackingKind::temporary(TrackingDuration::SevenDays, t0()), t0())
            .await
            .unwrap();
        let report = scheduler.tick(t0() + Duration::seconds(30)).await;
        assert!(report.saved);
    }

    let reopened = JsonFileStore::open(&path).unwrap();
    let loaded = load_state(&reopened, t0() + Duration::minutes(1)).unwrap();
    assert!(loaded.recovered.is_empty());

    let engine = TrackerEngine::from_state(EngineSettings::default(), loaded.state);
    let steve = engine.roster().get("steve").expect("steve restored");
    assert_eq!(steve.display_name, "Steve");
    assert_eq!(steve.last_snapshot["sg"].played, 12);
    assert!(!steve.needs_baseline);
    assert_eq!(engine.streaks().get("steve", "sg"), 2);

    let alex = engine.roster().get("alex").expect("alex restored");
    assert!(matches!(
        alex.kind,
        TrackingKind::Temporary {
            duration: TrackingDuration::SevenDays,
            ..
        }
    ));
    assert_eq!(engine.roster().temporary_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_legacy_document_is_migrated() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bot_data.json");
    let legacy = serde_json::json!({
        "trackedUsers": {
            "Steve": {
                "username": "Steve",
                "lastStats": { "sg": { "played": 10, "victories": 4 } }
            },
            "notch": { "username": "Notch" }
        },
        "tempUsers": {
            "steve": { "username": "Steve", "expiresAt": 1717261200000u64 }
        },
        "winstreaks": { "steve": 7 },
        "matchTimes": { "steve": [1717250000000u64, 1717250600000u64] },
        "dailyStats": { "steve": { "kills": 3, "deaths": 1, "lastResetDate": "01.06.2024" } }
    });
    std::fs::write(&path, serde_json::to_string(&legacy).unwrap()).unwrap();

    let store = JsonFileStore::open(&path).unwrap();
    let loaded = load_state(&store, t0()).unwrap();
    assert!(loaded.recovered.is_empty());
    assert_eq!(loaded.state.players.len(), 2);

    let engine = TrackerEngine::from_state(EngineSettings::default(), loaded.state);
    let steve = engine.roster().get("steve").unwrap();
    assert_eq!(steve.kind, TrackingKind::Permanent);
    assert_eq!(engine.streaks().get("steve", "sg"), 0);
    assert!(engine.roster().get("notch").unwrap().needs_baseline);

    // The next fetch for a player without a baseline produces no events
    let provider = ScriptedStatsProvider::new();
    provider.push("steve", player_stats("Steve", "sg", record(10, 4, 0, 0)));
    provider.push("notch", player_stats("Notch", "sg", record(500, 200, 0, 0)));
    let sink = Arc::new(CapturingNotificationSink::new());
    let scheduler = PollScheduler::new(
        engine,
        Arc::new(provider),
        Arc::new(UnlimitedLimiter),
        sink.clone(),
        Arc::new(store),
        SchedulerSettings {
            countdowns: false,
            ..Default::default()
        },
    );
    let report = scheduler.tick(t0()).await;
    assert_eq!(report.fetched, 2);
    assert_eq!(report.events, 0);
    assert!(sink.games().is_empty());
    assert!(!scheduler.engine().read().await.roster().get("notch").unwrap().needs_baseline);
}
