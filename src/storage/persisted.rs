//! Versioned encode/decode of engine state
//!
//! Every section is a JSON object keyed by player. Each player's field is
//! decoded on its own into a [`Decoded`] value, so one bad entry only costs
//! that player that field. Earlier document versions stored some fields in
//! flatter shapes; those are recognised and migrated to the empty default.

use crate::classifier::VariantSample;
use crate::error::{Result, TrackerError};
use crate::roster::{DailyStats, TrackedPlayer, TrackingKind};
use crate::storage::StateStore;
use crate::types::{Family, PlayerId, StatSnapshot};
use crate::utils::{normalize_player_name, TrackingDuration};
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use tracing::{info, warn};

pub const SCHEMA_VERSION: u64 = 2;

pub const KEY_TRACKED_USERS: &str = "trackedUsers";
pub const KEY_TEMP_USERS: &str = "tempUsers";
pub const KEY_WINSTREAKS: &str = "winstreaks";
pub const KEY_LAST_SEEN: &str = "lastSeen";
pub const KEY_MATCH_TIMES: &str = "matchTimes";
pub const KEY_MILESTONES: &str = "hotPlayerAlerts";
pub const KEY_VARIANT_HISTORY: &str = "variantHistory";
pub const KEY_DAILY_STATS: &str = "dailyStats";
pub const KEY_INACTIVE_CHECK: &str = "inactiveUserLastCheck";
pub const KEY_SCHEMA_VERSION: &str = "schemaVersion";

/// Date format used by earlier documents for daily stats
const LEGACY_DATE_FORMAT: &str = "%d.%m.%Y";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Plain-data view of everything the engine persists
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineState {
    pub players: Vec<TrackedPlayer>,
    pub streaks: HashMap<PlayerId, HashMap<Family, u32>>,
    pub last_seen: HashMap<PlayerId, DateTime<Utc>>,
    pub match_times: HashMap<PlayerId, HashMap<Family, Vec<DateTime<Utc>>>>,
    pub milestones: HashMap<PlayerId, HashMap<Family, u32>>,
    pub variant_history: HashMap<PlayerId, Vec<VariantSample>>,
    pub daily_stats: HashMap<PlayerId, HashMap<Family, DailyStats>>,
    pub inactive_last_check: HashMap<PlayerId, DateTime<Utc>>,
}

/// Result of loading a document, with every field-level recovery made
#[derive(Debug, Default)]
pub struct LoadedState {
    pub state: EngineState,
    pub recovered: Vec<TrackerError>,
}

/// Outcome of decoding one player's field
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<T> {
    Current(T),
    /// A recognised shape from an earlier version, migrated to the default
    Legacy(&'static str),
    Malformed(String),
}

impl<T: Default> Decoded<T> {
    /// Take the decoded value or fall back to the default, recording why
    fn resolve(self, section: &str, player_id: &str, recovered: &mut Vec<TrackerError>) -> T {
        match self {
            Decoded::Current(value) => value,
            Decoded::Legacy(shape) => {
                warn!("Migrating legacy {} for {} ({}) to empty default", section, player_id, shape);
                T::default()
            }
            Decoded::Malformed(reason) => {
                warn!("Malformed {} for {}: {}, resetting", section, player_id, reason);
                recovered.push(TrackerError::MalformedState {
                    key: format!("{}.{}", section, player_id),
                    reason,
                });
                T::default()
            }
        }
    }
}

fn timestamp_to_value(timestamp: DateTime<Utc>) -> Value {
    json!(timestamp.timestamp_millis())
}

/// Accepts epoch milliseconds or an RFC 3339 string
fn value_to_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(DateTime::from_timestamp_millis),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => None,
    }
}

fn value_to_date(value: &Value) -> Option<NaiveDate> {
    let text = value.as_str()?;
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(text, LEGACY_DATE_FORMAT))
        .ok()
}

fn value_to_count(value: &Value) -> Option<u32> {
    value.as_u64().and_then(|n| u32::try_from(n).ok())
}

fn decode_family_counts(value: &Value) -> Decoded<HashMap<Family, u32>> {
    match value {
        Value::Object(map) => {
            let mut counts = HashMap::new();
            for (family, count) in map {
                match value_to_count(count) {
                    Some(n) => {
                        counts.insert(family.clone(), n);
                    }
                    None => return Decoded::Malformed(format!("non-integer count for {}", family)),
                }
            }
            Decoded::Current(counts)
        }
        Value::Number(_) => Decoded::Legacy("single number"),
        other => Decoded::Malformed(format!("unexpected {}", type_name(other))),
    }
}

pub fn decode_streaks(value: &Value) -> Decoded<HashMap<Family, u32>> {
    decode_family_counts(value)
}

pub fn decode_milestones(value: &Value) -> Decoded<HashMap<Family, u32>> {
    decode_family_counts(value)
}

pub fn decode_match_times(value: &Value) -> Decoded<HashMap<Family, Vec<DateTime<Utc>>>> {
    match value {
        Value::Object(map) => {
            let mut times = HashMap::new();
            for (family, entries) in map {
                let Some(entries) = entries.as_array() else {
                    return Decoded::Malformed(format!("match times for {} is not a list", family));
                };
                let parsed: Option<Vec<DateTime<Utc>>> = entries.iter().map(value_to_timestamp).collect();
                match parsed {
                    Some(list) => {
                        times.insert(family.clone(), list);
                    }
                    None => return Decoded::Malformed(format!("bad timestamp for {}", family)),
                }
            }
            Decoded::Current(times)
        }
        Value::Array(_) => Decoded::Legacy("flat timestamp list"),
        other => Decoded::Malformed(format!("unexpected {}", type_name(other))),
    }
}

pub fn decode_variant_history(value: &Value) -> Decoded<Vec<VariantSample>> {
    let Some(entries) = value.as_array() else {
        return Decoded::Malformed(format!("unexpected {}", type_name(value)));
    };

    let mut samples = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some(timestamp) = entry.get("timestamp").and_then(value_to_timestamp) else {
            return Decoded::Malformed("history entry without timestamp".to_string());
        };
        let stat = |name: &str| entry.get(name).and_then(Value::as_u64).unwrap_or(0);
        samples.push(VariantSample {
            kills: stat("kills"),
            final_kills: stat("final_kills"),
            beds_destroyed: stat("beds_destroyed"),
            deaths: stat("deaths"),
            timestamp,
        });
    }
    Decoded::Current(samples)
}

/// Daily stats are per family; individual unreadable families are dropped
pub fn decode_daily_stats(value: &Value) -> Decoded<HashMap<Family, DailyStats>> {
    let Value::Object(map) = value else {
        return Decoded::Malformed(format!("unexpected {}", type_name(value)));
    };

    if map.contains_key("lastResetDate") && map.get("kills").is_some_and(Value::is_number) {
        return Decoded::Legacy("flat kills/deaths record");
    }

    let mut stats = HashMap::new();
    for (family, entry) in map {
        let kills = entry.get("kills").and_then(Value::as_u64);
        let deaths = entry.get("deaths").and_then(Value::as_u64);
        let date = entry.get("lastResetDate").and_then(value_to_date);
        match (kills, deaths, date) {
            (Some(kills), Some(deaths), Some(reset_date)) => {
                stats.insert(
                    family.clone(),
                    DailyStats {
                        kills,
                        deaths,
                        reset_date,
                    },
                );
            }
            _ => warn!("Skipping unreadable daily stats entry for family {}", family),
        }
    }
    Decoded::Current(stats)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn infer_duration(added_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> TrackingDuration {
    let span = expires_at - added_at;
    if span >= TrackingDuration::SevenDays.as_duration() {
        TrackingDuration::SevenDays
    } else if span >= TrackingDuration::ThreeDays.as_duration() {
        TrackingDuration::ThreeDays
    } else {
        TrackingDuration::OneDay
    }
}

/// Decode one roster entry. A missing or unreadable `lastStats` keeps the
/// player but flags the snapshot so the next fetch only sets a baseline.
fn decode_player(
    player_id: &str,
    value: &Value,
    temporary: bool,
    now: DateTime<Utc>,
    recovered: &mut Vec<TrackerError>,
) -> Option<TrackedPlayer> {
    let section = if temporary { KEY_TEMP_USERS } else { KEY_TRACKED_USERS };
    let Value::Object(entry) = value else {
        warn!("Dropping unreadable {} entry for {}", section, player_id);
        recovered.push(TrackerError::MalformedState {
            key: format!("{}.{}", section, player_id),
            reason: format!("unexpected {}", type_name(value)),
        });
        return None;
    };

    let display_name = entry
        .get("username")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| player_id.to_string());
    let added_at = entry.get("addedAt").and_then(value_to_timestamp).unwrap_or(now);

    let (last_snapshot, needs_baseline) = match entry
        .get("lastStats")
        .map(|stats| serde_json::from_value::<StatSnapshot>(stats.clone()))
    {
        Some(Ok(snapshot)) => (snapshot, false),
        Some(Err(e)) => {
            warn!("Unreadable lastStats for {}: {}, waiting for a new baseline", player_id, e);
            recovered.push(TrackerError::MalformedState {
                key: format!("{}.{}.lastStats", section, player_id),
                reason: e.to_string(),
            });
            (StatSnapshot::new(), true)
        }
        None => (StatSnapshot::new(), true),
    };

    let kind = if temporary {
        let declared = entry.get("duration").and_then(Value::as_str).map(TrackingDuration::parse);
        match entry.get("expiresAt").and_then(value_to_timestamp) {
            Some(expires_at) => TrackingKind::Temporary {
                duration: declared.unwrap_or_else(|| infer_duration(added_at, expires_at)),
                expires_at,
            },
            None => TrackingKind::temporary(declared.unwrap_or(TrackingDuration::OneDay), added_at),
        }
    } else {
        TrackingKind::Permanent
    };

    Some(TrackedPlayer {
        player_id: player_id.to_string(),
        display_name,
        kind,
        added_at,
        last_snapshot,
        needs_baseline,
    })
}

fn encode_player(player: &TrackedPlayer) -> Value {
    let mut entry = Map::new();
    entry.insert("username".to_string(), json!(player.display_name));
    entry.insert("lastStats".to_string(), json!(player.last_snapshot));
    entry.insert("addedAt".to_string(), json!(player.added_at.to_rfc3339()));
    match &player.kind {
        TrackingKind::Permanent => {
            entry.insert("type".to_string(), json!("permanent"));
        }
        TrackingKind::Temporary {
            duration,
            expires_at,
        } => {
            entry.insert("type".to_string(), json!("temporary"));
            entry.insert("duration".to_string(), json!(duration.label()));
            entry.insert("expiresAt".to_string(), json!(expires_at.to_rfc3339()));
        }
    }
    Value::Object(entry)
}

fn section(store: &dyn StateStore, key: &str, recovered: &mut Vec<TrackerError>) -> Result<Map<String, Value>> {
    match store.get(key)? {
        None => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map),
        Some(other) => {
            warn!("Section {} is a {}, ignoring it", key, type_name(&other));
            recovered.push(TrackerError::MalformedState {
                key: key.to_string(),
                reason: format!("unexpected {}", type_name(&other)),
            });
            Ok(Map::new())
        }
    }
}

/// Decode every per-player field of one section with the given decoder
fn decode_section<T: Default>(
    store: &dyn StateStore,
    key: &str,
    decode: impl Fn(&Value) -> Decoded<T>,
    recovered: &mut Vec<TrackerError>,
) -> Result<HashMap<PlayerId, T>> {
    let mut decoded = HashMap::new();
    for (player, value) in section(store, key, recovered)? {
        let player_id = normalize_player_name(&player);
        let value = decode(&value).resolve(key, &player_id, recovered);
        decoded.insert(player_id, value);
    }
    Ok(decoded)
}

fn decode_timestamps(
    store: &dyn StateStore,
    key: &str,
    recovered: &mut Vec<TrackerError>,
) -> Result<HashMap<PlayerId, DateTime<Utc>>> {
    let mut timestamps = HashMap::new();
    for (player, value) in section(store, key, recovered)? {
        let player_id = normalize_player_name(&player);
        match value_to_timestamp(&value) {
            Some(timestamp) => {
                timestamps.insert(player_id, timestamp);
            }
            None => {
                warn!("Malformed {} for {}, dropping", key, player_id);
                recovered.push(TrackerError::MalformedState {
                    key: format!("{}.{}", key, player_id),
                    reason: format!("unexpected {}", type_name(&value)),
                });
            }
        }
    }
    Ok(timestamps)
}

/// Restore engine state from a store
///
/// Per-player state for players no longer on the roster is discarded.
pub fn load_state(store: &dyn StateStore, now: DateTime<Utc>) -> Result<LoadedState> {
    let mut recovered = Vec::new();

    if let Some(version) = store.get(KEY_SCHEMA_VERSION)?.and_then(|v| v.as_u64()) {
        if version > SCHEMA_VERSION {
            warn!(
                "State document has schema version {}, newer than supported {}",
                version, SCHEMA_VERSION
            );
        }
    }

    let mut players: HashMap<PlayerId, TrackedPlayer> = HashMap::new();
    for (key, temporary) in [(KEY_TRACKED_USERS, false), (KEY_TEMP_USERS, true)] {
        for (name, value) in section(store, key, &mut recovered)? {
            let player_id = normalize_player_name(&name);
            if players.contains_key(&player_id) {
                warn!("{} is listed as both permanent and temporary, keeping permanent", player_id);
                continue;
            }
            if let Some(player) = decode_player(&player_id, &value, temporary, now, &mut recovered) {
                players.insert(player_id, player);
            }
        }
    }

    let mut streaks = decode_section(store, KEY_WINSTREAKS, decode_streaks, &mut recovered)?;
    let mut milestones = decode_section(store, KEY_MILESTONES, decode_milestones, &mut recovered)?;
    let mut match_times = decode_section(store, KEY_MATCH_TIMES, decode_match_times, &mut recovered)?;
    let mut variant_history = decode_section(store, KEY_VARIANT_HISTORY, decode_variant_history, &mut recovered)?;
    let mut daily_stats = decode_section(store, KEY_DAILY_STATS, decode_daily_stats, &mut recovered)?;
    let mut last_seen = decode_timestamps(store, KEY_LAST_SEEN, &mut recovered)?;
    let mut inactive_last_check = decode_timestamps(store, KEY_INACTIVE_CHECK, &mut recovered)?;

    streaks.retain(|id, _| players.contains_key(id));
    milestones.retain(|id, _| players.contains_key(id));
    match_times.retain(|id, _| players.contains_key(id));
    variant_history.retain(|id, _| players.contains_key(id));
    daily_stats.retain(|id, _| players.contains_key(id));
    last_seen.retain(|id, _| players.contains_key(id));
    inactive_last_check.retain(|id, _| players.contains_key(id));

    let mut players: Vec<TrackedPlayer> = players.into_values().collect();
    players.sort_by(|a, b| a.player_id.cmp(&b.player_id));

    info!(
        "Restored {} tracked players ({} field recoveries)",
        players.len(),
        recovered.len()
    );

    Ok(LoadedState {
        state: EngineState {
            players,
            streaks,
            last_seen,
            match_times,
            milestones,
            variant_history,
            daily_stats,
            inactive_last_check,
        },
        recovered,
    })
}

/// Write every section and flush the store
pub fn save_state(store: &dyn StateStore, state: &EngineState) -> Result<()> {
    let mut tracked = Map::new();
    let mut temporary = Map::new();
    for player in &state.players {
        let target = if player.kind.is_temporary() {
            &mut temporary
        } else {
            &mut tracked
        };
        target.insert(player.player_id.clone(), encode_player(player));
    }

    let counts = |map: &HashMap<PlayerId, HashMap<Family, u32>>| -> Value {
        map.iter()
            .map(|(player, families)| (player.clone(), json!(families)))
            .collect::<Map<String, Value>>()
            .into()
    };

    let match_times: Map<String, Value> = state
        .match_times
        .iter()
        .map(|(player, families)| {
            let families: Map<String, Value> = families
                .iter()
                .map(|(family, times)| {
                    let times: Vec<Value> = times.iter().copied().map(timestamp_to_value).collect();
                    (family.clone(), Value::Array(times))
                })
                .collect();
            (player.clone(), Value::Object(families))
        })
        .collect();

    let variant_history: Map<String, Value> = state
        .variant_history
        .iter()
        .map(|(player, samples)| {
            let samples: Vec<Value> = samples
                .iter()
                .map(|s| {
                    json!({
                        "kills": s.kills,
                        "final_kills": s.final_kills,
                        "beds_destroyed": s.beds_destroyed,
                        "deaths": s.deaths,
                        "timestamp": s.timestamp.timestamp_millis(),
                    })
                })
                .collect();
            (player.clone(), Value::Array(samples))
        })
        .collect();

    let daily_stats: Map<String, Value> = state
        .daily_stats
        .iter()
        .map(|(player, families)| {
            let families: Map<String, Value> = families
                .iter()
                .map(|(family, stats)| {
                    (
                        family.clone(),
                        json!({
                            "kills": stats.kills,
                            "deaths": stats.deaths,
                            "lastResetDate": stats.reset_date.format(DATE_FORMAT).to_string(),
                        }),
                    )
                })
                .collect();
            (player.clone(), Value::Object(families))
        })
        .collect();

    let timestamps = |map: &HashMap<PlayerId, DateTime<Utc>>| -> Value {
        map.iter()
            .map(|(player, ts)| (player.clone(), timestamp_to_value(*ts)))
            .collect::<Map<String, Value>>()
            .into()
    };

    store.set(KEY_SCHEMA_VERSION, json!(SCHEMA_VERSION))?;
    store.set(KEY_TRACKED_USERS, Value::Object(tracked))?;
    store.set(KEY_TEMP_USERS, Value::Object(temporary))?;
    store.set(KEY_WINSTREAKS, counts(&state.streaks))?;
    store.set(KEY_MILESTONES, counts(&state.milestones))?;
    store.set(KEY_MATCH_TIMES, Value::Object(match_times))?;
    store.set(KEY_VARIANT_HISTORY, Value::Object(variant_history))?;
    store.set(KEY_DAILY_STATS, Value::Object(daily_stats))?;
    store.set(KEY_LAST_SEEN, timestamps(&state.last_seen))?;
    store.set(KEY_INACTIVE_CHECK, timestamps(&state.inactive_last_check))?;
    store.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStateStore;
    use crate::types::StatRecord;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    fn sample_state() -> EngineState {
        let now = now();
        let mut snapshot = StatSnapshot::new();
        snapshot.insert(
            "bed".to_string(),
            StatRecord {
                played: 120,
                victories: 60,
                kills: 300,
                ..Default::default()
            },
        );

        let steve = TrackedPlayer::new(
            "steve".to_string(),
            "Steve".to_string(),
            TrackingKind::Permanent,
            snapshot.clone(),
            now,
        );
        let alex = TrackedPlayer::new(
            "alex".to_string(),
            "Alex".to_string(),
            TrackingKind::temporary(TrackingDuration::ThreeDays, now),
            snapshot,
            now,
        );

        let mut state = EngineState {
            players: vec![alex, steve],
            ..Default::default()
        };
        state
            .streaks
            .insert("steve".to_string(), HashMap::from([("bed".to_string(), 4)]));
        state
            .milestones
            .insert("steve".to_string(), HashMap::from([("bed".to_string(), 50)]));
        state.match_times.insert(
            "steve".to_string(),
            HashMap::from([("bed".to_string(), vec![now - Duration::seconds(300), now])]),
        );
        state.variant_history.insert(
            "steve".to_string(),
            vec![VariantSample {
                kills: 5,
                final_kills: 2,
                beds_destroyed: 1,
                deaths: 1,
                timestamp: now,
            }],
        );
        state.daily_stats.insert(
            "steve".to_string(),
            HashMap::from([(
                "bed".to_string(),
                DailyStats {
                    kills: 8,
                    deaths: 2,
                    reset_date: now.date_naive(),
                },
            )]),
        );
        state.last_seen.insert("steve".to_string(), now);
        state.inactive_last_check.insert("alex".to_string(), now);
        state
    }

    #[test]
    fn test_save_then_load_preserves_state() {
        let store = InMemoryStateStore::new();
        let state = sample_state();

        save_state(&store, &state).unwrap();
        let loaded = load_state(&store, now()).unwrap();

        assert!(loaded.recovered.is_empty());
        assert_eq!(loaded.state, state);
        assert_eq!(store.get(KEY_SCHEMA_VERSION).unwrap(), Some(json!(SCHEMA_VERSION)));
    }

    #[test]
    fn test_legacy_shapes_migrate_to_defaults() {
        let store = InMemoryStateStore::new();
        store
            .set(
                KEY_TRACKED_USERS,
                json!({"Steve": {"username": "Steve", "lastStats": {"bed": {"played": 3}}, "addedAt": "2024-03-01T10:00:00Z"}}),
            )
            .unwrap();
        store.set(KEY_WINSTREAKS, json!({"steve": 7})).unwrap();
        store.set(KEY_MATCH_TIMES, json!({"steve": [1700000000000i64]})).unwrap();
        store.set(KEY_MILESTONES, json!({"steve": 50})).unwrap();
        store
            .set(KEY_DAILY_STATS, json!({"steve": {"kills": 3, "deaths": 1, "lastResetDate": "9.3.2024"}}))
            .unwrap();

        let loaded = load_state(&store, now()).unwrap();
        let state = loaded.state;

        assert_eq!(state.players.len(), 1);
        assert_eq!(state.players[0].player_id, "steve");
        assert_eq!(state.players[0].last_snapshot["bed"].played, 3);
        assert!(state.streaks["steve"].is_empty());
        assert!(state.match_times["steve"].is_empty());
        assert!(state.milestones["steve"].is_empty());
        assert!(state.daily_stats["steve"].is_empty());
        // Legacy migrations are not malformed-state recoveries
        assert!(loaded.recovered.is_empty());
    }

    #[test]
    fn test_malformed_field_resets_only_that_field() {
        let store = InMemoryStateStore::new();
        store
            .set(
                KEY_TRACKED_USERS,
                json!({"steve": {"username": "Steve", "lastStats": {}}, "alex": {"username": "Alex", "lastStats": {}}}),
            )
            .unwrap();
        store
            .set(KEY_WINSTREAKS, json!({"steve": "lots", "alex": {"bed": 2}}))
            .unwrap();

        let loaded = load_state(&store, now()).unwrap();

        assert_eq!(loaded.state.streaks["alex"]["bed"], 2);
        assert!(loaded.state.streaks["steve"].is_empty());
        assert_eq!(loaded.recovered.len(), 1);
        assert!(matches!(
            &loaded.recovered[0],
            TrackerError::MalformedState { key, .. } if key == "winstreaks.steve"
        ));
    }

    #[test]
    fn test_unreadable_last_stats_requests_new_baseline() {
        let store = InMemoryStateStore::new();
        store
            .set(KEY_TRACKED_USERS, json!({"steve": {"username": "Steve", "lastStats": 12}}))
            .unwrap();

        let loaded = load_state(&store, now()).unwrap();
        let player = &loaded.state.players[0];
        assert!(player.needs_baseline);
        assert!(player.last_snapshot.is_empty());
        assert_eq!(loaded.recovered.len(), 1);
    }

    #[test]
    fn test_daily_stats_accepts_both_date_formats() {
        let decoded = decode_daily_stats(&json!({
            "bed": {"kills": 4, "deaths": 2, "lastResetDate": "10.3.2024"},
            "sg": {"kills": 1, "deaths": 0, "lastResetDate": "2024-03-10"},
            "murder": {"kills": "x"}
        }));

        let Decoded::Current(stats) = decoded else {
            panic!("expected current shape");
        };
        assert_eq!(stats.len(), 2);
        assert_eq!(stats["bed"].reset_date, NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
        assert_eq!(stats["sg"].reset_date, stats["bed"].reset_date);
    }

    #[test]
    fn test_temp_duration_inferred_from_expiry() {
        let store = InMemoryStateStore::new();
        store
            .set(
                KEY_TEMP_USERS,
                json!({"alex": {
                    "username": "Alex",
                    "lastStats": {},
                    "addedAt": "2024-03-01T00:00:00Z",
                    "expiresAt": "2024-03-08T00:00:00Z"
                }}),
            )
            .unwrap();

        let loaded = load_state(&store, now()).unwrap();
        assert!(matches!(
            loaded.state.players[0].kind,
            TrackingKind::Temporary {
                duration: TrackingDuration::SevenDays,
                ..
            }
        ));
    }

    #[test]
    fn test_orphaned_player_state_is_dropped() {
        let store = InMemoryStateStore::new();
        store.set(KEY_WINSTREAKS, json!({"ghost": {"bed": 3}})).unwrap();
        store.set(KEY_LAST_SEEN, json!({"ghost": 1700000000000i64})).unwrap();

        let loaded = load_state(&store, now()).unwrap();
        assert!(loaded.state.streaks.is_empty());
        assert!(loaded.state.last_seen.is_empty());
    }
}
