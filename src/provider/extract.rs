//! Extraction of per-family counters from the provider's JSON

use crate::error::FetchError;
use crate::provider::PlayerStats;
use crate::types::{StatRecord, StatSnapshot};
use serde_json::Value;

/// An object counts as a game family when it carries `played` or `victories`
fn is_family_data(data: &serde_json::Map<String, Value>) -> bool {
    data.contains_key("played") || data.contains_key("victories")
}

fn counter(data: &serde_json::Map<String, Value>, key: &str) -> u64 {
    match data.get(key) {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
            .unwrap_or(0),
        _ => 0,
    }
}

/// Collect every family object of a provider response into a snapshot
pub fn extract_game_stats(response: &Value) -> StatSnapshot {
    let mut snapshot = StatSnapshot::new();
    let Value::Object(families) = response else {
        return snapshot;
    };

    for (family, data) in families {
        let Value::Object(data) = data else {
            continue;
        };
        if !is_family_data(data) {
            continue;
        }

        snapshot.insert(
            family.clone(),
            StatRecord {
                played: counter(data, "played"),
                victories: counter(data, "victories"),
                deaths: counter(data, "deaths"),
                kills: counter(data, "kills"),
                final_kills: counter(data, "final_kills"),
                beds_destroyed: counter(data, "beds_destroyed"),
                coins: counter(data, "coins"),
                murders: counter(data, "murders"),
                murderer_eliminations: counter(data, "murderer_eliminations"),
                goals: counter(data, "goals"),
            },
        );
    }

    snapshot
}

/// Turn a full response into [`PlayerStats`]
///
/// A response without a `main` profile object is treated as an unknown
/// player.
pub fn extract_player_stats(requested_name: &str, response: &Value) -> Result<PlayerStats, FetchError> {
    let main = response.get("main").filter(|m| m.is_object()).ok_or(FetchError::NotFound)?;

    let display_name = response
        .get("username")
        .and_then(Value::as_str)
        .or_else(|| main.get("username_cc").and_then(Value::as_str))
        .or_else(|| main.get("username").and_then(Value::as_str))
        .unwrap_or(requested_name)
        .to_string();

    Ok(PlayerStats {
        display_name,
        snapshot: extract_game_stats(response),
    })
}
