//! Next-match forecaster
//!
//! Keeps a bounded window of match start times per player and family and
//! estimates the next one from a linearly weighted average of the recent
//! gaps, giving the newest gap the largest weight.

use crate::forecast::window::BoundedWindow;
use crate::types::{Family, PlayerId};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tracing::debug;

/// Recent match times keyed by player, then family
pub type MatchTimeMap = HashMap<PlayerId, HashMap<Family, BoundedWindow<DateTime<Utc>>>>;

/// Tunables for the forecaster
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSettings {
    /// Recent match times kept per player and family
    pub window_capacity: usize,
    /// Only matches newer than this feed a prediction
    pub lookback: Duration,
    /// Smallest ETA worth showing, in seconds
    pub min_eta_seconds: i64,
    /// Largest ETA worth showing, in seconds
    pub max_eta_seconds: i64,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            window_capacity: 10,
            lookback: Duration::minutes(30),
            min_eta_seconds: 30,
            max_eta_seconds: 1200,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueueForecaster {
    settings: ForecastSettings,
    windows: MatchTimeMap,
}

impl QueueForecaster {
    pub fn new(settings: ForecastSettings) -> Self {
        Self {
            settings,
            windows: HashMap::new(),
        }
    }

    pub fn with_windows(settings: ForecastSettings, windows: MatchTimeMap) -> Self {
        Self { settings, windows }
    }

    pub fn settings(&self) -> &ForecastSettings {
        &self.settings
    }

    /// Record a match start, evicting the oldest entry beyond capacity
    pub fn record_match(&mut self, player_id: &str, family: &str, timestamp: DateTime<Utc>) {
        let capacity = self.settings.window_capacity;
        self.windows
            .entry(player_id.to_string())
            .or_default()
            .entry(family.to_string())
            .or_insert_with(|| BoundedWindow::new(capacity))
            .push(timestamp);
    }

    /// Predict seconds until the next match, if a usable estimate exists
    pub fn predict(&self, player_id: &str, family: &str, now: DateTime<Utc>) -> Option<u64> {
        let window = self.windows.get(player_id)?.get(family)?;

        let cutoff = now - self.settings.lookback;
        let recent: Vec<i64> = window
            .iter()
            .filter(|t| **t > cutoff)
            .map(|t| t.timestamp_millis())
            .collect();
        if recent.len() < 2 {
            return None;
        }

        let mut weighted_sum = 0.0;
        let mut total_weight = 0.0;
        for (i, pair) in recent.windows(2).enumerate() {
            let weight = (i + 1) as f64;
            weighted_sum += (pair[1] - pair[0]) as f64 * weight;
            total_weight += weight;
        }
        let average_interval = weighted_sum / total_weight;

        let last = *recent.last()? as f64;
        let predicted_next = last + average_interval;
        let eta = ((predicted_next - now.timestamp_millis() as f64) / 1000.0).floor().max(0.0) as i64;

        if eta >= self.settings.min_eta_seconds && eta <= self.settings.max_eta_seconds {
            Some(eta as u64)
        } else {
            debug!(
                "Discarding forecast of {}s for {} in {} (outside bounds)",
                eta, player_id, family
            );
            None
        }
    }

    pub fn window(&self, player_id: &str, family: &str) -> Option<&BoundedWindow<DateTime<Utc>>> {
        self.windows.get(player_id)?.get(family)
    }

    pub fn remove_player(&mut self, player_id: &str) {
        self.windows.remove(player_id);
    }

    pub fn as_map(&self) -> &MatchTimeMap {
        &self.windows
    }
}
