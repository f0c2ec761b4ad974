//! Rolling per-player history and the history adjustment pass

use crate::classifier::scoring::{normalize, VariantDistribution};
use crate::classifier::table::{HistoryAction, ScoredStat, Variant, VariantTable};
use crate::forecast::BoundedWindow;
use crate::types::StatRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Per-game stats remembered for the classifier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VariantSample {
    #[serde(default)]
    pub kills: u64,
    #[serde(default)]
    pub final_kills: u64,
    #[serde(default)]
    pub beds_destroyed: u64,
    #[serde(default)]
    pub deaths: u64,
    pub timestamp: DateTime<Utc>,
}

impl VariantSample {
    pub fn from_stats(stats: &StatRecord, timestamp: DateTime<Utc>) -> Self {
        Self {
            kills: stats.kills,
            final_kills: stats.final_kills,
            beds_destroyed: stats.beds_destroyed,
            deaths: stats.deaths,
            timestamp,
        }
    }
}

/// Rolling averages of the scored stats
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HistoryAverages {
    pub kills: f64,
    pub final_kills: f64,
    pub beds_destroyed: f64,
    pub deaths: f64,
}

impl HistoryAverages {
    pub fn from_window(window: &BoundedWindow<VariantSample>) -> Option<Self> {
        if window.is_empty() {
            return None;
        }

        let mut averages = HistoryAverages::default();
        for sample in window.iter() {
            averages.kills += sample.kills as f64;
            averages.final_kills += sample.final_kills as f64;
            averages.beds_destroyed += sample.beds_destroyed as f64;
            averages.deaths += sample.deaths as f64;
        }

        let count = window.len() as f64;
        averages.kills /= count;
        averages.final_kills /= count;
        averages.beds_destroyed /= count;
        averages.deaths /= count;
        Some(averages)
    }

    pub fn get(&self, stat: ScoredStat) -> f64 {
        match stat {
            ScoredStat::Kills => self.kills,
            ScoredStat::FinalKills => self.final_kills,
            ScoredStat::BedsDestroyed => self.beds_destroyed,
            ScoredStat::Deaths => self.deaths,
        }
    }
}

/// Adjust a single-game distribution with the player's rolling averages
///
/// Runs the multiplicative weighting pass (flooring every product), a
/// renormalisation, then the ordered history rules and a final
/// renormalisation. When the rules exclude everything the table's
/// degenerate fallback is returned.
pub fn apply_history(
    table: &VariantTable,
    base: &VariantDistribution,
    averages: &HistoryAverages,
) -> VariantDistribution {
    let mut adjusted: BTreeMap<Variant, f64> = base.iter().map(|(v, p)| (v, p as f64)).collect();

    for weight in &table.history_weights {
        let factors = weight.factors_for(averages.get(weight.stat));
        for (variant, value) in adjusted.iter_mut() {
            *value = (*value * factors.factor(*variant)).floor();
        }
    }

    if let Some(renormalized) = normalize(&adjusted) {
        adjusted = renormalized.iter().map(|(v, p)| (v, p as f64)).collect();
    }

    for rule in &table.history_rules {
        let average = averages.get(rule.condition.stat);
        if !rule.condition.comparison.holds(average, rule.condition.threshold) {
            continue;
        }

        match &rule.action {
            HistoryAction::Exclude(variants) => {
                debug!("History excludes {:?} ({:?} avg {:.1})", variants, rule.condition.stat, average);
                for variant in variants {
                    adjusted.insert(*variant, 0.0);
                }
            }
            HistoryAction::Scale(variants, factor) => {
                for variant in variants {
                    if let Some(value) = adjusted.get_mut(variant) {
                        *value = (*value * factor).floor();
                    }
                }
            }
        }
    }

    normalize(&adjusted).unwrap_or_else(|| VariantDistribution::from_pairs(&table.degenerate_fallback))
}
