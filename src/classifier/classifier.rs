//! Variant classifier with per-player history

use crate::classifier::history::{apply_history, HistoryAverages, VariantSample};
use crate::classifier::scoring::{score_single_game, VariantDistribution};
use crate::classifier::table::VariantTable;
use crate::forecast::BoundedWindow;
use crate::types::{PlayerId, StatRecord};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Classifier history keyed by player
pub type VariantHistoryMap = HashMap<PlayerId, BoundedWindow<VariantSample>>;

#[derive(Debug, Clone)]
pub struct VariantClassifier {
    table: Arc<VariantTable>,
    histories: VariantHistoryMap,
}

impl Default for VariantClassifier {
    fn default() -> Self {
        Self::new(Arc::new(VariantTable::default()))
    }
}

impl VariantClassifier {
    pub fn new(table: Arc<VariantTable>) -> Self {
        Self {
            table,
            histories: HashMap::new(),
        }
    }

    pub fn with_histories(table: Arc<VariantTable>, histories: VariantHistoryMap) -> Self {
        Self { table, histories }
    }

    pub fn table(&self) -> &VariantTable {
        &self.table
    }

    /// Whether games of this family need classifying
    pub fn applies_to(&self, family: &str) -> bool {
        self.table.family == family
    }

    pub fn score_single_game(&self, stats: &StatRecord) -> VariantDistribution {
        score_single_game(&self.table, stats)
    }

    /// Score a game using the player's history, without recording it
    pub fn score_with_history(&self, player_id: &str, stats: &StatRecord) -> VariantDistribution {
        let base = self.score_single_game(stats);

        let Some(window) = self.histories.get(player_id) else {
            return base;
        };
        if window.len() < self.table.min_history {
            return base;
        }

        match HistoryAverages::from_window(window) {
            Some(averages) => {
                debug!(
                    "Applying {} game history for {}: beds {:.1}, kills {:.1}, fk {:.1}, deaths {:.1}",
                    window.len(),
                    player_id,
                    averages.beds_destroyed,
                    averages.kills,
                    averages.final_kills,
                    averages.deaths
                );
                apply_history(&self.table, &base, &averages)
            }
            None => base,
        }
    }

    /// Score a game and then add it to the player's history
    ///
    /// The current game only influences later calls.
    pub fn classify(&mut self, player_id: &str, stats: &StatRecord, now: DateTime<Utc>) -> VariantDistribution {
        let distribution = self.score_with_history(player_id, stats);
        self.record(player_id, stats, now);
        distribution
    }

    pub fn record(&mut self, player_id: &str, stats: &StatRecord, now: DateTime<Utc>) {
        let capacity = self.table.history_capacity;
        self.histories
            .entry(player_id.to_string())
            .or_insert_with(|| BoundedWindow::new(capacity))
            .push(VariantSample::from_stats(stats, now));
    }

    pub fn history(&self, player_id: &str) -> Option<&BoundedWindow<VariantSample>> {
        self.histories.get(player_id)
    }

    pub fn remove_player(&mut self, player_id: &str) {
        self.histories.remove(player_id);
    }

    pub fn as_map(&self) -> &VariantHistoryMap {
        &self.histories
    }
}
