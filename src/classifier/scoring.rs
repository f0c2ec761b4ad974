//! Single-game scoring and percentage normalisation

use crate::classifier::table::{ScoredStat, Variant, VariantTable};
use crate::types::StatRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Percentage per variant; values are non-negative and sum to 100
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantDistribution(BTreeMap<Variant, u32>);

impl VariantDistribution {
    pub fn uniform() -> Self {
        let share = 100 / Variant::ALL.len() as u32;
        Self(Variant::ALL.iter().map(|v| (*v, share)).collect())
    }

    /// Every variant present, unlisted ones at zero
    pub fn from_pairs(pairs: &[(Variant, u32)]) -> Self {
        let mut map: BTreeMap<Variant, u32> = Variant::ALL.iter().map(|v| (*v, 0)).collect();
        for (variant, percentage) in pairs {
            map.insert(*variant, *percentage);
        }
        Self(map)
    }

    pub fn get(&self, variant: Variant) -> u32 {
        self.0.get(&variant).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Variant, u32)> + '_ {
        self.0.iter().map(|(v, p)| (*v, *p))
    }

    /// Variant with the highest share; ties go to the smaller team
    pub fn most_likely(&self) -> Option<Variant> {
        self.iter()
            .filter(|(_, p)| *p > 0)
            .fold(None, |best: Option<(Variant, u32)>, (v, p)| match best {
                Some((_, bp)) if bp >= p => best,
                _ => Some((v, p)),
            })
            .map(|(v, _)| v)
    }
}

/// Read one scored stat from a per-game record
pub fn stat_value(record: &StatRecord, stat: ScoredStat) -> f64 {
    match stat {
        ScoredStat::Kills => record.kills as f64,
        ScoredStat::FinalKills => record.final_kills as f64,
        ScoredStat::BedsDestroyed => record.beds_destroyed as f64,
        ScoredStat::Deaths => record.deaths as f64,
    }
}

/// Normalise raw scores to integer percentages
///
/// Negative scores count as zero. Each share is rounded and the rounding
/// residue is assigned to the largest share so the result sums to exactly 100.
/// Returns `None` when no score is positive.
pub fn normalize(scores: &BTreeMap<Variant, f64>) -> Option<VariantDistribution> {
    let total: f64 = scores.values().map(|s| s.max(0.0)).sum();
    if total <= 0.0 {
        return None;
    }

    let mut map: BTreeMap<Variant, u32> = Variant::ALL.iter().map(|v| (*v, 0)).collect();
    let mut largest: Option<(Variant, f64)> = None;
    for (variant, score) in scores {
        let share = score.max(0.0) / total * 100.0;
        map.insert(*variant, share.round() as u32);
        if share > 0.0 && largest.map_or(true, |(_, s)| share > s) {
            largest = Some((*variant, share));
        }
    }

    let sum: i64 = map.values().map(|p| *p as i64).sum();
    let residue = 100 - sum;
    if residue != 0 {
        if let Some((variant, _)) = largest {
            if let Some(slot) = map.get_mut(&variant) {
                *slot = (*slot as i64 + residue).max(0) as u32;
            }
        }
    }

    Some(VariantDistribution(map))
}

/// Raw per-variant scores for a single game
pub fn raw_scores(table: &VariantTable, stats: &StatRecord) -> BTreeMap<Variant, f64> {
    let mut scores: BTreeMap<Variant, f64> =
        Variant::ALL.iter().map(|v| (*v, table.deltas.base)).collect();

    for rule in &table.exclusions {
        let value = stat_value(stats, rule.condition.stat);
        if rule.condition.comparison.holds(value, rule.condition.threshold) {
            for variant in &rule.excludes {
                scores.insert(*variant, 0.0);
            }
        }
    }

    for rule in &table.bonuses {
        let applies = rule
            .conditions
            .iter()
            .all(|c| c.comparison.holds(stat_value(stats, c.stat), c.threshold));
        if applies {
            for (variant, bonus) in &rule.bonuses {
                if let Some(score) = scores.get_mut(variant) {
                    *score += bonus;
                }
            }
        }
    }

    for profile in &table.profiles {
        let Some(score) = scores.get_mut(&profile.variant) else {
            continue;
        };
        if *score == 0.0 {
            continue;
        }

        for stat in ScoredStat::ALL {
            let value = stat_value(stats, stat);
            let range = profile.range(stat);
            *score += if range.is_realistic(value) {
                table.deltas.realistic
            } else if range.is_possible(value) {
                table.deltas.possible
            } else {
                table.deltas.impossible
            };
        }
    }

    scores
}

/// Percentages for a single game; uniform when every variant scores zero
pub fn score_single_game(table: &VariantTable, stats: &StatRecord) -> VariantDistribution {
    normalize(&raw_scores(table, stats)).unwrap_or_else(VariantDistribution::uniform)
}

/// Render a distribution as `"Bed Solos: 62% | Bed Duos: 38%"`, highest first
pub fn format_percentages(distribution: &VariantDistribution) -> String {
    let mut entries: Vec<(Variant, u32)> = distribution.iter().filter(|(_, p)| *p > 0).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1));

    entries
        .iter()
        .map(|(variant, percentage)| format!("{}: {}%", variant.display_name(), percentage))
        .collect::<Vec<_>>()
        .join(" | ")
}
