//! Data-driven classification table

use serde::{Deserialize, Serialize};

/// Sub-variants of the ambiguous family, smallest teams first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Variant {
    #[serde(rename = "bed-solos")]
    Solos,
    #[serde(rename = "bed-duos")]
    Duos,
    #[serde(rename = "bed-squads")]
    Squads,
    #[serde(rename = "bed-manor")]
    Manor,
    #[serde(rename = "bed-mega")]
    Mega,
}

impl Variant {
    pub const ALL: [Variant; 5] = [
        Variant::Solos,
        Variant::Duos,
        Variant::Squads,
        Variant::Manor,
        Variant::Mega,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Variant::Solos => "bed-solos",
            Variant::Duos => "bed-duos",
            Variant::Squads => "bed-squads",
            Variant::Manor => "bed-manor",
            Variant::Mega => "bed-mega",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Variant::Solos => "Bed Solos",
            Variant::Duos => "Bed Duos",
            Variant::Squads => "Bed Squads",
            Variant::Manor => "Bed Manor",
            Variant::Mega => "Bed Mega",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// The four stats the classifier looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoredStat {
    Kills,
    FinalKills,
    BedsDestroyed,
    Deaths,
}

impl ScoredStat {
    pub const ALL: [ScoredStat; 4] = [
        ScoredStat::Kills,
        ScoredStat::FinalKills,
        ScoredStat::BedsDestroyed,
        ScoredStat::Deaths,
    ];
}

/// Observed envelope of one stat for one variant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatRange {
    pub max: f64,
    pub realistic_min: f64,
    pub realistic_max: f64,
}

impl StatRange {
    pub const fn new(max: f64, realistic_min: f64, realistic_max: f64) -> Self {
        Self {
            max,
            realistic_min,
            realistic_max,
        }
    }

    pub fn is_realistic(&self, value: f64) -> bool {
        value >= self.realistic_min && value <= self.realistic_max
    }

    pub fn is_possible(&self, value: f64) -> bool {
        value <= self.max
    }
}

/// Stat envelopes for one variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantProfile {
    pub variant: Variant,
    pub kills: StatRange,
    pub final_kills: StatRange,
    pub beds_destroyed: StatRange,
    pub deaths: StatRange,
}

impl VariantProfile {
    pub fn range(&self, stat: ScoredStat) -> &StatRange {
        match stat {
            ScoredStat::Kills => &self.kills,
            ScoredStat::FinalKills => &self.final_kills,
            ScoredStat::BedsDestroyed => &self.beds_destroyed,
            ScoredStat::Deaths => &self.deaths,
        }
    }
}

/// Score changes applied per stat while scoring a single game
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreDeltas {
    pub base: f64,
    pub realistic: f64,
    pub possible: f64,
    pub impossible: f64,
}

/// How a stat value is compared against a rule threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Comparison {
    Equal,
    AtLeast,
    Above,
}

impl Comparison {
    pub fn holds(&self, value: f64, threshold: f64) -> bool {
        match self {
            Comparison::Equal => value == threshold,
            Comparison::AtLeast => value >= threshold,
            Comparison::Above => value > threshold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatCondition {
    pub stat: ScoredStat,
    pub comparison: Comparison,
    pub threshold: f64,
}

impl StatCondition {
    pub const fn above(stat: ScoredStat, threshold: f64) -> Self {
        Self {
            stat,
            comparison: Comparison::Above,
            threshold,
        }
    }
}

/// Single-game hard exclusion: zero the listed variants when the condition holds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExclusionRule {
    pub condition: StatCondition,
    pub excludes: Vec<Variant>,
}

/// Single-game bonus: add points when every condition holds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BonusRule {
    pub conditions: Vec<StatCondition>,
    pub bonuses: Vec<(Variant, f64)>,
}

/// Per-variant multipliers, indexed in [`Variant::ALL`] order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VariantFactors(pub [f64; 5]);

impl VariantFactors {
    pub fn factor(&self, variant: Variant) -> f64 {
        self.0[variant.index()]
    }
}

/// History weighting for one stat: pick a profile by the rolling average
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryWeight {
    pub stat: ScoredStat,
    pub high_threshold: f64,
    pub medium_threshold: f64,
    pub high: VariantFactors,
    pub medium: VariantFactors,
    pub low: VariantFactors,
}

impl HistoryWeight {
    pub fn factors_for(&self, average: f64) -> &VariantFactors {
        if average >= self.high_threshold {
            &self.high
        } else if average >= self.medium_threshold {
            &self.medium
        } else {
            &self.low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HistoryAction {
    Exclude(Vec<Variant>),
    Scale(Vec<Variant>, f64),
}

/// History rule applied to the rolling average when it exceeds a threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRule {
    pub condition: StatCondition,
    pub action: HistoryAction,
}

/// Complete classifier configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantTable {
    /// Family key the table applies to
    pub family: String,
    pub profiles: Vec<VariantProfile>,
    pub deltas: ScoreDeltas,
    pub exclusions: Vec<ExclusionRule>,
    pub bonuses: Vec<BonusRule>,
    pub history_weights: Vec<HistoryWeight>,
    /// Applied in order after the weighting pass
    pub history_rules: Vec<HistoryRule>,
    /// Samples required before history influences a result
    pub min_history: usize,
    pub history_capacity: usize,
    /// Distribution used when history excludes every variant
    pub degenerate_fallback: Vec<(Variant, u32)>,
}

impl VariantTable {
    pub fn profile(&self, variant: Variant) -> Option<&VariantProfile> {
        self.profiles.iter().find(|p| p.variant == variant)
    }
}

impl Default for VariantTable {
    fn default() -> Self {
        use ScoredStat::*;
        use Variant::*;

        Self {
            family: "bed".to_string(),
            profiles: vec![
                VariantProfile {
                    variant: Solos,
                    final_kills: StatRange::new(7.0, 3.0, 4.0),
                    kills: StatRange::new(20.0, 7.0, 13.0),
                    beds_destroyed: StatRange::new(7.0, 2.0, 4.0),
                    deaths: StatRange::new(7.0, 0.0, 4.0),
                },
                VariantProfile {
                    variant: Duos,
                    final_kills: StatRange::new(14.0, 3.0, 6.0),
                    kills: StatRange::new(25.0, 9.0, 15.0),
                    beds_destroyed: StatRange::new(7.0, 2.0, 4.0),
                    deaths: StatRange::new(7.0, 0.0, 4.0),
                },
                VariantProfile {
                    variant: Squads,
                    final_kills: StatRange::new(12.0, 0.0, 5.0),
                    kills: StatRange::new(14.0, 0.0, 6.0),
                    beds_destroyed: StatRange::new(3.0, 0.0, 2.0),
                    deaths: StatRange::new(5.0, 0.0, 4.0),
                },
                VariantProfile {
                    variant: Manor,
                    final_kills: StatRange::new(15.0, 1.5, 6.0),
                    kills: StatRange::new(15.0, 2.0, 9.0),
                    beds_destroyed: StatRange::new(3.0, 0.0, 2.0),
                    deaths: StatRange::new(5.0, 0.0, 2.0),
                },
                VariantProfile {
                    variant: Mega,
                    final_kills: StatRange::new(12.0, 0.0, 4.0),
                    kills: StatRange::new(25.0, 4.0, 12.0),
                    beds_destroyed: StatRange::new(1.0, 0.0, 1.0),
                    deaths: StatRange::new(3.0, 0.0, 2.0),
                },
            ],
            deltas: ScoreDeltas {
                base: 100.0,
                realistic: 15.0,
                possible: -5.0,
                impossible: -30.0,
            },
            exclusions: vec![
                ExclusionRule {
                    condition: StatCondition::above(BedsDestroyed, 1.0),
                    excludes: vec![Mega],
                },
                ExclusionRule {
                    condition: StatCondition::above(BedsDestroyed, 3.0),
                    excludes: vec![Squads, Manor, Mega],
                },
                ExclusionRule {
                    condition: StatCondition::above(Kills, 15.0),
                    excludes: vec![Solos, Duos],
                },
                ExclusionRule {
                    condition: StatCondition::above(FinalKills, 7.0),
                    excludes: vec![Solos],
                },
            ],
            bonuses: vec![BonusRule {
                conditions: vec![
                    StatCondition {
                        stat: Deaths,
                        comparison: Comparison::Equal,
                        threshold: 0.0,
                    },
                    StatCondition {
                        stat: BedsDestroyed,
                        comparison: Comparison::AtLeast,
                        threshold: 3.0,
                    },
                ],
                bonuses: vec![(Solos, 20.0), (Duos, 10.0)],
            }],
            history_weights: vec![
                HistoryWeight {
                    stat: BedsDestroyed,
                    high_threshold: 3.0,
                    medium_threshold: 2.0,
                    high: VariantFactors([1.4, 1.3, 0.6, 0.6, 0.0]),
                    medium: VariantFactors([1.1, 1.15, 1.02, 1.034, 0.0]),
                    low: VariantFactors([0.25, 0.26, 1.15, 1.20, 1.1]),
                },
                HistoryWeight {
                    stat: Kills,
                    high_threshold: 12.0,
                    medium_threshold: 7.0,
                    high: VariantFactors([1.3, 1.25, 0.7, 0.83, 1.1]),
                    medium: VariantFactors([1.1, 1.1, 0.95, 1.1, 1.0]),
                    low: VariantFactors([0.7, 0.75, 1.2, 1.15, 0.98]),
                },
                HistoryWeight {
                    stat: FinalKills,
                    high_threshold: 5.0,
                    medium_threshold: 3.0,
                    high: VariantFactors([0.95, 1.0, 0.9, 0.88, 0.98]),
                    medium: VariantFactors([1.1, 1.0, 0.98, 1.15, 0.98]),
                    low: VariantFactors([0.9, 0.85, 1.15, 1.1, 1.05]),
                },
                HistoryWeight {
                    stat: Deaths,
                    high_threshold: 3.0,
                    medium_threshold: 1.0,
                    high: VariantFactors([1.2, 1.2, 0.2, 0.7, 0.10]),
                    medium: VariantFactors([1.05, 1.085, 1.0, 1.0, 0.95]),
                    low: VariantFactors([0.6, 0.6, 1.12, 0.9, 1.05]),
                },
            ],
            history_rules: vec![
                HistoryRule {
                    condition: StatCondition::above(BedsDestroyed, 1.0),
                    action: HistoryAction::Exclude(vec![Mega]),
                },
                HistoryRule {
                    condition: StatCondition::above(BedsDestroyed, 3.0),
                    action: HistoryAction::Exclude(vec![Squads, Manor]),
                },
                HistoryRule {
                    condition: StatCondition::above(BedsDestroyed, 2.1),
                    action: HistoryAction::Scale(vec![Squads, Manor], 0.3),
                },
                HistoryRule {
                    condition: StatCondition::above(Kills, 15.0),
                    action: HistoryAction::Exclude(vec![Solos, Duos, Squads]),
                },
                HistoryRule {
                    condition: StatCondition::above(FinalKills, 7.0),
                    action: HistoryAction::Exclude(vec![Solos, Mega, Manor]),
                },
                HistoryRule {
                    condition: StatCondition::above(FinalKills, 5.0),
                    action: HistoryAction::Exclude(vec![Squads]),
                },
                HistoryRule {
                    condition: StatCondition::above(FinalKills, 14.0),
                    action: HistoryAction::Exclude(vec![Duos]),
                },
            ],
            min_history: 3,
            history_capacity: 10,
            degenerate_fallback: vec![(Solos, 33), (Duos, 33), (Squads, 34)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_covers_every_variant() {
        let table = VariantTable::default();
        for variant in Variant::ALL {
            assert!(table.profile(variant).is_some(), "missing {}", variant);
        }
        let fallback: u32 = table.degenerate_fallback.iter().map(|(_, p)| p).sum();
        assert_eq!(fallback, 100);
    }

    #[test]
    fn test_history_weight_profile_selection() {
        let table = VariantTable::default();
        let beds = &table.history_weights[0];
        assert_eq!(beds.factors_for(3.0).factor(Variant::Solos), 1.4);
        assert_eq!(beds.factors_for(2.5).factor(Variant::Duos), 1.15);
        assert_eq!(beds.factors_for(0.4).factor(Variant::Manor), 1.20);
    }

    #[test]
    fn test_variant_labels() {
        assert_eq!(Variant::Manor.key(), "bed-manor");
        assert_eq!(Variant::Mega.to_string(), "Bed Mega");
        assert_eq!(serde_json::to_string(&Variant::Duos).unwrap(), "\"bed-duos\"");
    }

    #[test]
    fn test_range_checks() {
        let range = StatRange::new(15.0, 1.5, 6.0);
        assert!(range.is_realistic(1.5));
        assert!(!range.is_realistic(1.0));
        assert!(range.is_possible(15.0));
        assert!(!range.is_possible(16.0));
    }
}
