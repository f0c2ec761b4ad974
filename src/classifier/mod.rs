//! Sub-variant classification for the ambiguous game family
//!
//! BedWars games are reported under a single `bed` key although they come
//! from five different queues. The classifier estimates which queue a game
//! came from using the shape of its stats and the player's recent history.
//! All thresholds and multipliers live in [`VariantTable`] so behaviour can be
//! changed or tested by substituting the table.

pub mod classifier;
pub mod history;
pub mod scoring;
pub mod table;

pub use classifier::VariantClassifier;
pub use history::{HistoryAverages, VariantSample};
pub use scoring::{format_percentages, VariantDistribution};
pub use table::{ScoredStat, Variant, VariantTable};
