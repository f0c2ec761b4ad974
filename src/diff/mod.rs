//! Snapshot diffing
//!
//! Turns two cumulative stat snapshots into the discrete games that must
//! have happened between them.

pub mod differ;

pub use differ::{FamilyDiff, MatchEventDiffer};
