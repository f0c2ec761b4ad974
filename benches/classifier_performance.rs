//! Performance benchmarks for match inference and variant scoring

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hive_tracker::classifier::{VariantClassifier, VariantTable};
use hive_tracker::diff::MatchEventDiffer;
use hive_tracker::engine::TrackerEngine;
use hive_tracker::provider::PlayerStats;
use hive_tracker::roster::TrackingKind;
use hive_tracker::types::{StatRecord, StatSnapshot};
use std::sync::Arc;

fn bed_game(kills: u64, final_kills: u64, beds: u64, deaths: u64) -> StatRecord {
    StatRecord {
        played: 1,
        kills,
        final_kills,
        beds_destroyed: beds,
        deaths,
        ..Default::default()
    }
}

fn snapshot(scale: u64) -> StatSnapshot {
    ["bed", "sg", "sky", "dr", "murder", "ctf"]
        .iter()
        .enumerate()
        .map(|(i, family)| {
            let base = scale * (i as u64 + 1);
            (
                family.to_string(),
                StatRecord {
                    played: base,
                    victories: base / 2,
                    kills: base * 3,
                    deaths: base,
                    final_kills: base / 3,
                    beds_destroyed: base / 4,
                    ..Default::default()
                },
            )
        })
        .collect()
}

fn bench_single_game_scoring(c: &mut Criterion) {
    let classifier = VariantClassifier::new(Arc::new(VariantTable::default()));
    let games = [
        bed_game(2, 0, 0, 1),
        bed_game(9, 4, 1, 2),
        bed_game(15, 7, 3, 0),
        bed_game(0, 0, 0, 0),
    ];

    c.bench_function("variant_single_game_scoring", |b| {
        b.iter(|| {
            for game in &games {
                black_box(classifier.score_single_game(black_box(game)));
            }
        })
    });
}

fn bench_history_scoring(c: &mut Criterion) {
    let mut classifier = VariantClassifier::new(Arc::new(VariantTable::default()));
    let now = Utc::now();
    for i in 0..10 {
        classifier.record("steve", &bed_game(8 + i % 3, 3, 1, 1), now);
    }
    let game = bed_game(10, 4, 2, 1);

    c.bench_function("variant_history_scoring", |b| {
        b.iter(|| black_box(classifier.score_with_history("steve", black_box(&game))))
    });
}

fn bench_snapshot_diff(c: &mut Criterion) {
    let differ = MatchEventDiffer::new();
    let player_id = "steve".to_string();
    let old = snapshot(100);
    let new = snapshot(103);
    let now = Utc::now();

    c.bench_function("snapshot_diff_six_families", |b| {
        b.iter(|| black_box(differ.diff(&player_id, black_box(&old), black_box(&new), now)))
    });
}

fn bench_engine_apply(c: &mut Criterion) {
    c.bench_function("engine_apply_snapshot", |b| {
        b.iter(|| {
            let now = Utc::now();
            let mut engine = TrackerEngine::default();
            let baseline = PlayerStats {
                display_name: "Steve".to_string(),
                snapshot: snapshot(100),
            };
            let _ = engine.add_player("Steve", baseline, TrackingKind::Permanent, now);

            let next = PlayerStats {
                display_name: "Steve".to_string(),
                snapshot: snapshot(101),
            };
            black_box(engine.apply_snapshot("steve", next, now))
        })
    });
}

criterion_group!(
    benches,
    bench_single_game_scoring,
    bench_history_scoring,
    bench_snapshot_diff,
    bench_engine_apply
);
criterion_main!(benches);
