//! Tracker CLI Tool
//!
//! One-off commands against the stats provider and the inference pipeline,
//! without starting the service.
//!
//! Usage:
//!   cargo run --bin tracker-cli -- fetch --player Steve
//!   cargo run --bin tracker-cli -- diff --old before.json --new after.json
//!   cargo run --bin tracker-cli -- classify --kills 12 --final-kills 4 --beds 2 --deaths 1

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hive_tracker::classifier::{format_percentages, VariantClassifier, VariantTable};
use hive_tracker::diff::MatchEventDiffer;
use hive_tracker::provider::{extract_player_stats, HiveProviderConfig, HiveStatsProvider};
use hive_tracker::types::{family_display_name, StatRecord, StatSnapshot};
use hive_tracker::utils::normalize_player_name;
use hive_tracker::StatsProvider;

#[derive(Parser)]
#[command(name = "tracker-cli")]
#[command(about = "Inspect Hive stats and the match inference pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Stats API base URL
    #[arg(long)]
    base_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a player's current stats
    Fetch {
        /// Player name
        #[arg(short, long)]
        player: String,
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Infer games between two saved snapshots
    Diff {
        /// Older snapshot or raw API response (JSON)
        #[arg(long)]
        old: PathBuf,
        /// Newer snapshot or raw API response (JSON)
        #[arg(long)]
        new: PathBuf,
        /// Player name used in the output
        #[arg(short, long, default_value = "player")]
        player: String,
    },
    /// Estimate the BedWars variant of a single game
    Classify {
        #[arg(long, default_value = "0")]
        kills: u64,
        #[arg(long, default_value = "0")]
        final_kills: u64,
        #[arg(long, default_value = "0")]
        beds: u64,
        #[arg(long, default_value = "0")]
        deaths: u64,
    },
}

/// Read a snapshot file; raw provider responses are accepted as well
fn read_snapshot(path: &Path) -> Result<StatSnapshot> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&contents)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;

    if value.get("main").is_some() {
        let stats = extract_player_stats("", &value)
            .map_err(|e| anyhow::anyhow!("Unusable API response in {}: {}", path.display(), e))?;
        return Ok(stats.snapshot);
    }

    serde_json::from_value(value).with_context(|| format!("{} is not a stats snapshot", path.display()))
}

fn print_snapshot(snapshot: &StatSnapshot) {
    for (family, record) in snapshot {
        println!(
            "  {:<18} played {:>6}  won {:>6}  kills {:>6}  deaths {:>6}",
            family_display_name(family),
            record.played,
            record.victories,
            record.kills,
            record.deaths
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch { player, json } => {
            let mut config = HiveProviderConfig::default();
            if let Some(base_url) = cli.base_url {
                config.base_url = base_url;
            }
            let provider = HiveStatsProvider::new(config)?;

            match provider.fetch(&normalize_player_name(&player)).await {
                Ok(stats) => {
                    if json {
                        println!("{}", serde_json::to_string_pretty(&stats.snapshot)?);
                    } else {
                        println!(
                            "📊 {} - {} games, {} wins",
                            stats.display_name,
                            stats.total_played(),
                            stats.total_victories()
                        );
                        print_snapshot(&stats.snapshot);
                    }
                }
                Err(e) => {
                    eprintln!("❌ Fetch failed for {}: {}", player, e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Diff { old, new, player } => {
            let old = read_snapshot(&old)?;
            let new = read_snapshot(&new)?;

            let events = MatchEventDiffer::new().diff(
                &normalize_player_name(&player),
                &old,
                &new,
                chrono::Utc::now(),
            );

            if events.is_empty() {
                println!("No games between the two snapshots");
            }
            for event in events {
                println!(
                    "{} {:<18} kills {:>3}  deaths {:>3}  finals {:>3}  beds {:>3}",
                    if event.is_win { "✅ WIN " } else { "❌ LOSS" },
                    family_display_name(&event.family),
                    event.stats_delta.kills,
                    event.stats_delta.deaths,
                    event.stats_delta.final_kills,
                    event.stats_delta.beds_destroyed
                );
            }
        }
        Commands::Classify {
            kills,
            final_kills,
            beds,
            deaths,
        } => {
            let classifier = VariantClassifier::new(Arc::new(VariantTable::default()));
            let game = StatRecord {
                played: 1,
                kills,
                final_kills,
                beds_destroyed: beds,
                deaths,
                ..Default::default()
            };

            let distribution = classifier.score_single_game(&game);
            println!("{}", format_percentages(&distribution));
            if let Some(variant) = distribution.most_likely() {
                println!("Most likely: {}", variant.display_name());
            }
        }
    }

    Ok(())
}
