//! Main entry point for the Hive tracker service
//!
//! Loads configuration, restores persisted state, and runs the poll loop
//! with health endpoints until a shutdown signal arrives.

use anyhow::Result;
use clap::Parser;
use hive_tracker::config::{validate_config, AppConfig};
use hive_tracker::service::{AppState, HealthCheck, HealthStatus, ServiceHandle};
use std::path::PathBuf;
use tokio::signal;
use tokio::time::Duration;
use tracing::{error, info, warn};

/// Hive Tracker - match inference from cumulative player stats
#[derive(Parser)]
#[command(
    name = "hive-tracker",
    version,
    about = "Polls Hive player stats and turns counter changes into match events",
    long_about = "Hive Tracker polls the public Hive stats API for a roster of players, \
                 infers individual wins and losses from cumulative counters, and enriches each \
                 one with winstreaks, queue-time forecasts and BedWars variant estimates."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Perform health check and exit
    #[arg(long, help = "Perform a health check and exit with status code")]
    health_check: bool,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    #[arg(long, value_name = "FILE", help = "Override the state file path")]
    data_file: Option<PathBuf>,

    #[arg(long, value_name = "PORT", help = "Override health and metrics server port")]
    health_port: Option<u16>,

    #[arg(long, value_name = "MS", help = "Override the poll interval in milliseconds")]
    poll_interval_ms: Option<u64>,

    /// Players to track permanently on startup
    #[arg(short, long = "track", value_name = "PLAYER", help = "Track a player (repeatable)")]
    track: Vec<String>,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(
        long,
        help = "Validate configuration and exit without starting service"
    )]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Perform health check and return appropriate exit code
async fn perform_health_check(config: AppConfig) -> Result<()> {
    info!("Performing health check...");

    let app_state = AppState::new(config).await?;
    let handle = app_state.handle();
    handle.set_running(true).await;

    match HealthCheck::check(handle).await {
        Ok(health) => {
            println!("Health Check: {}", health.status);
            for check in &health.checks {
                println!(
                    "  {}: {}{}",
                    check.name,
                    check.status,
                    check.message.as_deref().map(|m| format!(" ({})", m)).unwrap_or_default()
                );
            }
            println!("  Tracked Players: {}", health.stats.tracked_players);
            println!("  Active Players: {}", health.stats.active_players);
            println!("  Temporary Players: {}", health.stats.temporary_players);

            // A fresh process has not ticked yet, so degraded still passes
            if health.status == HealthStatus::Unhealthy {
                std::process::exit(1);
            } else {
                std::process::exit(0);
            }
        }
        Err(e) => {
            error!("Health check failed: {}", e);
            std::process::exit(1);
        }
    }
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

/// Log a health summary every few minutes
async fn health_check_task(handle: ServiceHandle) {
    let mut interval = tokio::time::interval(Duration::from_secs(300));

    while handle.is_running().await {
        interval.tick().await;

        match HealthCheck::check(handle.clone()).await {
            Ok(health) => {
                info!(
                    "Health check: {} - {} tracked ({} active, {} inactive)",
                    health.status,
                    health.stats.tracked_players,
                    health.stats.active_players,
                    health.stats.inactive_players
                );
            }
            Err(e) => {
                warn!("Health check failed: {}", e);
            }
        }
    }
}

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig) {
    info!("🐝 Hive Tracker");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!("   Health port: {}", config.service.health_port);
    info!("   Provider: {}", config.provider.base_url);
    info!("   State file: {}", config.storage.data_file.display());
    info!(
        "   Poll interval: {}ms (inactive every {}s)",
        config.polling.base_interval_ms, config.polling.inactive_poll_interval_seconds
    );
    info!(
        "   Request budget: {} per {}s, {} concurrent",
        config.polling.requests_per_minute,
        config.polling.limiter_window_seconds,
        config.polling.max_concurrent_fetches
    );
    info!("   Daily reset timezone: {}", config.roster.timezone);
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

/// Load and merge configuration from file or environment and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    // Apply CLI overrides
    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Some(data_file) = &args.data_file {
        config.storage.data_file = data_file.clone();
    }

    if let Some(health_port) = args.health_port {
        config.service.health_port = health_port;
    }

    if let Some(poll_interval_ms) = args.poll_interval_ms {
        config.polling.base_interval_ms = poll_interval_ms;
    }

    validate_config(&config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    // Initialize logging early (before any other operations)
    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if args.health_check {
        return perform_health_check(config).await;
    }

    if args.dry_run {
        info!("Configuration validation successful");
        display_startup_banner(&config);
        info!("Dry run completed - exiting without starting service");
        return Ok(());
    }

    display_startup_banner(&config);

    info!("Initializing service components...");
    let mut app_state = match AppState::new(config.clone()).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    if !args.track.is_empty() {
        let added = app_state.track_players(&args.track).await;
        info!("Added {} of {} players from the command line", added, args.track.len());
    }

    info!("Starting service...");
    if let Err(e) = app_state.start().await {
        error!("Failed to start service: {}", e);
        std::process::exit(1);
    }

    let health_task = tokio::spawn(health_check_task(app_state.handle()));

    info!("✅ Hive Tracker is running");
    info!("Press Ctrl+C to shutdown gracefully...");

    wait_for_shutdown_signal().await;

    info!("🛑 Shutdown signal received, beginning graceful shutdown...");
    health_task.abort();

    match tokio::time::timeout(config.shutdown_timeout(), app_state.shutdown()).await {
        Ok(Ok(())) => {
            info!("✅ Graceful shutdown completed successfully");
        }
        Ok(Err(e)) => {
            error!("Shutdown finished with an error: {}", e);
        }
        Err(_) => {
            warn!("⚠️  Shutdown timeout exceeded, forcing exit");
        }
    }

    info!("🛑 Hive Tracker stopped");
    Ok(())
}
