//! Main application state and service coordination
//!
//! Wires the stats provider, limiter, state store and engine into a
//! [`PollScheduler`] and runs it from background tasks alongside the
//! metrics server.

use crate::config::AppConfig;
use crate::engine::TrackerEngine;
use crate::metrics::{HealthServer, HealthServerConfig, MetricsCollector, MetricsService};
use crate::notify::{LoggingNotificationSink, NotificationSink};
use crate::provider::{HiveStatsProvider, StatsProvider};
use crate::roster::TrackingKind;
use crate::scheduler::{PollScheduler, TokenBucketLimiter};
use crate::service::health::{HealthCheck, HealthStatus};
use crate::storage::{load_state, JsonFileStore, StateStore};
use crate::utils::normalize_player_name;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Cheap, cloneable view of the running service
///
/// Shared with the health server and background tasks.
#[derive(Clone)]
pub struct ServiceHandle {
    service_name: String,
    scheduler: Arc<PollScheduler>,
    is_running: Arc<RwLock<bool>>,
    last_tick: Arc<RwLock<Option<DateTime<Utc>>>>,
    started_at: Instant,
}

impl ServiceHandle {
    pub fn new(service_name: impl Into<String>, scheduler: Arc<PollScheduler>) -> Self {
        Self {
            service_name: service_name.into(),
            scheduler,
            is_running: Arc::new(RwLock::new(false)),
            last_tick: Arc::new(RwLock::new(None)),
            started_at: Instant::now(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn scheduler(&self) -> Arc<PollScheduler> {
        self.scheduler.clone()
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub async fn set_running(&self, running: bool) {
        *self.is_running.write().await = running;
    }

    pub async fn last_tick(&self) -> Option<DateTime<Utc>> {
        *self.last_tick.read().await
    }

    pub async fn record_tick(&self, at: DateTime<Utc>) {
        *self.last_tick.write().await = Some(at);
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// Scheduler plus shared status flags
    handle: ServiceHandle,

    /// Metrics service for monitoring and health checks
    metrics_service: Arc<MetricsService>,

    /// Background task handles
    background_tasks: Vec<JoinHandle<()>>,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        Self::with_sink(config, Arc::new(LoggingNotificationSink)).await
    }

    /// Initialize with a custom notification sink
    pub async fn with_sink(config: AppConfig, sink: Arc<dyn NotificationSink>) -> Result<Self, ServiceError> {
        info!("Initializing hive-tracker service");
        info!(
            "Configuration: service={}, provider={}, data_file={}",
            config.service.name,
            config.provider.base_url,
            config.storage.data_file.display()
        );

        let metrics_collector = Self::initialize_metrics_collector()?;

        let provider: Arc<dyn StatsProvider> = Arc::new(
            HiveStatsProvider::new(config.provider_config()).map_err(|e| ServiceError::Initialization {
                message: format!("Failed to create stats provider: {}", e),
            })?,
        );

        let store: Arc<dyn StateStore> = Arc::new(JsonFileStore::open(&config.storage.data_file).map_err(
            |e| ServiceError::Initialization {
                message: format!("Failed to open state file: {}", e),
            },
        )?);

        let engine = Self::restore_engine(&config, store.as_ref())?;

        let limiter = Arc::new(TokenBucketLimiter::new(config.limiter_config()));
        let scheduler = PollScheduler::new(
            engine,
            provider,
            limiter,
            sink,
            store,
            config.scheduler_settings(),
        )
        .with_metrics(metrics_collector.clone());

        let handle = ServiceHandle::new(config.service.name.clone(), Arc::new(scheduler));
        let metrics_service = Self::initialize_metrics(&config, metrics_collector, handle.clone());

        Ok(Self {
            config,
            handle,
            metrics_service,
            background_tasks: Vec::new(),
        })
    }

    /// Start all background services
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        info!("Starting hive-tracker service");

        self.handle.set_running(true).await;

        // Start metrics service first
        self.start_metrics_service().await?;

        self.start_background_tasks().await?;

        info!("✅ hive-tracker service started successfully");
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of hive-tracker service");

        self.handle.set_running(false).await;

        self.stop_background_tasks().await;
        self.handle.scheduler().abort_countdowns().await;

        info!("Stopping metrics service...");
        if let Err(e) = self.metrics_service.stop().await {
            warn!("Failed to stop metrics service: {}", e);
        } else {
            info!("✅ Metrics service stopped");
        }

        self.handle
            .scheduler()
            .save()
            .await
            .map_err(|e| ServiceError::BackgroundTask {
                message: format!("Failed to save state on shutdown: {}", e),
            })?;
        info!("✅ Tracker state saved");

        let engine = self.handle.scheduler().engine();
        let tracked = engine.read().await.roster().len();
        info!("✅ hive-tracker shutdown completed ({} players tracked)", tracked);

        Ok(())
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        self.handle.is_running().await
    }

    pub fn handle(&self) -> ServiceHandle {
        self.handle.clone()
    }

    pub fn scheduler(&self) -> Arc<PollScheduler> {
        self.handle.scheduler()
    }

    /// Get metrics service
    pub fn metrics_service(&self) -> Arc<MetricsService> {
        self.metrics_service.clone()
    }

    /// Add permanent players that are not tracked yet
    ///
    /// Failures are logged per player and do not stop the rest.
    pub async fn track_players(&self, names: &[String]) -> usize {
        let scheduler = self.handle.scheduler();
        let mut added = 0;

        for name in names {
            let player_id = normalize_player_name(name);
            if scheduler.engine().read().await.roster().contains(&player_id) {
                debug!("{} is already tracked", name);
                continue;
            }
            match scheduler.add_player(name, TrackingKind::Permanent, Utc::now()).await {
                Ok(player) => {
                    info!("Tracking {} from the command line", player.display_name);
                    added += 1;
                }
                Err(e) => warn!("Could not track {}: {}", name, e),
            }
        }
        added
    }

    fn initialize_metrics_collector() -> Result<Arc<MetricsCollector>, ServiceError> {
        let collector = MetricsCollector::new().map_err(|e| ServiceError::Initialization {
            message: format!("Failed to create metrics collector: {}", e),
        })?;
        Ok(Arc::new(collector))
    }

    fn initialize_metrics(
        config: &AppConfig,
        metrics_collector: Arc<MetricsCollector>,
        handle: ServiceHandle,
    ) -> Arc<MetricsService> {
        info!(
            "Initializing metrics service on port {}",
            config.service.health_port
        );

        let health_config = HealthServerConfig {
            port: config.service.health_port,
            host: "0.0.0.0".to_string(),
        };

        let health_server =
            Arc::new(HealthServer::new(health_config, metrics_collector.clone()).with_service(handle));
        Arc::new(MetricsService::new(metrics_collector, health_server))
    }

    /// Load persisted state and build the engine from it
    fn restore_engine(config: &AppConfig, store: &dyn StateStore) -> Result<TrackerEngine, ServiceError> {
        let settings = config.engine_settings().map_err(|e| ServiceError::Configuration {
            message: e.to_string(),
        })?;

        let loaded = load_state(store, Utc::now()).map_err(|e| ServiceError::Initialization {
            message: format!("Failed to load tracker state: {}", e),
        })?;

        if !loaded.recovered.is_empty() {
            warn!(
                "Recovered {} malformed state entries with empty defaults",
                loaded.recovered.len()
            );
            for recovery in &loaded.recovered {
                debug!("  - {}", recovery);
            }
        }
        Ok(TrackerEngine::from_state(settings, loaded.state))
    }

    /// Start metrics service
    async fn start_metrics_service(&mut self) -> Result<(), ServiceError> {
        info!("Starting metrics and health endpoints");

        let metrics_service = self.metrics_service.clone();
        let port = self.config.service.health_port;

        let metrics_handle = tokio::spawn(async move {
            if let Err(e) = metrics_service.start().await {
                error!("Metrics service failed: {}", e);
            } else {
                info!("Metrics service task completed");
            }
        });

        self.background_tasks.push(metrics_handle);

        // Give the server a moment to start up
        tokio::time::sleep(Duration::from_millis(100)).await;

        info!("✅ Metrics service started on port {}", port);
        Ok(())
    }

    /// Start the poll loop and maintenance tasks
    async fn start_background_tasks(&mut self) -> Result<(), ServiceError> {
        info!("Starting background tasks...");

        info!(
            "Starting poll loop ({}ms interval)...",
            self.config.poll_interval().as_millis()
        );
        let poll_task = {
            let handle = self.handle.clone();
            let poll_interval = self.config.poll_interval();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(poll_interval);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                info!("Poll loop started");

                while handle.is_running().await {
                    interval.tick().await;

                    let report = handle.scheduler().tick(Utc::now()).await;
                    handle.record_tick(Utc::now()).await;

                    if report.events > 0 || report.failed > 0 {
                        info!(
                            "Tick: {} fetched, {} events, {} milestones, {} failed",
                            report.fetched, report.events, report.milestones, report.failed
                        );
                    } else {
                        debug!("Tick: {:?}", report);
                    }
                }

                info!("Poll loop stopped");
            })
        };

        info!(
            "Starting temporary tracking cleanup task ({}s interval)...",
            self.config.temp_cleanup_interval().as_secs()
        );
        let cleanup_task = {
            let handle = self.handle.clone();
            let cleanup_interval = self.config.temp_cleanup_interval();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(cleanup_interval);
                info!("Temporary tracking cleanup task started");

                while handle.is_running().await {
                    interval.tick().await;

                    let expired = handle.scheduler().expire_temporary(Utc::now()).await;
                    if expired > 0 {
                        info!("Removed {} expired temporary players", expired);
                    } else {
                        debug!("Cleanup check completed - nothing expired");
                    }
                }

                info!("Temporary tracking cleanup task stopped");
            })
        };

        info!("Starting daily stats reset task...");
        let daily_reset_task = {
            let handle = self.handle.clone();

            tokio::spawn(async move {
                info!("Daily stats reset task started");

                while handle.is_running().await {
                    let wait = {
                        let engine = handle.scheduler().engine();
                        let until = engine.read().await.daily().until_next_reset(Utc::now());
                        until.to_std().unwrap_or(Duration::from_secs(1))
                    };
                    debug!("Next daily stats reset in {}s", wait.as_secs());
                    tokio::time::sleep(wait).await;

                    handle.scheduler().reset_daily_stats(Utc::now()).await;
                }

                info!("Daily stats reset task stopped");
            })
        };

        info!("Starting health metrics task (60s interval)...");
        let health_metrics_task = {
            let handle = self.handle.clone();
            let metrics_collector = self.metrics_service.collector();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(60));
                info!("Health metrics task started");

                while handle.is_running().await {
                    interval.tick().await;

                    metrics_collector.update_uptime(handle.uptime());

                    match HealthCheck::check(handle.clone()).await {
                        Ok(health) => {
                            metrics_collector.update_health_status(health.status.as_gauge());
                            for check in &health.checks {
                                metrics_collector.update_component_health(
                                    &check.name,
                                    check.status != HealthStatus::Unhealthy,
                                );
                            }
                            debug!(
                                "Health: {} - {} tracked, {} active",
                                health.status,
                                health.stats.tracked_players,
                                health.stats.active_players
                            );
                        }
                        Err(e) => warn!("Health check failed: {}", e),
                    }
                }

                info!("Health metrics task stopped");
            })
        };

        self.background_tasks.push(poll_task);
        self.background_tasks.push(cleanup_task);
        self.background_tasks.push(daily_reset_task);
        self.background_tasks.push(health_metrics_task);

        info!("4 background tasks started successfully");
        Ok(())
    }

    /// Stop all background tasks
    async fn stop_background_tasks(&mut self) {
        let task_count = self.background_tasks.len();
        if task_count == 0 {
            info!("No background tasks to stop");
            return;
        }

        info!("Stopping {} background tasks...", task_count);

        for (i, task) in self.background_tasks.drain(..).enumerate() {
            debug!("Aborting background task {}/{}", i + 1, task_count);
            task.abort();
        }

        info!("✅ All {} background tasks stopped", task_count);
    }
}
