//! Health checks
//!
//! Readiness and liveness probes for the tracker, evaluated against a
//! [`ServiceHandle`] so the HTTP layer never needs the whole application.

use crate::service::app::ServiceHandle;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Gauge value exported to Prometheus
    pub fn as_gauge(&self) -> u8 {
        match self {
            HealthStatus::Healthy => 2,
            HealthStatus::Degraded => 1,
            HealthStatus::Unhealthy => 0,
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "✅ healthy"),
            HealthStatus::Degraded => write!(f, "⚠️  degraded"),
            HealthStatus::Unhealthy => write!(f, "❌ unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    pub name: String,
    pub status: HealthStatus,
    /// Optional message when not healthy
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub duration_ms: u64,
}

/// Tracker statistics for health reporting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceStats {
    pub tracked_players: usize,
    pub active_players: usize,
    pub inactive_players: usize,
    pub temporary_players: usize,
    /// When the poll loop last finished a tick
    pub last_tick: Option<DateTime<Utc>>,
    pub uptime_info: String,
}

impl HealthCheck {
    /// Perform a full health check of the service
    pub async fn check(handle: ServiceHandle) -> Result<Self> {
        let mut checks = Vec::new();
        let mut overall_status = HealthStatus::Healthy;

        let service_check = Self::check_service_running(&handle).await;
        if service_check.status != HealthStatus::Healthy {
            overall_status = HealthStatus::Unhealthy;
        }
        checks.push(service_check);

        for check in [Self::check_engine(&handle), Self::check_poll_loop(&handle).await] {
            overall_status = Self::combine(overall_status, &check.status);
            checks.push(check);
        }

        let stats = Self::gather_service_stats(&handle).await;

        Ok(HealthCheck {
            status: overall_status,
            service: handle.service_name().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
            checks,
            stats,
        })
    }

    /// Simple liveness check - just verify service is running
    pub async fn liveness_check(handle: ServiceHandle) -> Result<HealthStatus> {
        if handle.is_running().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    /// Readiness check - the poll loop is running and the engine answers
    pub async fn readiness_check(handle: ServiceHandle) -> Result<HealthStatus> {
        if !handle.is_running().await {
            return Ok(HealthStatus::Unhealthy);
        }

        let engine = Self::check_engine(&handle).status;
        let poll_loop = Self::check_poll_loop(&handle).await.status;
        Ok(Self::combine(engine, &poll_loop))
    }

    fn combine(current: HealthStatus, next: &HealthStatus) -> HealthStatus {
        match (current, next) {
            (HealthStatus::Unhealthy, _) | (_, HealthStatus::Unhealthy) => HealthStatus::Unhealthy,
            (HealthStatus::Degraded, _) | (_, HealthStatus::Degraded) => HealthStatus::Degraded,
            _ => HealthStatus::Healthy,
        }
    }

    async fn check_service_running(handle: &ServiceHandle) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = if handle.is_running().await {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// The engine lock is only held briefly per apply, so a busy lock is
    /// reported as degraded rather than failed
    fn check_engine(handle: &ServiceHandle) -> ComponentCheck {
        let start = std::time::Instant::now();
        let engine = handle.scheduler().engine();

        let (status, message) = match engine.try_read() {
            Ok(engine) => {
                let roster = engine.roster();
                if roster.len() >= roster.max_players() {
                    (
                        HealthStatus::Degraded,
                        Some(format!("Roster is full ({} players)", roster.max_players())),
                    )
                } else {
                    (HealthStatus::Healthy, None)
                }
            }
            Err(_) => (
                HealthStatus::Degraded,
                Some("Engine is busy applying results".to_string()),
            ),
        };

        ComponentCheck {
            name: "engine".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    async fn check_poll_loop(handle: &ServiceHandle) -> ComponentCheck {
        let start = std::time::Instant::now();
        let stale_after = handle.scheduler().settings().base_interval * 6;

        let (status, message) = match handle.last_tick().await {
            Some(at) => {
                let age = (Utc::now() - at).to_std().unwrap_or_default();
                if age > stale_after {
                    (
                        HealthStatus::Degraded,
                        Some(format!("Last tick finished {}s ago", age.as_secs())),
                    )
                } else {
                    (HealthStatus::Healthy, None)
                }
            }
            None => (
                HealthStatus::Degraded,
                Some("No tick has completed yet".to_string()),
            ),
        };

        ComponentCheck {
            name: "poll_loop".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    async fn gather_service_stats(handle: &ServiceHandle) -> ServiceStats {
        let uptime_info = format!("Up {}s", handle.uptime().as_secs());
        let last_tick = handle.last_tick().await;
        let engine = handle.scheduler().engine();

        let stats = match engine.try_read() {
            Ok(engine) => {
                let (active, inactive) = engine.bucket_counts(Utc::now());
                ServiceStats {
                    tracked_players: engine.roster().len(),
                    active_players: active,
                    inactive_players: inactive,
                    temporary_players: engine.roster().temporary_count(),
                    last_tick,
                    uptime_info,
                }
            }
            Err(_) => {
                debug!("Engine busy while gathering health stats");
                ServiceStats {
                    last_tick,
                    uptime_info,
                    ..Default::default()
                }
            }
        };
        stats
    }
}

/// Convert health check to JSON string
impl HealthCheck {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}
