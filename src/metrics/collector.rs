//! Metrics collection using Prometheus
//!
//! Metrics are grouped by concern. Each group registers its own metrics in
//! the shared registry.

use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the tracker
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Polling metrics
    poll_metrics: PollMetrics,

    /// Match event metrics
    event_metrics: EventMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,

    /// State saves by outcome
    pub state_saves_total: IntCounterVec,
}

/// Scheduler and provider metrics
#[derive(Clone)]
pub struct PollMetrics {
    /// Completed scheduler ticks
    pub ticks_total: IntCounter,

    /// Fetches by bucket and outcome
    pub fetches_total: IntCounterVec,

    /// Time from limiter acquire to fetch result
    pub fetch_duration_seconds: Histogram,

    /// Time spent waiting on the fetch limiter
    pub limiter_wait_seconds: Histogram,

    /// Players in the active bucket
    pub active_players: IntGauge,

    /// Players in the inactive bucket
    pub inactive_players: IntGauge,

    /// Players on the roster
    pub tracked_players: IntGauge,
}

/// Inferred match metrics
#[derive(Clone)]
pub struct EventMetrics {
    /// Match events by family and result
    pub match_events_total: IntCounterVec,

    /// Milestone alerts by family
    pub milestone_alerts_total: IntCounterVec,

    /// Forecast attempts by outcome
    pub forecasts_total: IntCounterVec,

    /// Temporary players expired
    pub tracking_expired_total: IntCounter,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let poll_metrics = PollMetrics::new(&registry)?;
        let event_metrics = EventMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            poll_metrics,
            event_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn poll(&self) -> &PollMetrics {
        &self.poll_metrics
    }

    pub fn events(&self) -> &EventMetrics {
        &self.event_metrics
    }

    /// Record one finished scheduler tick
    pub fn record_tick(&self) {
        self.poll_metrics.ticks_total.inc();
    }

    /// Record a single fetch
    pub fn record_fetch(&self, bucket: &str, outcome: &str, duration: Duration, waited: Duration) {
        self.poll_metrics
            .fetches_total
            .with_label_values(&[bucket, outcome])
            .inc();
        self.poll_metrics
            .fetch_duration_seconds
            .observe(duration.as_secs_f64());
        self.poll_metrics
            .limiter_wait_seconds
            .observe(waited.as_secs_f64());
    }

    /// Update the roster gauges
    pub fn update_players(&self, active: usize, inactive: usize) {
        self.poll_metrics.active_players.set(active as i64);
        self.poll_metrics.inactive_players.set(inactive as i64);
        self.poll_metrics
            .tracked_players
            .set((active + inactive) as i64);
    }

    /// Record one inferred game
    pub fn record_match_event(&self, family: &str, is_win: bool, forecast: bool) {
        let result = if is_win { "win" } else { "loss" };
        self.event_metrics
            .match_events_total
            .with_label_values(&[family, result])
            .inc();

        let outcome = if forecast { "predicted" } else { "none" };
        self.event_metrics
            .forecasts_total
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn record_milestone(&self, family: &str) {
        self.event_metrics
            .milestone_alerts_total
            .with_label_values(&[family])
            .inc();
    }

    pub fn record_tracking_expired(&self, count: usize) {
        self.event_metrics
            .tracking_expired_total
            .inc_by(count as u64);
    }

    pub fn record_state_save(&self, success: bool) {
        let status = if success { "success" } else { "error" };
        self.service_metrics
            .state_saves_total
            .with_label_values(&[status])
            .inc();
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    pub fn update_uptime(&self, uptime: Duration) {
        self.service_metrics
            .uptime_seconds
            .set(uptime.as_secs() as i64);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("hive_tracker_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "hive_tracker_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("hive_tracker_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        let state_saves_total = IntCounterVec::new(
            Opts::new("hive_tracker_state_saves_total", "State saves by outcome"),
            &["status"],
        )?;
        registry.register(Box::new(state_saves_total.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            component_health,
            state_saves_total,
        })
    }
}

impl PollMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let ticks_total = IntCounter::new("hive_tracker_ticks_total", "Completed scheduler ticks")?;
        registry.register(Box::new(ticks_total.clone()))?;

        let fetches_total = IntCounterVec::new(
            Opts::new("hive_tracker_fetches_total", "Provider fetches"),
            &["bucket", "outcome"],
        )?;
        registry.register(Box::new(fetches_total.clone()))?;

        let fetch_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "hive_tracker_fetch_duration_seconds",
                "Provider fetch duration",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        )?;
        registry.register(Box::new(fetch_duration_seconds.clone()))?;

        let limiter_wait_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "hive_tracker_limiter_wait_seconds",
                "Time spent waiting for fetch capacity",
            )
            .buckets(vec![0.001, 0.01, 0.1, 1.0, 5.0, 15.0, 30.0, 60.0]),
        )?;
        registry.register(Box::new(limiter_wait_seconds.clone()))?;

        let active_players =
            IntGauge::new("hive_tracker_active_players", "Players in the active bucket")?;
        registry.register(Box::new(active_players.clone()))?;

        let inactive_players = IntGauge::new(
            "hive_tracker_inactive_players",
            "Players in the inactive bucket",
        )?;
        registry.register(Box::new(inactive_players.clone()))?;

        let tracked_players =
            IntGauge::new("hive_tracker_tracked_players", "Players on the roster")?;
        registry.register(Box::new(tracked_players.clone()))?;

        Ok(Self {
            ticks_total,
            fetches_total,
            fetch_duration_seconds,
            limiter_wait_seconds,
            active_players,
            inactive_players,
            tracked_players,
        })
    }
}

impl EventMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let match_events_total = IntCounterVec::new(
            Opts::new("hive_tracker_match_events_total", "Inferred match events"),
            &["family", "result"],
        )?;
        registry.register(Box::new(match_events_total.clone()))?;

        let milestone_alerts_total = IntCounterVec::new(
            Opts::new(
                "hive_tracker_milestone_alerts_total",
                "Winstreak milestone alerts",
            ),
            &["family"],
        )?;
        registry.register(Box::new(milestone_alerts_total.clone()))?;

        let forecasts_total = IntCounterVec::new(
            Opts::new("hive_tracker_forecasts_total", "Queue forecasts by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(forecasts_total.clone()))?;

        let tracking_expired_total = IntCounter::new(
            "hive_tracker_tracking_expired_total",
            "Temporary players removed on expiry",
        )?;
        registry.register(Box::new(tracking_expired_total.clone()))?;

        Ok(Self {
            match_events_total,
            milestone_alerts_total,
            forecasts_total,
            tracking_expired_total,
        })
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create default metrics collector")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collector_creation() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        let _service = collector.service();
        let _poll = collector.poll();
        let _events = collector.events();
    }

    #[test]
    fn test_fetch_recording() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        collector.record_fetch("active", "ok", Duration::from_millis(120), Duration::ZERO);
        collector.record_fetch("inactive", "not_found", Duration::from_millis(80), Duration::ZERO);
        collector.record_tick();

        assert_eq!(
            collector
                .poll()
                .fetches_total
                .with_label_values(&["active", "ok"])
                .get(),
            1
        );
        assert_eq!(collector.poll().ticks_total.get(), 1);
    }

    #[test]
    fn test_event_recording() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        collector.record_match_event("bed", true, true);
        collector.record_match_event("bed", false, false);
        collector.record_milestone("bed");
        collector.update_players(3, 2);

        let events = collector.events();
        assert_eq!(events.match_events_total.with_label_values(&["bed", "win"]).get(), 1);
        assert_eq!(events.forecasts_total.with_label_values(&["none"]).get(), 1);
        assert_eq!(events.milestone_alerts_total.with_label_values(&["bed"]).get(), 1);
        assert_eq!(collector.poll().tracked_players.get(), 5);
    }

    #[test]
    fn test_health_status_updates() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        collector.update_health_status(2);
        collector.update_component_health("scheduler", true);
        collector.update_component_health("state_store", false);
        assert_eq!(collector.service().health_status.get(), 2);
    }

    #[test]
    fn test_metrics_timer() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");
        let timer = collector.start_timer();

        std::thread::sleep(Duration::from_millis(10));
        let duration = timer.elapsed();

        assert!(duration >= Duration::from_millis(10));

        let final_duration = timer.stop();
        assert!(final_duration >= Duration::from_millis(10));
    }
}
