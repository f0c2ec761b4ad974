//! Main application configuration
//!
//! Defaults can be overridden by a TOML file or by environment variables;
//! command line flags are applied on top by the binary.

use crate::classifier::VariantTable;
use crate::engine::EngineSettings;
use crate::forecast::ForecastSettings;
use crate::provider::HiveProviderConfig;
use crate::scheduler::{ActivitySettings, LimiterConfig, SchedulerSettings};
use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub provider: ProviderSettings,
    pub polling: PollingSettings,
    pub roster: RosterSettings,
    pub storage: StorageSettings,
    pub classifier: ClassifierSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for health check endpoint
    pub health_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Stats provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub base_url: String,
    pub user_agent: String,
    pub request_timeout_seconds: u64,
}

/// Scheduler and limiter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    /// Time between scheduler ticks
    pub base_interval_ms: u64,
    /// A player stays active this long after their last detected match
    pub active_window_seconds: u64,
    /// Inactive players are fetched at most this often
    pub inactive_poll_interval_seconds: u64,
    pub max_active_pacing_ms: u64,
    pub inactive_pacing_ms: u64,
    pub max_concurrent_fetches: usize,
    pub requests_per_minute: u32,
    pub limiter_window_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterSettings {
    pub max_tracked_players: usize,
    pub temp_cleanup_interval_seconds: u64,
    /// IANA zone whose midnight resets the daily counters
    pub timezone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub data_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    /// Family whose games get a variant estimate
    pub family: String,
    pub history_capacity: usize,
    /// Samples needed before history adjusts a result
    pub min_history: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "hive-tracker".to_string(),
            log_level: "info".to_string(),
            health_port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        let provider = HiveProviderConfig::default();
        Self {
            base_url: provider.base_url,
            user_agent: provider.user_agent,
            request_timeout_seconds: provider.request_timeout.as_secs(),
        }
    }
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            base_interval_ms: 5000,
            active_window_seconds: 1800,   // 30 minutes
            inactive_poll_interval_seconds: 120,
            max_active_pacing_ms: 1000,
            inactive_pacing_ms: 500,
            max_concurrent_fetches: 10,
            requests_per_minute: 120,
            limiter_window_seconds: 60,
        }
    }
}

impl Default for RosterSettings {
    fn default() -> Self {
        Self {
            max_tracked_players: 75,
            temp_cleanup_interval_seconds: 300, // 5 minutes
            timezone: "Europe/Berlin".to_string(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from("bot_data.json"),
        }
    }
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            family: "bed".to_string(),
            history_capacity: 10,
            min_history: 3,
        }
    }
}

/// Parse an environment variable into `target` when it is set
fn env_override<T: FromStr>(name: &str, target: &mut T) -> Result<()> {
    if let Ok(value) = env::var(name) {
        *target = value
            .parse()
            .map_err(|_| anyhow!("Invalid {} value: {}", name, value))?;
    }
    Ok(())
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Service settings
        env_override("SERVICE_NAME", &mut config.service.name)?;
        env_override("LOG_LEVEL", &mut config.service.log_level)?;
        env_override("HEALTH_PORT", &mut config.service.health_port)?;
        env_override(
            "SHUTDOWN_TIMEOUT_SECONDS",
            &mut config.service.shutdown_timeout_seconds,
        )?;

        // Provider settings
        env_override("HIVE_API_BASE_URL", &mut config.provider.base_url)?;
        env_override("HIVE_USER_AGENT", &mut config.provider.user_agent)?;
        env_override(
            "HIVE_REQUEST_TIMEOUT_SECONDS",
            &mut config.provider.request_timeout_seconds,
        )?;

        // Polling settings
        env_override("POLL_INTERVAL_MS", &mut config.polling.base_interval_ms)?;
        env_override(
            "ACTIVE_WINDOW_SECONDS",
            &mut config.polling.active_window_seconds,
        )?;
        env_override(
            "INACTIVE_POLL_INTERVAL_SECONDS",
            &mut config.polling.inactive_poll_interval_seconds,
        )?;
        env_override("MAX_ACTIVE_PACING_MS", &mut config.polling.max_active_pacing_ms)?;
        env_override("INACTIVE_PACING_MS", &mut config.polling.inactive_pacing_ms)?;
        env_override(
            "MAX_CONCURRENT_FETCHES",
            &mut config.polling.max_concurrent_fetches,
        )?;
        env_override("REQUESTS_PER_MINUTE", &mut config.polling.requests_per_minute)?;
        env_override(
            "LIMITER_WINDOW_SECONDS",
            &mut config.polling.limiter_window_seconds,
        )?;

        // Roster settings
        env_override("MAX_TRACKED_PLAYERS", &mut config.roster.max_tracked_players)?;
        env_override(
            "TEMP_CLEANUP_INTERVAL_SECONDS",
            &mut config.roster.temp_cleanup_interval_seconds,
        )?;
        env_override("DAILY_STATS_TIMEZONE", &mut config.roster.timezone)?;

        // Storage and classifier settings
        env_override("DATA_FILE", &mut config.storage.data_file)?;
        env_override("CLASSIFIER_FAMILY", &mut config.classifier.family)?;
        env_override(
            "VARIANT_HISTORY_CAPACITY",
            &mut config.classifier.history_capacity,
        )?;
        env_override("VARIANT_MIN_HISTORY", &mut config.classifier.min_history)?;

        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file; missing keys keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get the poll interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.polling.base_interval_ms)
    }

    /// Get the temporary-player cleanup interval as Duration
    pub fn temp_cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.roster.temp_cleanup_interval_seconds)
    }

    /// Parsed daily-stats timezone
    pub fn timezone(&self) -> Result<Tz> {
        Tz::from_str(&self.roster.timezone)
            .map_err(|_| anyhow!("Invalid timezone: {}", self.roster.timezone))
    }

    pub fn provider_config(&self) -> HiveProviderConfig {
        HiveProviderConfig {
            base_url: self.provider.base_url.clone(),
            user_agent: self.provider.user_agent.clone(),
            request_timeout: Duration::from_secs(self.provider.request_timeout_seconds),
        }
    }

    pub fn limiter_config(&self) -> LimiterConfig {
        LimiterConfig {
            max_concurrent: self.polling.max_concurrent_fetches,
            reservoir: self.polling.requests_per_minute,
            refill_interval: Duration::from_secs(self.polling.limiter_window_seconds),
        }
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            base_interval: self.poll_interval(),
            max_active_pacing: Duration::from_millis(self.polling.max_active_pacing_ms),
            inactive_pacing: Duration::from_millis(self.polling.inactive_pacing_ms),
            ..Default::default()
        }
    }

    pub fn engine_settings(&self) -> Result<EngineSettings> {
        let variant_table = VariantTable {
            family: self.classifier.family.clone(),
            history_capacity: self.classifier.history_capacity,
            min_history: self.classifier.min_history,
            ..Default::default()
        };

        Ok(EngineSettings {
            max_players: self.roster.max_tracked_players,
            forecast: ForecastSettings::default(),
            activity: ActivitySettings {
                active_window: chrono::Duration::seconds(self.polling.active_window_seconds as i64),
                inactive_interval: chrono::Duration::seconds(
                    self.polling.inactive_poll_interval_seconds as i64,
                ),
            },
            timezone: self.timezone()?,
            variant_table: Arc::new(variant_table),
        })
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.health_port == 0 {
        return Err(anyhow!("Health port cannot be 0"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    // Provider
    if config.provider.base_url.is_empty() {
        return Err(anyhow!("Provider base URL cannot be empty"));
    }
    if config.provider.request_timeout_seconds == 0 {
        return Err(anyhow!("Provider request timeout must be greater than 0"));
    }

    // Polling
    if config.polling.base_interval_ms == 0 {
        return Err(anyhow!("Poll interval must be greater than 0"));
    }
    if config.polling.active_window_seconds == 0 {
        return Err(anyhow!("Active window must be greater than 0"));
    }
    if config.polling.max_concurrent_fetches == 0 {
        return Err(anyhow!("Max concurrent fetches must be greater than 0"));
    }
    if config.polling.requests_per_minute == 0 {
        return Err(anyhow!("Requests per minute must be greater than 0"));
    }
    if config.polling.limiter_window_seconds == 0 {
        return Err(anyhow!("Limiter window must be greater than 0"));
    }

    // Roster
    if config.roster.max_tracked_players == 0 {
        return Err(anyhow!("Max tracked players must be greater than 0"));
    }
    if config.roster.temp_cleanup_interval_seconds == 0 {
        return Err(anyhow!("Temporary cleanup interval must be greater than 0"));
    }
    config.timezone()?;

    // Storage and classifier
    if config.storage.data_file.as_os_str().is_empty() {
        return Err(anyhow!("Data file path cannot be empty"));
    }
    if config.classifier.family.is_empty() {
        return Err(anyhow!("Classifier family cannot be empty"));
    }
    if config.classifier.history_capacity == 0 {
        return Err(anyhow!("Variant history capacity must be greater than 0"));
    }
    if config.classifier.min_history > config.classifier.history_capacity {
        return Err(anyhow!(
            "Variant min history ({}) exceeds history capacity ({})",
            config.classifier.min_history,
            config.classifier.history_capacity
        ));
    }

    Ok(())
}
