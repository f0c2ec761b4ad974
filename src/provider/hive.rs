//! HTTP client for the public Hive stats API

use crate::error::FetchError;
use crate::provider::{extract_player_stats, PlayerStats, StatsProvider};
use async_trait::async_trait;
use reqwest::{header::RETRY_AFTER, Client, StatusCode};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const HIVE_API_BASE: &str = "https://api.playhive.com/v0";

/// Remaining provider budget below which a warning is logged
const RATE_LIMIT_WARNING_THRESHOLD: u64 = 10;

#[derive(Debug, Clone)]
pub struct HiveProviderConfig {
    pub base_url: String,
    pub user_agent: String,
    pub request_timeout: Duration,
}

impl Default for HiveProviderConfig {
    fn default() -> Self {
        Self {
            base_url: HIVE_API_BASE.to_string(),
            user_agent: "PersonalTracker".to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

pub struct HiveStatsProvider {
    client: Client,
    config: HiveProviderConfig,
}

impl HiveStatsProvider {
    pub fn new(config: HiveProviderConfig) -> crate::error::Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| crate::error::TrackerError::ConfigurationError {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self { client, config })
    }

    fn player_url(&self, player_name: &str) -> String {
        format!(
            "{}/game/all/all/{}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(player_name)
        )
    }
}

fn header_u64(response: &reqwest::Response, name: &str) -> Option<u64> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

#[async_trait]
impl StatsProvider for HiveStatsProvider {
    async fn fetch(&self, player_name: &str) -> Result<PlayerStats, FetchError> {
        let url = self.player_url(player_name);
        let started = Instant::now();

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::transient(format!("request failed: {}", e)))?;

        let status = response.status();
        debug!("GET {} -> {} in {:?}", url, status, started.elapsed());

        if let Some(remaining) = header_u64(&response, "x-ratelimit-remaining") {
            if remaining < RATE_LIMIT_WARNING_THRESHOLD {
                let limit = header_u64(&response, "x-ratelimit-limit").unwrap_or(120);
                warn!("Provider rate limit low: {}/{} requests remaining", remaining, limit);
            }
        }

        match status {
            StatusCode::NOT_FOUND => return Err(FetchError::NotFound),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = header_u64(&response, RETRY_AFTER.as_str()).unwrap_or(60);
                warn!("Provider rate limited, retry after {}s", retry_after);
                return Err(FetchError::Transient {
                    message: "rate limited".to_string(),
                    retry_after: Some(Duration::from_secs(retry_after)),
                });
            }
            s if !s.is_success() => {
                return Err(FetchError::transient(format!("provider returned {}", s)));
            }
            _ => {}
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| FetchError::transient(format!("invalid response body: {}", e)))?;

        extract_player_stats(player_name, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_url_is_encoded() {
        let provider = HiveStatsProvider::new(HiveProviderConfig {
            base_url: "https://example.invalid/v0/".to_string(),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(
            provider.player_url("Steve MC"),
            "https://example.invalid/v0/game/all/all/Steve%20MC"
        );
    }
}
