//! Outbound request limiting
//!
//! Every provider fetch acquires a [`FetchPermit`] first. The token-bucket
//! limiter combines a concurrency ceiling with a request budget that is
//! refilled at the start of each window.

use crate::error::{Result, TrackerError};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::trace;

/// Held for the duration of one fetch
#[derive(Debug)]
pub struct FetchPermit {
    _concurrency: Option<OwnedSemaphorePermit>,
    pub waited: Duration,
}

impl FetchPermit {
    pub fn unlimited() -> Self {
        Self {
            _concurrency: None,
            waited: Duration::ZERO,
        }
    }
}

#[async_trait]
pub trait FetchLimiter: Send + Sync {
    /// Wait until a fetch may start
    async fn acquire(&self) -> Result<FetchPermit>;
}

#[derive(Debug, Clone)]
pub struct LimiterConfig {
    pub max_concurrent: usize,
    pub reservoir: u32,
    pub refill_interval: Duration,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            reservoir: 120,
            refill_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
struct Reservoir {
    remaining: u32,
    window_started: Instant,
}

impl Reservoir {
    fn refill(&mut self, config: &LimiterConfig) {
        let now = Instant::now();
        if now.duration_since(self.window_started) >= config.refill_interval {
            self.remaining = config.reservoir;
            self.window_started = now;
        }
    }

    fn try_acquire(&mut self, config: &LimiterConfig) -> bool {
        self.refill(config);
        if self.remaining > 0 {
            self.remaining -= 1;
            true
        } else {
            false
        }
    }

    fn time_until_refill(&self, config: &LimiterConfig) -> Duration {
        (self.window_started + config.refill_interval).saturating_duration_since(Instant::now())
    }
}

/// Concurrency ceiling plus a per-window request budget
#[derive(Debug)]
pub struct TokenBucketLimiter {
    config: LimiterConfig,
    concurrency: Arc<Semaphore>,
    reservoir: Mutex<Reservoir>,
}

impl TokenBucketLimiter {
    pub fn new(config: LimiterConfig) -> Self {
        let concurrency = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        let reservoir = Mutex::new(Reservoir {
            remaining: config.reservoir,
            window_started: Instant::now(),
        });
        Self {
            config,
            concurrency,
            reservoir,
        }
    }

    pub fn config(&self) -> &LimiterConfig {
        &self.config
    }

    /// Requests left in the current window
    pub async fn remaining(&self) -> u32 {
        let mut reservoir = self.reservoir.lock().await;
        reservoir.refill(&self.config);
        reservoir.remaining
    }
}

impl Default for TokenBucketLimiter {
    fn default() -> Self {
        Self::new(LimiterConfig::default())
    }
}

#[async_trait]
impl FetchLimiter for TokenBucketLimiter {
    async fn acquire(&self) -> Result<FetchPermit> {
        let started = Instant::now();

        let permit = self
            .concurrency
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| TrackerError::InternalError {
                message: "Fetch limiter closed".to_string(),
            })?;

        loop {
            let wait = {
                let mut reservoir = self.reservoir.lock().await;
                if reservoir.try_acquire(&self.config) {
                    return Ok(FetchPermit {
                        _concurrency: Some(permit),
                        waited: started.elapsed(),
                    });
                }
                reservoir.time_until_refill(&self.config)
            };

            trace!(wait = ?wait, "request budget exhausted");
            tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
        }
    }
}

/// Limiter that never waits
#[derive(Debug, Default, Clone, Copy)]
pub struct UnlimitedLimiter;

#[async_trait]
impl FetchLimiter for UnlimitedLimiter {
    async fn acquire(&self) -> Result<FetchPermit> {
        Ok(FetchPermit::unlimited())
    }
}
