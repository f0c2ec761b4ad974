//! Driver for a queue countdown presenter
//!
//! The forecaster only produces an ETA. This task owns the timer: it ticks a
//! [`QueueCountdown`] every step, hands each value to a render callback and
//! gives up once the countdown's lifetime bound has passed.

use crate::error::Result;
use crate::forecast::{CountdownTick, QueueCountdown};
use std::future::Future;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownOutcome {
    /// Counted down to zero and rendered the expiry
    Expired,
    /// The render callback failed and the countdown was dropped
    RenderFailed,
    /// The lifetime bound passed first
    TimedOut,
}

/// Run a countdown to completion
pub async fn run_countdown<F, Fut>(mut countdown: QueueCountdown, mut render: F) -> CountdownOutcome
where
    F: FnMut(CountdownTick) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let lifetime = countdown.max_lifetime();
    let step = countdown.step();
    debug!("Starting countdown from {}s", countdown.initial_seconds());

    let ticking = async {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + step, step);
        loop {
            interval.tick().await;
            let tick = countdown.tick();
            if let Err(e) = render(tick).await {
                warn!("Countdown render failed, stopping: {}", e);
                return CountdownOutcome::RenderFailed;
            }
            if tick == CountdownTick::Expired {
                return CountdownOutcome::Expired;
            }
        }
    };

    match tokio::time::timeout(lifetime, ticking).await {
        Ok(outcome) => outcome,
        Err(_) => CountdownOutcome::TimedOut,
    }
}
