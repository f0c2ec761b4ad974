//! Countdown presentation model for a forecast
//!
//! Pure value type: the caller owns the timer and calls [`QueueCountdown::tick`]
//! every [`COUNTDOWN_STEP_SECONDS`].

use std::time::Duration;

/// Seconds removed from the countdown on every tick
pub const COUNTDOWN_STEP_SECONDS: u64 = 14;

/// Extra time a countdown may live past its initial ETA
pub const COUNTDOWN_GRACE_SECONDS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownTick {
    Remaining(u64),
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueCountdown {
    initial_seconds: u64,
    remaining_seconds: i64,
    expired: bool,
}

impl QueueCountdown {
    pub fn new(initial_seconds: u64) -> Self {
        Self {
            initial_seconds,
            remaining_seconds: initial_seconds as i64,
            expired: false,
        }
    }

    pub fn initial_seconds(&self) -> u64 {
        self.initial_seconds
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }

    /// Advance by one step
    pub fn tick(&mut self) -> CountdownTick {
        if self.expired {
            return CountdownTick::Expired;
        }

        self.remaining_seconds -= COUNTDOWN_STEP_SECONDS as i64;
        if self.remaining_seconds <= 0 {
            self.expired = true;
            CountdownTick::Expired
        } else {
            CountdownTick::Remaining(self.remaining_seconds as u64)
        }
    }

    /// Hard upper bound on how long a presenter may keep this countdown alive
    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.initial_seconds + COUNTDOWN_GRACE_SECONDS)
    }

    pub fn step(&self) -> Duration {
        Duration::from_secs(COUNTDOWN_STEP_SECONDS)
    }
}
