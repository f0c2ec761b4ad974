//! Queue-time forecasting
//!
//! Predicts when a player's next match in a family will start from the
//! spacing of their recent matches, and models the ticking countdown that
//! presents a prediction.

pub mod countdown;
pub mod forecaster;
pub mod window;

pub use countdown::{CountdownTick, QueueCountdown, COUNTDOWN_STEP_SECONDS};
pub use forecaster::{ForecastSettings, QueueForecaster};
pub use window::BoundedWindow;
