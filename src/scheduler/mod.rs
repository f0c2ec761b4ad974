//! Roster polling
//!
//! Activity bucketing, the outbound fetch limiter and the tick driver that
//! ties the provider to the engine.

pub mod activity;
pub mod limiter;
pub mod scheduler;

pub use activity::{ActivityBucket, ActivitySettings, ActivityTracker, PollPlan};
pub use limiter::{FetchLimiter, FetchPermit, LimiterConfig, TokenBucketLimiter, UnlimitedLimiter};
pub use scheduler::{PollScheduler, SchedulerSettings, TickReport};
