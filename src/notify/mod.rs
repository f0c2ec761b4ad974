//! Outbound notifications
//!
//! The engine produces plain records; a [`NotificationSink`] decides how they
//! reach people. Rendering and delivery are out of this crate's hands.

pub mod countdown;
pub mod records;
pub mod sink;

pub use countdown::{run_countdown, CountdownOutcome};
pub use records::{
    CountdownUpdate, GameNotification, MilestoneNotification, NotificationEnvelope,
    TrackingExpired,
};
pub use sink::{ChannelNotificationSink, LoggingNotificationSink, Notification, NotificationSink};
