//! Notification sinks

use crate::error::{Result, TrackerError};
use crate::notify::records::{
    CountdownUpdate, GameNotification, MilestoneNotification, NotificationEnvelope, TrackingExpired,
};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

/// Trait for delivering notification records
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver one game result
    async fn publish_game(&self, record: GameNotification) -> Result<()>;

    /// Deliver a winstreak milestone
    async fn publish_milestone(&self, record: MilestoneNotification) -> Result<()>;

    /// Deliver a temporary-tracking expiry
    async fn publish_expired(&self, record: TrackingExpired) -> Result<()>;

    /// Render one countdown step; an error stops that countdown
    async fn publish_countdown(&self, _update: CountdownUpdate) -> Result<()> {
        Ok(())
    }
}

/// Sink that writes every record to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotificationSink;

#[async_trait]
impl NotificationSink for LoggingNotificationSink {
    async fn publish_game(&self, record: GameNotification) -> Result<()> {
        info!(
            player = %record.display_name,
            family = %record.family,
            streak = record.streak,
            eta = ?record.queue_eta_seconds,
            "{} {} ({} winstreak: {})",
            record.display_name,
            record.result_label(),
            record.family_display,
            record.streak
        );
        if let Some(summary) = &record.variant_summary {
            debug!("Variant estimate for {}: {}", record.display_name, summary);
        }
        if let Some(kd) = &record.daily_kd {
            debug!("Daily K/D for {} in {}: {}", record.display_name, record.family_display, kd);
        }
        Ok(())
    }

    async fn publish_milestone(&self, record: MilestoneNotification) -> Result<()> {
        info!(
            "🔥 {} reached a {} winstreak in {}",
            record.display_name, record.streak, record.family_display
        );
        Ok(())
    }

    async fn publish_expired(&self, record: TrackingExpired) -> Result<()> {
        info!(
            "Temporary tracking expired for {} ({} grant)",
            record.display_name,
            record.duration.label()
        );
        Ok(())
    }

    async fn publish_countdown(&self, update: CountdownUpdate) -> Result<()> {
        match update.remaining_seconds {
            Some(seconds) => debug!("{} next {} game in ~{}s", update.display_name, update.family, seconds),
            None => debug!("{} should be in a {} game now", update.display_name, update.family),
        }
        Ok(())
    }
}

/// Any record a sink can carry
#[derive(Debug, Clone)]
pub enum Notification {
    Game(NotificationEnvelope<GameNotification>),
    Milestone(NotificationEnvelope<MilestoneNotification>),
    Expired(NotificationEnvelope<TrackingExpired>),
    Countdown(NotificationEnvelope<CountdownUpdate>),
}

/// Sink that forwards enveloped records to a channel consumer
#[derive(Debug, Clone)]
pub struct ChannelNotificationSink {
    sender: mpsc::Sender<Notification>,
}

impl ChannelNotificationSink {
    /// Create a sink and the stream its records arrive on
    pub fn new(buffer: usize) -> (Self, ReceiverStream<Notification>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        (Self { sender }, ReceiverStream::new(receiver))
    }

    async fn send(&self, notification: Notification) -> Result<()> {
        self.sender.send(notification).await.map_err(|_| {
            TrackerError::InternalError {
                message: "Notification consumer has gone away".to_string(),
            }
            .into()
        })
    }
}

#[async_trait]
impl NotificationSink for ChannelNotificationSink {
    async fn publish_game(&self, record: GameNotification) -> Result<()> {
        self.send(Notification::Game(NotificationEnvelope::new(record, "game"))).await
    }

    async fn publish_milestone(&self, record: MilestoneNotification) -> Result<()> {
        self.send(Notification::Milestone(NotificationEnvelope::new(record, "milestone")))
            .await
    }

    async fn publish_expired(&self, record: TrackingExpired) -> Result<()> {
        self.send(Notification::Expired(NotificationEnvelope::new(record, "tracking_expired")))
            .await
    }

    async fn publish_countdown(&self, update: CountdownUpdate) -> Result<()> {
        self.send(Notification::Countdown(NotificationEnvelope::new(update, "countdown")))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::current_timestamp;
    use tokio_stream::StreamExt;

    fn milestone(streak: u32) -> MilestoneNotification {
        MilestoneNotification {
            player_id: "steve".to_string(),
            display_name: "Steve".to_string(),
            family: "bed".to_string(),
            family_display: "BedWars".to_string(),
            streak,
            occurred_at: current_timestamp(),
        }
    }

    #[tokio::test]
    async fn test_channel_sink_delivers_in_order() {
        let (sink, mut stream) = ChannelNotificationSink::new(8);
        sink.publish_milestone(milestone(50)).await.unwrap();
        sink.publish_milestone(milestone(100)).await.unwrap();
        drop(sink);

        let mut streaks = Vec::new();
        while let Some(notification) = stream.next().await {
            match notification {
                Notification::Milestone(envelope) => {
                    assert_eq!(envelope.kind, "milestone");
                    streaks.push(envelope.payload.streak);
                }
                other => panic!("unexpected notification: {:?}", other),
            }
        }
        assert_eq!(streaks, vec![50, 100]);
    }

    #[tokio::test]
    async fn test_channel_sink_errors_without_consumer() {
        let (sink, stream) = ChannelNotificationSink::new(1);
        drop(stream);
        assert!(sink.publish_milestone(milestone(50)).await.is_err());
    }

    #[test]
    fn test_logging_sink_accepts_records() {
        let sink = LoggingNotificationSink;
        tokio_test::block_on(sink.publish_milestone(milestone(50))).unwrap();
        tokio_test::block_on(sink.publish_countdown(CountdownUpdate {
            player_id: "steve".to_string(),
            display_name: "Steve".to_string(),
            family: "bed".to_string(),
            remaining_seconds: None,
        }))
        .unwrap();
    }
}
