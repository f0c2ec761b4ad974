//! Error types for the tracker
//!
//! Domain failures are modelled with thiserror and carried through the
//! crate as anyhow errors, so callers can downcast when they need to
//! branch on a specific failure.

use std::time::Duration;

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific tracker scenarios
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("Player not found: {player_id}")]
    PlayerNotFound { player_id: String },

    #[error("Transient fetch failure for {player_id}: {message}")]
    TransientFetch { player_id: String, message: String },

    #[error("Malformed persisted state for {key}: {reason}")]
    MalformedState { key: String, reason: String },

    #[error("Player is not tracked: {player_id}")]
    PlayerNotTracked { player_id: String },

    #[error("Player is already tracked: {player_id}")]
    PlayerAlreadyTracked { player_id: String },

    #[error("Roster is full ({limit} players)")]
    RosterFull { limit: usize },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Storage error: {message}")]
    StorageError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

/// Outcome of a failed fetch against the stats provider
///
/// `NotFound` is a normal outcome for names the provider does not know;
/// everything else is transient and the player is retried on its next
/// scheduled turn.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    #[error("player not found")]
    NotFound,

    #[error("transient provider failure: {message}")]
    Transient {
        message: String,
        retry_after: Option<Duration>,
    },
}

impl FetchError {
    pub fn transient(message: impl Into<String>) -> Self {
        FetchError::Transient {
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound)
    }

    /// Convert into the crate-level error for a given player
    pub fn into_tracker_error(self, player_id: &str) -> TrackerError {
        match self {
            FetchError::NotFound => TrackerError::PlayerNotFound {
                player_id: player_id.to_string(),
            },
            FetchError::Transient { message, .. } => TrackerError::TransientFetch {
                player_id: player_id.to_string(),
                message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_conversion() {
        let err = FetchError::NotFound.into_tracker_error("steve");
        assert!(matches!(err, TrackerError::PlayerNotFound { ref player_id } if player_id == "steve"));

        let err = FetchError::transient("timeout").into_tracker_error("alex");
        assert_eq!(
            err.to_string(),
            "Transient fetch failure for alex: timeout"
        );
    }

    #[test]
    fn test_tracker_error_downcast() {
        let err: anyhow::Error = TrackerError::RosterFull { limit: 75 }.into();
        assert!(matches!(
            err.downcast_ref::<TrackerError>(),
            Some(TrackerError::RosterFull { limit: 75 })
        ));
    }
}
