//! Error types for the rating ledger
//!
//! Storage, configuration and metrics code use anyhow for consistent error
//! handling; ledger operations surface the typed [`LedgerError`] so callers
//! can tell a bad request from a failed write.

use crate::types::{MatchId, PlayerId};

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Result type returned by ledger operations
pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// Failures reported by the rating ledger
///
/// Every failed operation leaves the durable state exactly as it was before
/// the call. None of these are retried internally.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Unknown player: {player_id}")]
    UnknownPlayer { player_id: PlayerId },

    #[error("Unknown match: {match_id}")]
    UnknownMatch { match_id: MatchId },

    #[error("A match needs two distinct players, got {player_id} on both sides")]
    SamePlayer { player_id: PlayerId },

    #[error("Persistence failure: {message}")]
    PersistenceFailure { message: String },

    #[error("Rating or result counters of player {player_id} out of range")]
    StatOverflow { player_id: PlayerId },
}

impl LedgerError {
    /// Short label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::UnknownPlayer { .. } => "unknown_player",
            LedgerError::UnknownMatch { .. } => "unknown_match",
            LedgerError::SamePlayer { .. } => "same_player",
            LedgerError::PersistenceFailure { .. } => "persistence_failure",
            LedgerError::StatOverflow { .. } => "stat_overflow",
        }
    }
}

impl From<anyhow::Error> for LedgerError {
    fn from(err: anyhow::Error) -> Self {
        LedgerError::PersistenceFailure {
            message: format!("{:#}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_storage_errors_become_persistence_failures() {
        let err: LedgerError = anyhow::anyhow!("disk full")
            .context("saving player")
            .into();

        match err {
            LedgerError::PersistenceFailure { message } => {
                assert_eq!(message, "saving player: disk full");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_error_messages_name_the_missing_id() {
        let player_id = Uuid::new_v4();
        let err = LedgerError::UnknownPlayer { player_id };
        assert!(err.to_string().contains(&player_id.to_string()));
        assert_eq!(err.kind(), "unknown_player");

        let err = LedgerError::UnknownMatch { match_id: 42 };
        assert_eq!(err.to_string(), "Unknown match: 42");
    }
}
