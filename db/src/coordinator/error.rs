//! Coordinator error taxonomy

use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::{InvariantError, SessionId, SessionMode};

/// Typed failures of coordinator operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordinatorError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("Session {0} is already closed")]
    SessionClosed(SessionId),

    #[error("Session {id} is in {actual} mode, not {requested}")]
    SessionModeConflict {
        id: SessionId,
        actual: SessionMode,
        requested: SessionMode,
    },

    #[error("Session {id} edits {session_date}, not {requested}")]
    DateMismatch {
        id: SessionId,
        session_date: NaiveDate,
        requested: NaiveDate,
    },

    #[error("Session {0} has no pending operation")]
    NoPendingOperation(SessionId),

    #[error("Session {0} has no text to revise")]
    NoRevisableContent(SessionId),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Resolver did not answer within {0:?}")]
    ResolverTimeout(std::time::Duration),

    #[error("Journal store did not answer within {0:?}")]
    StorageTimeout(std::time::Duration),

    #[error("Journal store unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Unresolvable input: {0}")]
    UnresolvableInput(String),
}

impl CoordinatorError {
    /// Transient failures a caller may retry as-is
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ResolverTimeout(_) | Self::StorageTimeout(_) | Self::StorageUnavailable(_)
        )
    }

    /// Failures that mean a resolver broke its contract or state went wrong
    pub fn is_contract_breach(&self) -> bool {
        matches!(
            self,
            Self::NoPendingOperation(_) | Self::NoRevisableContent(_) | Self::InvalidOperation(_)
        )
    }
}

impl From<InvariantError> for CoordinatorError {
    fn from(err: InvariantError) -> Self {
        Self::InvalidOperation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_retryable() {
        assert!(CoordinatorError::ResolverTimeout(Duration::from_secs(1)).is_retryable());
        assert!(CoordinatorError::StorageTimeout(Duration::from_secs(1)).is_retryable());
        assert!(CoordinatorError::StorageUnavailable("down".to_string()).is_retryable());
        assert!(!CoordinatorError::InvalidInput("empty".to_string()).is_retryable());
        assert!(!CoordinatorError::SessionClosed(SessionId::from("s")).is_retryable());
    }

    #[test]
    fn test_invariant_maps_to_invalid_operation() {
        let err: CoordinatorError = InvariantError::DuplicateSequence(2).into();
        assert!(matches!(err, CoordinatorError::InvalidOperation(_)));
        assert!(err.is_contract_breach());
    }

    #[test]
    fn test_messages() {
        let err = CoordinatorError::SessionModeConflict {
            id: SessionId::from("abc"),
            actual: SessionMode::Entry,
            requested: SessionMode::DayEdit,
        };
        assert_eq!(err.to_string(), "Session abc is in entry mode, not day-edit");
    }
}
