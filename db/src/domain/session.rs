//! Session domain type
//!
//! Tracks one negotiation over a pending journal change, from the first
//! proposal until it is confirmed or canceled.

use chrono::{DateTime, NaiveDate, Utc};
use journalstore::WriteToken;
use serde::{Deserialize, Serialize};

use super::id::SessionId;
use super::operation::{InvariantError, Operation, Resolution};

/// Editing mode, fixed when the session is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionMode {
    /// Incremental append/update against the day's entries
    Entry,
    /// Whole-day content rewrite
    DayEdit,
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Entry => write!(f, "entry"),
            Self::DayEdit => write!(f, "day-edit"),
        }
    }
}

/// Session lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Accepting proposals
    #[default]
    Active,
    /// Pending operation written to the journal
    Confirmed,
    /// Abandoned without writing
    Canceled,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Canceled => write!(f, "canceled"),
        }
    }
}

/// A confirm write that timed out before the store answered
///
/// It may or may not have been applied; the session cannot be canceled or
/// given a new operation until the write is settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InDoubtWrite {
    pub token: WriteToken,
    pub idempotency_key: String,
    pub operation_id: u64,
    pub day_date: NaiveDate,
}

/// A write session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub mode: SessionMode,
    pub status: SessionStatus,
    pub current_operation: Option<Operation>,
    /// Most recent raw text, the base for a revise without new text
    pub last_input_text: String,
    pub target_date: Option<NaiveDate>,
    #[serde(default)]
    pub in_doubt: Option<InDoubtWrite>,
    /// Operation id handed out next
    next_operation_id: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create an active session with no operation
    pub fn new(mode: SessionMode) -> Self {
        Self::with_id(SessionId::generate(), mode)
    }

    /// Create with a specific ID (for testing)
    pub fn with_id(id: SessionId, mode: SessionMode) -> Self {
        let now = Utc::now();
        Self {
            id,
            mode,
            status: SessionStatus::Active,
            current_operation: None,
            last_input_text: String::new(),
            target_date: None,
            in_doubt: None,
            next_operation_id: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Replace the pending operation with a freshly resolved one
    ///
    /// The whole operation is swapped in one assignment and the new one is
    /// returned.
    pub fn replace_operation(&mut self, input_text: &str, resolution: Resolution) -> &Operation {
        let operation = Operation::from_resolution(self.next_operation_id, resolution);
        self.next_operation_id += 1;
        self.target_date = Some(operation.resolved_date);
        self.last_input_text = input_text.to_string();
        self.updated_at = Utc::now();
        self.current_operation.insert(operation)
    }

    /// Text a revise without new input starts from
    pub fn revisable_text(&self) -> Option<String> {
        let last = self.last_input_text.trim();
        if !last.is_empty() {
            return Some(last.to_string());
        }
        self.current_operation
            .as_ref()
            .and_then(|op| op.last_source_text())
            .map(str::to_string)
    }

    /// Move to a terminal status; the pending operation is dropped on cancel
    pub fn close(&mut self, status: SessionStatus) -> Result<(), InvariantError> {
        if self.status.is_terminal() || !status.is_terminal() {
            return Err(InvariantError::IllegalTransition {
                from: self.status,
                to: status,
            });
        }
        if status == SessionStatus::Canceled
            && let Some(write) = &self.in_doubt
        {
            return Err(InvariantError::WriteInDoubt(write.operation_id));
        }
        self.status = status;
        self.in_doubt = None;
        if status == SessionStatus::Canceled {
            self.current_operation = None;
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Time since the last change
    pub fn idle_for(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.updated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Action, ProposedEntry};

    fn resolution(day: u32, text: &str) -> Resolution {
        Resolution {
            action: Action::Create,
            reason: "first entry".to_string(),
            diff_text: format!("+{}", text),
            resolved_date: NaiveDate::from_ymd_opt(2026, 2, day).unwrap(),
            proposed_entries: vec![ProposedEntry::new(1, text, text)],
            warnings: vec![],
        }
    }

    #[test]
    fn test_replace_operation_increments_id() {
        let mut session = Session::new(SessionMode::Entry);
        assert_eq!(session.replace_operation("had lunch", resolution(20, "Had lunch.")).id, 1);
        assert_eq!(session.replace_operation("had lunch", resolution(20, "Lunch.")).id, 2);

        let current = session.current_operation.as_ref().unwrap();
        assert_eq!(current.id, 2);
        assert_eq!(current.proposed_entries[0].event_text, "Lunch.");
        assert_eq!(session.last_input_text, "had lunch");
        assert_eq!(session.target_date, NaiveDate::from_ymd_opt(2026, 2, 20));
    }

    #[test]
    fn test_cancel_refused_while_write_in_doubt() {
        let mut session = Session::new(SessionMode::Entry);
        session.replace_operation("had lunch", resolution(20, "Had lunch."));
        session.in_doubt = Some(InDoubtWrite {
            token: WriteToken::new(format!("{}:1", session.id)),
            idempotency_key: "k1".to_string(),
            operation_id: 1,
            day_date: NaiveDate::from_ymd_opt(2026, 2, 20).unwrap(),
        });

        assert_eq!(
            session.close(SessionStatus::Canceled),
            Err(InvariantError::WriteInDoubt(1))
        );
        assert_eq!(session.status, SessionStatus::Active);
        assert!(session.current_operation.is_some());

        session.close(SessionStatus::Confirmed).unwrap();
        assert!(session.in_doubt.is_none());
    }

    #[test]
    fn test_revisable_text_falls_back_to_entries() {
        let mut session = Session::new(SessionMode::Entry);
        assert_eq!(session.revisable_text(), None);

        session.replace_operation("", resolution(20, "Walked the dog."));
        assert_eq!(session.revisable_text().as_deref(), Some("Walked the dog."));

        session.last_input_text = "walked the dog twice".to_string();
        assert_eq!(session.revisable_text().as_deref(), Some("walked the dog twice"));
    }

    #[test]
    fn test_close_is_monotone() {
        let mut session = Session::new(SessionMode::Entry);
        session.replace_operation("x", resolution(20, "X."));
        session.close(SessionStatus::Confirmed).unwrap();

        let err = session.close(SessionStatus::Canceled).unwrap_err();
        assert_eq!(
            err,
            InvariantError::IllegalTransition {
                from: SessionStatus::Confirmed,
                to: SessionStatus::Canceled
            }
        );
        assert_eq!(session.status, SessionStatus::Confirmed);
        assert!(session.current_operation.is_some());
    }

    #[test]
    fn test_cancel_discards_operation() {
        let mut session = Session::new(SessionMode::DayEdit);
        session.replace_operation("x", resolution(20, "X."));
        session.close(SessionStatus::Canceled).unwrap();
        assert!(session.current_operation.is_none());
        assert!(session.is_terminal());
    }

    #[test]
    fn test_close_to_active_rejected() {
        let mut session = Session::new(SessionMode::Entry);
        assert!(session.close(SessionStatus::Active).is_err());
        assert_eq!(session.status, SessionStatus::Active);
    }

    #[test]
    fn test_mode_serialization() {
        assert_eq!(serde_json::to_string(&SessionMode::DayEdit).unwrap(), "\"day-edit\"");
        assert_eq!(SessionMode::Entry.to_string(), "entry");
    }
}
