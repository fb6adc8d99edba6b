//! Operation domain type
//!
//! One resolver-produced candidate change attached to a session.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use journalstore::EntryId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::session::SessionStatus;

/// Resolver's classification of a change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Nothing to write
    Noop,
    /// Add an entry after the existing ones
    Append,
    /// Revise existing entries
    Update,
    /// First entry of a day
    Create,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Noop => write!(f, "noop"),
            Self::Append => write!(f, "append"),
            Self::Update => write!(f, "update"),
            Self::Create => write!(f, "create"),
        }
    }
}

/// An entry the day would hold if the operation were confirmed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedEntry {
    /// Existing entry this revises; `None` for a new entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntryId>,
    pub sequence_no: u32,
    pub event_text: String,
    pub source_user_text: String,
}

impl ProposedEntry {
    pub fn new(sequence_no: u32, event_text: impl Into<String>, source_user_text: impl Into<String>) -> Self {
        Self {
            id: None,
            sequence_no,
            event_text: event_text.into(),
            source_user_text: source_user_text.into(),
        }
    }

    /// Builder method to target an existing entry
    pub fn revising(mut self, id: EntryId) -> Self {
        self.id = Some(id);
        self
    }
}

/// What a resolver hands back for one propose/revise call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub action: Action,
    pub reason: String,
    pub diff_text: String,
    pub resolved_date: NaiveDate,
    pub proposed_entries: Vec<ProposedEntry>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Pending change recorded on a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Monotonically increasing within its session, starting at 1
    pub id: u64,
    pub action: Action,
    pub reason: String,
    /// Display diff; never interpreted
    pub diff_text: String,
    pub resolved_date: NaiveDate,
    pub proposed_entries: Vec<ProposedEntry>,
    pub warnings: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Operation {
    pub(crate) fn from_resolution(id: u64, resolution: Resolution) -> Self {
        Self {
            id,
            action: resolution.action,
            reason: resolution.reason,
            diff_text: resolution.diff_text,
            resolved_date: resolution.resolved_date,
            proposed_entries: resolution.proposed_entries,
            warnings: resolution.warnings,
            created_at: Utc::now(),
        }
    }

    /// Check invariants that must hold before the operation may be written
    pub fn validate(&self) -> Result<(), InvariantError> {
        let mut seen = HashSet::new();
        for entry in &self.proposed_entries {
            if !seen.insert(entry.sequence_no) {
                return Err(InvariantError::DuplicateSequence(entry.sequence_no));
            }
        }
        let mut ids = HashSet::new();
        for id in self.proposed_entries.iter().filter_map(|e| e.id) {
            if !ids.insert(id) {
                return Err(InvariantError::DuplicateEntryId(id));
            }
        }
        Ok(())
    }

    /// Proposed entries in application order
    pub fn entries_in_order(&self) -> Vec<&ProposedEntry> {
        let mut entries: Vec<&ProposedEntry> = self.proposed_entries.iter().collect();
        entries.sort_by_key(|e| e.sequence_no);
        entries
    }

    /// Source text of the last proposed entry that has any
    pub fn last_source_text(&self) -> Option<&str> {
        self.entries_in_order()
            .into_iter()
            .rev()
            .map(|e| e.source_user_text.trim())
            .find(|text| !text.is_empty())
    }
}

/// Broken invariants of the session/operation model
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantError {
    #[error("duplicate sequence number {0} in proposed entries")]
    DuplicateSequence(u32),

    #[error("entry {0} is revised more than once")]
    DuplicateEntryId(EntryId),

    #[error("entry {0} is not an active entry of the target day")]
    UnknownEntry(EntryId),

    #[error("the confirm write of operation {0} is still in doubt")]
    WriteInDoubt(u64),

    #[error("illegal status transition {from} -> {to}")]
    IllegalTransition { from: SessionStatus, to: SessionStatus },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn operation(entries: Vec<ProposedEntry>) -> Operation {
        Operation::from_resolution(
            1,
            Resolution {
                action: Action::Append,
                reason: "test".to_string(),
                diff_text: String::new(),
                resolved_date: NaiveDate::from_ymd_opt(2026, 2, 20).unwrap(),
                proposed_entries: entries,
                warnings: vec![],
            },
        )
    }

    #[test]
    fn test_validate_rejects_duplicate_sequence() {
        let op = operation(vec![ProposedEntry::new(1, "a", "a"), ProposedEntry::new(1, "b", "b")]);
        assert_eq!(op.validate(), Err(InvariantError::DuplicateSequence(1)));
    }

    #[test]
    fn test_validate_rejects_double_revision() {
        let op = operation(vec![
            ProposedEntry::new(1, "a", "a").revising(5),
            ProposedEntry::new(2, "b", "b").revising(5),
        ]);
        assert_eq!(op.validate(), Err(InvariantError::DuplicateEntryId(5)));
    }

    #[test]
    fn test_entries_in_order() {
        let op = operation(vec![ProposedEntry::new(3, "c", "c"), ProposedEntry::new(1, "a", "a")]);
        assert!(op.validate().is_ok());
        let seqs: Vec<u32> = op.entries_in_order().iter().map(|e| e.sequence_no).collect();
        assert_eq!(seqs, vec![1, 3]);
    }

    #[test]
    fn test_last_source_text_skips_blank() {
        let op = operation(vec![ProposedEntry::new(1, "A.", "went out"), ProposedEntry::new(2, "B.", "  ")]);
        assert_eq!(op.last_source_text(), Some("went out"));

        let blank = operation(vec![ProposedEntry::new(1, "A.", "")]);
        assert_eq!(blank.last_source_text(), None);
    }

    #[test]
    fn test_action_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Action::Create).unwrap(), "\"create\"");
        let parsed: Action = serde_json::from_str("\"noop\"").unwrap();
        assert_eq!(parsed, Action::Noop);
    }
}
