//! Journal record types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier of a stored entry
pub type EntryId = i64;

/// An active entry of a day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub id: EntryId,
    pub sequence_no: u32,
    pub event_text: String,
    pub source_user_text: String,
}

/// One entry of the set handed to [`crate::JournalStore::write_day`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryWrite {
    /// Existing entry to keep or revise; `None` creates a new entry
    pub id: Option<EntryId>,
    pub sequence_no: u32,
    pub event_text: String,
    pub source_user_text: String,
}

impl EntryWrite {
    /// A brand-new entry
    pub fn new(sequence_no: u32, event_text: impl Into<String>, source_user_text: impl Into<String>) -> Self {
        Self {
            id: None,
            sequence_no,
            event_text: event_text.into(),
            source_user_text: source_user_text.into(),
        }
    }

    /// Builder method to target an existing entry
    pub fn with_id(mut self, id: EntryId) -> Self {
        self.id = Some(id);
        self
    }
}

impl From<&StoredEntry> for EntryWrite {
    fn from(entry: &StoredEntry) -> Self {
        Self {
            id: Some(entry.id),
            sequence_no: entry.sequence_no,
            event_text: entry.event_text.clone(),
            source_user_text: entry.source_user_text.clone(),
        }
    }
}

/// Current state of a day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySnapshot {
    pub day_date: NaiveDate,
    /// Rendered day text
    pub content: String,
    /// Active entries ordered by sequence number
    pub entries: Vec<StoredEntry>,
}

impl DaySnapshot {
    /// Snapshot of a day with no entries
    pub fn empty(day_date: NaiveDate) -> Self {
        Self {
            day_date,
            content: crate::render_day_text(day_date, &[] as &[&str]),
            entries: Vec::new(),
        }
    }

    /// Build a snapshot from ordered entries
    pub fn from_entries(day_date: NaiveDate, entries: Vec<StoredEntry>) -> Self {
        let content = crate::render_day_text(day_date, &entries.iter().map(|e| e.event_text.as_str()).collect::<Vec<_>>());
        Self {
            day_date,
            content,
            entries,
        }
    }

    /// Event texts in order
    pub fn events(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.event_text.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Names one logical write so retries can be recognized
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WriteToken(String);

impl WriteToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WriteToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot_renders_placeholder() {
        let day = NaiveDate::from_ymd_opt(2026, 2, 20).unwrap();
        let snapshot = DaySnapshot::empty(day);
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.content, "Journal for 2026-02-20\n\nNo entries.\n");
    }

    #[test]
    fn test_entry_write_from_stored() {
        let stored = StoredEntry {
            id: 3,
            sequence_no: 2,
            event_text: "Read a book.".to_string(),
            source_user_text: "read a book".to_string(),
        };
        let write = EntryWrite::from(&stored);
        assert_eq!(write.id, Some(3));
        assert_eq!(write.sequence_no, 2);
    }
}
