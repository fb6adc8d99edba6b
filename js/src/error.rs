//! Store error types

use thiserror::Error;

use crate::types::EntryId;

/// Errors from journal storage
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Entry {id} is not an active entry of {day}")]
    UnknownEntry { id: EntryId, day: String },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl StoreError {
    /// Whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        !matches!(self, StoreError::UnknownEntry { .. })
    }
}
