//! JournalStore - date-addressed journal storage
//!
//! A journal is a set of days, each holding an ordered list of entries. The
//! store exposes a read of a day's current state and an atomic write that
//! replaces a day's active entries with a given ordered set.
//!
//! # Backends
//!
//! - [`MemoryJournalStore`] - in-process map, used by tests and ephemeral runs
//! - [`SqliteJournalStore`] - durable store that keeps superseded revisions
//!
//! # Example
//!
//! ```ignore
//! use journalstore::{EntryWrite, JournalStore, SqliteJournalStore, WriteToken};
//!
//! let store = SqliteJournalStore::open("journal.sqlite3")?;
//! let day = chrono::NaiveDate::from_ymd_opt(2026, 2, 20).unwrap();
//! let entries = vec![EntryWrite::new(1, "Went for a run.", "went for a run")];
//! let content = store.write_day(day, entries, &WriteToken::new("s1:1")).await?;
//! ```

mod error;
mod memory;
mod render;
mod sqlite;
mod types;

use async_trait::async_trait;
use chrono::NaiveDate;

pub use error::StoreError;
pub use memory::MemoryJournalStore;
pub use render::{parse_day_text, render_day_text};
pub use sqlite::SqliteJournalStore;
pub use types::{DaySnapshot, EntryId, EntryWrite, StoredEntry, WriteToken};

/// Result alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Storage primitives consumed by the write-session coordinator
#[async_trait]
pub trait JournalStore: Send + Sync {
    /// Read a day's rendered content and active entries (empty snapshot if the day is unknown)
    async fn read_day(&self, day: NaiveDate) -> StoreResult<DaySnapshot>;

    /// Atomically replace the day's active entries and return the new rendering
    ///
    /// A token that was already applied is not applied again; the current
    /// rendering is returned instead.
    async fn write_day(&self, day: NaiveDate, entries: Vec<EntryWrite>, token: &WriteToken) -> StoreResult<String>;

    /// Settle a write whose outcome the caller never saw
    ///
    /// Returns `true` if the write named by `token` was applied. Otherwise the
    /// token is revoked: a write carrying it that arrives later changes nothing.
    async fn revoke_token(&self, token: &WriteToken) -> StoreResult<bool>;

    /// All days that have ever been written, ascending
    async fn list_days(&self) -> StoreResult<Vec<NaiveDate>>;

    /// Most recent day with content
    async fn latest_day(&self) -> StoreResult<Option<NaiveDate>> {
        Ok(self.list_days().await?.pop())
    }
}
