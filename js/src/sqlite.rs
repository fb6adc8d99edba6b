//! SQLite-backed journal store
//!
//! Active entries keep a stable id across edits; the text an edit replaced is
//! kept in `journal_entry_revisions`, and entries dropped from a day are
//! retired rather than deleted.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use tracing::{debug, info};

use crate::types::{DaySnapshot, EntryWrite, StoredEntry, WriteToken};
use crate::{JournalStore, StoreError, StoreResult};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS journal_days (
    day_date    TEXT PRIMARY KEY,
    created_at  TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS journal_entries (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    day_date          TEXT NOT NULL REFERENCES journal_days(day_date),
    sequence_no       INTEGER NOT NULL,
    event_text        TEXT NOT NULL,
    source_user_text  TEXT NOT NULL,
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL,
    retired_at        TEXT
);
CREATE INDEX IF NOT EXISTS idx_entries_day_active ON journal_entries(day_date, retired_at);
CREATE TABLE IF NOT EXISTS journal_entry_revisions (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    entry_id          INTEGER NOT NULL REFERENCES journal_entries(id),
    event_text        TEXT NOT NULL,
    source_user_text  TEXT NOT NULL,
    replaced_at       TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS applied_writes (
    token       TEXT PRIMARY KEY,
    day_date    TEXT NOT NULL,
    applied_at  TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS revoked_writes (
    token       TEXT PRIMARY KEY,
    revoked_at  TEXT NOT NULL
);
"#;

/// Durable journal store on a single SQLite file
#[derive(Clone)]
pub struct SqliteJournalStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteJournalStore {
    /// Open (and migrate) the database at `path`
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "SqliteJournalStore::open: called");
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Unavailable(format!("cannot create {}: {}", parent.display(), e)))?;
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// In-memory database, mostly for tests
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        info!("Journal schema ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))?;
            f(&mut guard)
        })
        .await?
    }
}

fn day_key(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

fn active_entries(conn: &Connection, day: NaiveDate) -> StoreResult<Vec<StoredEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, sequence_no, event_text, source_user_text FROM journal_entries
         WHERE day_date = ?1 AND retired_at IS NULL ORDER BY sequence_no ASC, id ASC",
    )?;
    let rows = stmt.query_map(params![day_key(day)], |row| {
        Ok(StoredEntry {
            id: row.get(0)?,
            sequence_no: row.get(1)?,
            event_text: row.get(2)?,
            source_user_text: row.get(3)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn snapshot(conn: &Connection, day: NaiveDate) -> StoreResult<DaySnapshot> {
    Ok(DaySnapshot::from_entries(day, active_entries(conn, day)?))
}

fn token_applied(conn: &Connection, token: &str) -> StoreResult<bool> {
    let seen: Option<String> = conn
        .query_row(
            "SELECT day_date FROM applied_writes WHERE token = ?1",
            params![token],
            |row| row.get(0),
        )
        .optional()?;
    Ok(seen.is_some())
}

fn token_revoked(conn: &Connection, token: &str) -> StoreResult<bool> {
    let seen: Option<String> = conn
        .query_row(
            "SELECT revoked_at FROM revoked_writes WHERE token = ?1",
            params![token],
            |row| row.get(0),
        )
        .optional()?;
    Ok(seen.is_some())
}

fn replace_entries(tx: &Transaction<'_>, day: NaiveDate, mut entries: Vec<EntryWrite>) -> StoreResult<()> {
    let key = day_key(day);
    let now = Utc::now().to_rfc3339();
    tx.execute(
        "INSERT OR IGNORE INTO journal_days (day_date, created_at) VALUES (?1, ?2)",
        params![key, now],
    )?;

    let current = active_entries(tx, day)?;
    entries.sort_by_key(|e| e.sequence_no);

    let kept: Vec<i64> = entries.iter().filter_map(|e| e.id).collect();
    for entry in &current {
        if !kept.contains(&entry.id) {
            debug!(entry_id = entry.id, "replace_entries: retiring entry");
            tx.execute(
                "UPDATE journal_entries SET retired_at = ?1 WHERE id = ?2",
                params![now, entry.id],
            )?;
        }
    }

    for write in entries {
        match write.id {
            Some(id) => {
                let existing = current
                    .iter()
                    .find(|e| e.id == id)
                    .ok_or_else(|| StoreError::UnknownEntry { id, day: key.clone() })?;
                if existing.event_text != write.event_text || existing.source_user_text != write.source_user_text {
                    tx.execute(
                        "INSERT INTO journal_entry_revisions (entry_id, event_text, source_user_text, replaced_at)
                         VALUES (?1, ?2, ?3, ?4)",
                        params![id, existing.event_text, existing.source_user_text, now],
                    )?;
                }
                tx.execute(
                    "UPDATE journal_entries SET sequence_no = ?1, event_text = ?2, source_user_text = ?3, updated_at = ?4
                     WHERE id = ?5",
                    params![write.sequence_no, write.event_text, write.source_user_text, now, id],
                )?;
            }
            None => {
                tx.execute(
                    "INSERT INTO journal_entries (day_date, sequence_no, event_text, source_user_text, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                    params![key, write.sequence_no, write.event_text, write.source_user_text, now],
                )?;
            }
        }
    }
    Ok(())
}

#[async_trait]
impl JournalStore for SqliteJournalStore {
    async fn read_day(&self, day: NaiveDate) -> StoreResult<DaySnapshot> {
        debug!(%day, "SqliteJournalStore::read_day: called");
        self.with_conn(move |conn| snapshot(conn, day)).await
    }

    async fn write_day(&self, day: NaiveDate, entries: Vec<EntryWrite>, token: &WriteToken) -> StoreResult<String> {
        debug!(%day, %token, count = entries.len(), "SqliteJournalStore::write_day: called");
        let token = token.as_str().to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            if token_applied(&tx, &token)? || token_revoked(&tx, &token)? {
                debug!(%token, "write_day: token already settled");
                let current = snapshot(&tx, day)?;
                tx.commit()?;
                return Ok(current.content);
            }

            replace_entries(&tx, day, entries)?;
            tx.execute(
                "INSERT INTO applied_writes (token, day_date, applied_at) VALUES (?1, ?2, ?3)",
                params![token, day_key(day), Utc::now().to_rfc3339()],
            )?;
            let written = snapshot(&tx, day)?;
            tx.commit()?;
            info!(%day, entries = written.entries.len(), "Day written");
            Ok(written.content)
        })
        .await
    }

    async fn revoke_token(&self, token: &WriteToken) -> StoreResult<bool> {
        debug!(%token, "SqliteJournalStore::revoke_token: called");
        let token = token.as_str().to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            if token_applied(&tx, &token)? {
                tx.commit()?;
                return Ok(true);
            }
            tx.execute(
                "INSERT OR IGNORE INTO revoked_writes (token, revoked_at) VALUES (?1, ?2)",
                params![token, Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;
            info!(%token, "Write token revoked");
            Ok(false)
        })
        .await
    }

    async fn list_days(&self) -> StoreResult<Vec<NaiveDate>> {
        debug!("SqliteJournalStore::list_days: called");
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT day_date FROM journal_days ORDER BY day_date ASC")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let mut days = Vec::new();
            for raw in rows {
                let raw = raw?;
                let day = NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                    .map_err(|e| StoreError::Unavailable(format!("corrupt day key {}: {}", raw, e)))?;
                days.push(day);
            }
            Ok(days)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 20).unwrap()
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let store = SqliteJournalStore::open_in_memory().unwrap();
        let content = store
            .write_day(
                day(),
                vec![EntryWrite::new(1, "Ran in the morning.", "ran in the morning")],
                &WriteToken::new("a:1"),
            )
            .await
            .unwrap();
        assert_eq!(content, "Journal for 2026-02-20\n\n1. Ran in the morning.\n");

        let snapshot = store.read_day(day()).await.unwrap();
        assert_eq!(snapshot.entries.len(), 1);
        assert_eq!(snapshot.content, content);
    }

    #[tokio::test]
    async fn test_revision_keeps_id_and_retires_missing() {
        let store = SqliteJournalStore::open_in_memory().unwrap();
        store
            .write_day(
                day(),
                vec![EntryWrite::new(1, "Ran.", "ran"), EntryWrite::new(2, "Read.", "read")],
                &WriteToken::new("a:1"),
            )
            .await
            .unwrap();
        let before = store.read_day(day()).await.unwrap();

        let revised = EntryWrite::new(1, "Ran five kilometres.", "ran 5k").with_id(before.entries[0].id);
        let content = store
            .write_day(day(), vec![revised], &WriteToken::new("b:1"))
            .await
            .unwrap();
        assert_eq!(content, "Journal for 2026-02-20\n\n1. Ran five kilometres.\n");

        let after = store.read_day(day()).await.unwrap();
        assert_eq!(after.entries.len(), 1);
        assert_eq!(after.entries[0].id, before.entries[0].id);
    }

    #[tokio::test]
    async fn test_token_replay_is_noop() {
        let store = SqliteJournalStore::open_in_memory().unwrap();
        let token = WriteToken::new("s:1");
        for _ in 0..2 {
            store
                .write_day(day(), vec![EntryWrite::new(1, "Swam.", "swam")], &token)
                .await
                .unwrap();
        }
        assert_eq!(store.read_day(day()).await.unwrap().entries.len(), 1);
    }

    #[tokio::test]
    async fn test_revoke_settles_tokens() {
        let store = SqliteJournalStore::open_in_memory().unwrap();
        let applied = WriteToken::new("s:1");
        store
            .write_day(day(), vec![EntryWrite::new(1, "Swam.", "swam")], &applied)
            .await
            .unwrap();
        assert!(store.revoke_token(&applied).await.unwrap());

        let lost = WriteToken::new("s:2");
        assert!(!store.revoke_token(&lost).await.unwrap());
        store
            .write_day(day(), vec![EntryWrite::new(1, "Ran.", "ran")], &lost)
            .await
            .unwrap();
        let snapshot = store.read_day(day()).await.unwrap();
        assert_eq!(snapshot.entries.len(), 1);
        assert_eq!(snapshot.entries[0].event_text, "Swam.");
        assert!(!store.revoke_token(&lost).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_entry_rolls_back() {
        let store = SqliteJournalStore::open_in_memory().unwrap();
        let result = store
            .write_day(
                day(),
                vec![EntryWrite::new(1, "a", "a"), EntryWrite::new(2, "b", "b").with_id(42)],
                &WriteToken::new("x"),
            )
            .await;
        assert!(matches!(result, Err(StoreError::UnknownEntry { id: 42, .. })));
        assert!(store.read_day(day()).await.unwrap().is_empty());
        assert!(store.list_days().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("nested").join("journal.sqlite3");
        {
            let store = SqliteJournalStore::open(&path).unwrap();
            store
                .write_day(day(), vec![EntryWrite::new(1, "Cooked.", "cooked")], &WriteToken::new("t"))
                .await
                .unwrap();
        }
        let reopened = SqliteJournalStore::open(&path).unwrap();
        assert_eq!(reopened.list_days().await.unwrap(), vec![day()]);
        assert_eq!(reopened.latest_day().await.unwrap(), Some(day()));
    }
}
