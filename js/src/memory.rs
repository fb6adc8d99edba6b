//! In-memory journal store

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Mutex;
use tracing::debug;

use crate::types::{DaySnapshot, EntryId, EntryWrite, StoredEntry, WriteToken};
use crate::{JournalStore, StoreError, StoreResult};

#[derive(Default)]
struct Inner {
    days: BTreeMap<NaiveDate, Vec<StoredEntry>>,
    /// `None` marks a revoked token
    applied: HashMap<WriteToken, Option<NaiveDate>>,
    next_id: EntryId,
}

/// Journal store held entirely in memory
///
/// Besides being the test double for the coordinator, it can simulate a slow
/// or failing backend (`with_write_delay`, `set_unavailable`). The token
/// ledger is never pruned, so this store is meant for tests and short-lived
/// runs only; the binary always opens [`crate::SqliteJournalStore`].
#[derive(Default)]
pub struct MemoryJournalStore {
    inner: Mutex<Inner>,
    writes: AtomicU64,
    write_delay: Option<Duration>,
    unavailable: AtomicBool,
}

impl MemoryJournalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every write by `delay` before it is applied
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    /// Seed a day with entries (ids are assigned in order)
    pub async fn seed(&self, day: NaiveDate, events: &[&str]) -> Vec<StoredEntry> {
        let mut inner = self.inner.lock().await;
        let mut seeded = Vec::with_capacity(events.len());
        for (idx, event) in events.iter().enumerate() {
            inner.next_id += 1;
            seeded.push(StoredEntry {
                id: inner.next_id,
                sequence_no: idx as u32 + 1,
                event_text: event.to_string(),
                source_user_text: event.to_string(),
            });
        }
        inner.days.insert(day, seeded.clone());
        seeded
    }

    /// Number of writes that changed stored state
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every call fail with [`StoreError::Unavailable`] until reset
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl JournalStore for MemoryJournalStore {
    async fn read_day(&self, day: NaiveDate) -> StoreResult<DaySnapshot> {
        debug!(%day, "MemoryJournalStore::read_day: called");
        self.check_available()?;
        let inner = self.inner.lock().await;
        Ok(match inner.days.get(&day) {
            Some(entries) => DaySnapshot::from_entries(day, entries.clone()),
            None => DaySnapshot::empty(day),
        })
    }

    async fn write_day(&self, day: NaiveDate, entries: Vec<EntryWrite>, token: &WriteToken) -> StoreResult<String> {
        debug!(%day, %token, count = entries.len(), "MemoryJournalStore::write_day: called");
        self.check_available()?;
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.inner.lock().await;
        if inner.applied.contains_key(token) {
            debug!(%token, "MemoryJournalStore::write_day: token already applied");
            let current = inner.days.get(&day).cloned().unwrap_or_default();
            return Ok(DaySnapshot::from_entries(day, current).content);
        }

        let current = inner.days.get(&day).cloned().unwrap_or_default();
        let mut next_id = inner.next_id;
        let replaced = apply_entries(day, &current, entries, &mut next_id)?;
        inner.next_id = next_id;

        let content = DaySnapshot::from_entries(day, replaced.clone()).content;
        inner.days.insert(day, replaced);
        inner.applied.insert(token.clone(), Some(day));
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(content)
    }

    async fn revoke_token(&self, token: &WriteToken) -> StoreResult<bool> {
        debug!(%token, "MemoryJournalStore::revoke_token: called");
        self.check_available()?;
        let mut inner = self.inner.lock().await;
        let applied = inner.applied.entry(token.clone()).or_insert(None);
        Ok(applied.is_some())
    }

    async fn list_days(&self) -> StoreResult<Vec<NaiveDate>> {
        debug!("MemoryJournalStore::list_days: called");
        self.check_available()?;
        let inner = self.inner.lock().await;
        Ok(inner.days.keys().copied().collect())
    }
}

/// Compute the day's new active entries from a write set
fn apply_entries(
    day: NaiveDate,
    current: &[StoredEntry],
    mut entries: Vec<EntryWrite>,
    next_id: &mut EntryId,
) -> StoreResult<Vec<StoredEntry>> {
    entries.sort_by_key(|e| e.sequence_no);
    let mut out = Vec::with_capacity(entries.len());
    for write in entries {
        match write.id {
            Some(id) => {
                if !current.iter().any(|e| e.id == id) {
                    return Err(StoreError::UnknownEntry { id, day: day.to_string() });
                }
                out.push(StoredEntry {
                    id,
                    sequence_no: write.sequence_no,
                    event_text: write.event_text,
                    source_user_text: write.source_user_text,
                });
            }
            None => {
                *next_id += 1;
                out.push(StoredEntry {
                    id: *next_id,
                    sequence_no: write.sequence_no,
                    event_text: write.event_text,
                    source_user_text: write.source_user_text,
                });
            }
        }
    }
    Ok(out)
}
