//! Session registry
//!
//! Owns every session record. The registry-wide lock is only held for map
//! lookups and updates; the per-session lock inside each slot is what
//! serializes operations on one session, including across resolver and store
//! calls.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::messages::ConfirmOutcome;
use crate::domain::{Session, SessionId, SessionStatus};

/// A live session behind its own lock
pub type SessionSlot = Arc<Mutex<Session>>;

const MIN_REAP_INTERVAL: Duration = Duration::from_secs(1);

/// What the registry knows about a session id
pub enum Lookup {
    Active(SessionSlot),
    Closed(SessionStatus),
    Missing,
}

#[derive(Debug, Clone)]
struct Tombstone {
    status: SessionStatus,
    closed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct ConfirmRecord {
    outcome: ConfirmOutcome,
    recorded_at: DateTime<Utc>,
}

#[derive(Default)]
struct RegistryState {
    active: HashMap<SessionId, SessionSlot>,
    tombstones: HashMap<SessionId, Tombstone>,
    confirmations: HashMap<(SessionId, String), ConfirmRecord>,
}

/// Counts from one reaper pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapStats {
    pub sessions: usize,
    pub tombstones: usize,
    pub confirmations: usize,
}

/// Table of sessions plus the confirm idempotency ledger
pub struct SessionRegistry {
    state: Mutex<RegistryState>,
    session_ttl: TimeDelta,
    tombstone_ttl: TimeDelta,
}

fn ttl(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

impl SessionRegistry {
    pub fn new(session_ttl: Duration, tombstone_ttl: Duration) -> Self {
        debug!(?session_ttl, ?tombstone_ttl, "SessionRegistry::new: called");
        Self {
            state: Mutex::new(RegistryState::default()),
            session_ttl: ttl(session_ttl),
            tombstone_ttl: ttl(tombstone_ttl),
        }
    }

    /// Register a freshly created session and return its slot
    pub async fn insert(&self, session: Session) -> SessionSlot {
        let id = session.id.clone();
        let slot = Arc::new(Mutex::new(session));
        self.state.lock().await.active.insert(id, slot.clone());
        slot
    }

    pub async fn lookup(&self, id: &SessionId) -> Lookup {
        let state = self.state.lock().await;
        if let Some(slot) = state.active.get(id) {
            return Lookup::Active(slot.clone());
        }
        match state.tombstones.get(id) {
            Some(tombstone) => Lookup::Closed(tombstone.status),
            None => Lookup::Missing,
        }
    }

    /// Evict a session that reached a terminal status
    pub async fn close(&self, id: &SessionId, status: SessionStatus) {
        let mut state = self.state.lock().await;
        state.active.remove(id);
        state.tombstones.insert(
            id.clone(),
            Tombstone {
                status,
                closed_at: Utc::now(),
            },
        );
        debug!(%id, %status, "close: session evicted");
    }

    pub async fn record_confirm(&self, id: &SessionId, key: &str, outcome: ConfirmOutcome) {
        self.state.lock().await.confirmations.insert(
            (id.clone(), key.to_string()),
            ConfirmRecord {
                outcome,
                recorded_at: Utc::now(),
            },
        );
    }

    /// Result previously recorded for `(id, key)`
    pub async fn recorded_confirm(&self, id: &SessionId, key: &str) -> Option<ConfirmOutcome> {
        self.state
            .lock()
            .await
            .confirmations
            .get(&(id.clone(), key.to_string()))
            .map(|record| record.outcome.clone())
    }

    pub async fn active_ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.state.lock().await.active.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Drop idle sessions and expired tombstones and ledger records
    ///
    /// Sessions whose lock is currently held are in use and skipped, and so
    /// are sessions holding an in-doubt confirm write (those only close through
    /// the coordinator, which settles the write first). A reaped session is
    /// marked canceled under its lock, so a task that already holds its slot
    /// sees it closed.
    pub async fn reap(&self, now: DateTime<Utc>) -> ReapStats {
        let mut stats = ReapStats::default();
        let mut state = self.state.lock().await;

        let mut expired = Vec::new();
        for (id, slot) in &state.active {
            let Ok(mut session) = slot.try_lock() else {
                continue;
            };
            if session.idle_for(now) >= self.session_ttl && session.close(SessionStatus::Canceled).is_ok() {
                expired.push(id.clone());
            }
        }
        for id in expired {
            state.active.remove(&id);
            state.tombstones.insert(
                id,
                Tombstone {
                    status: SessionStatus::Canceled,
                    closed_at: now,
                },
            );
            stats.sessions += 1;
        }

        let tombstone_ttl = self.tombstone_ttl;
        let before = state.tombstones.len();
        state.tombstones.retain(|_, t| now - t.closed_at < tombstone_ttl);
        stats.tombstones = before - state.tombstones.len();

        let before = state.confirmations.len();
        state.confirmations.retain(|_, r| now - r.recorded_at < tombstone_ttl);
        stats.confirmations = before - state.confirmations.len();

        if stats != ReapStats::default() {
            info!(?stats, "reap: expired session state removed");
        }
        stats
    }

    /// Run [`Self::reap`] every `interval` (at least a second) until the handle is aborted
    pub fn spawn_reaper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        let interval = interval.max(MIN_REAP_INTERVAL);
        debug!(?interval, "spawn_reaper: called");
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                registry.reap(Utc::now()).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{InDoubtWrite, SessionMode};
    use chrono::NaiveDate;
    use journalstore::WriteToken;

    fn outcome(id: &SessionId) -> ConfirmOutcome {
        ConfirmOutcome {
            status: SessionStatus::Confirmed,
            session_id: id.clone(),
            operation_id: 1,
            day_date: NaiveDate::from_ymd_opt(2026, 2, 20).unwrap(),
            final_content: "Journal for 2026-02-20\n\nNo entries.\n".to_string(),
        }
    }

    fn registry() -> SessionRegistry {
        SessionRegistry::new(Duration::from_secs(60), Duration::from_secs(120))
    }

    #[tokio::test]
    async fn test_insert_lookup_close() {
        let registry = registry();
        let session = Session::new(SessionMode::Entry);
        let id = session.id.clone();
        registry.insert(session).await;

        assert!(matches!(registry.lookup(&id).await, Lookup::Active(_)));
        assert_eq!(registry.active_ids().await, vec![id.clone()]);

        registry.close(&id, SessionStatus::Canceled).await;
        assert!(matches!(registry.lookup(&id).await, Lookup::Closed(SessionStatus::Canceled)));
        assert!(registry.active_ids().await.is_empty());
        assert!(matches!(registry.lookup(&SessionId::from("nope")).await, Lookup::Missing));
    }

    #[tokio::test]
    async fn test_ledger_keyed_by_session_and_key() {
        let registry = registry();
        let id = SessionId::generate();
        registry.record_confirm(&id, "k1", outcome(&id)).await;

        assert_eq!(registry.recorded_confirm(&id, "k1").await, Some(outcome(&id)));
        assert_eq!(registry.recorded_confirm(&id, "k2").await, None);
        assert_eq!(registry.recorded_confirm(&SessionId::generate(), "k1").await, None);
    }

    #[tokio::test]
    async fn test_reap_idle_sessions() {
        let registry = registry();
        let session = Session::new(SessionMode::Entry);
        let id = session.id.clone();
        let slot = registry.insert(session).await;

        let stats = registry.reap(Utc::now()).await;
        assert_eq!(stats.sessions, 0);

        let later = Utc::now() + TimeDelta::seconds(61);
        let stats = registry.reap(later).await;
        assert_eq!(stats.sessions, 1);
        assert!(matches!(registry.lookup(&id).await, Lookup::Closed(SessionStatus::Canceled)));
        assert_eq!(slot.lock().await.status, SessionStatus::Canceled);
    }

    #[tokio::test]
    async fn test_reap_skips_locked_session() {
        let registry = registry();
        let session = Session::new(SessionMode::Entry);
        let id = session.id.clone();
        let slot = registry.insert(session).await;

        let _guard = slot.lock().await;
        let stats = registry.reap(Utc::now() + TimeDelta::seconds(61)).await;
        assert_eq!(stats.sessions, 0);
        assert!(matches!(registry.lookup(&id).await, Lookup::Active(_)));
    }

    #[tokio::test]
    async fn test_reap_keeps_session_with_write_in_doubt() {
        let registry = registry();
        let mut session = Session::new(SessionMode::Entry);
        let id = session.id.clone();
        session.in_doubt = Some(InDoubtWrite {
            token: WriteToken::new(format!("{}:1", id)),
            idempotency_key: "k1".to_string(),
            operation_id: 1,
            day_date: NaiveDate::from_ymd_opt(2026, 2, 20).unwrap(),
        });
        let slot = registry.insert(session).await;

        let stats = registry.reap(Utc::now() + TimeDelta::seconds(61)).await;
        assert_eq!(stats.sessions, 0);
        assert!(matches!(registry.lookup(&id).await, Lookup::Active(_)));
        assert_eq!(slot.lock().await.status, SessionStatus::Active);
    }

    #[tokio::test]
    async fn test_reaper_survives_zero_interval() {
        let registry = Arc::new(registry());
        let handle = registry.spawn_reaper(Duration::ZERO);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());

        handle.abort();
        let err = handle.await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_reap_expires_tombstones_and_ledger() {
        let registry = registry();
        let id = SessionId::generate();
        registry.close(&id, SessionStatus::Confirmed).await;
        registry.record_confirm(&id, "k1", outcome(&id)).await;

        let stats = registry.reap(Utc::now() + TimeDelta::seconds(121)).await;
        assert_eq!(stats.tombstones, 1);
        assert_eq!(stats.confirmations, 1);
        assert!(matches!(registry.lookup(&id).await, Lookup::Missing));
        assert_eq!(registry.recorded_confirm(&id, "k1").await, None);
    }
}
