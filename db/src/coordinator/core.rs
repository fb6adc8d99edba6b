//! Proposal session coordinator
//!
//! Drives the propose, revise, confirm and cancel protocol over sessions held
//! in a [`SessionRegistry`]. Every operation on an existing session runs
//! under that session's lock from lookup to completion, so concurrent calls
//! against one session are serialized while different sessions proceed
//! independently.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use journalstore::{JournalStore, StoreError, WriteToken};
use tracing::{debug, info, warn};

use super::config::CoordinatorConfig;
use super::error::CoordinatorError;
use super::messages::{CancelOutcome, ConfirmOutcome, ProposalView, SessionSummary};
use super::registry::{Lookup, SessionRegistry, SessionSlot};
use crate::domain::{InDoubtWrite, Resolution, Session, SessionId, SessionMode, SessionStatus, plan_day_write};
use crate::resolver::{ChangeResolver, ResolveContext, ResolverError};

pub type Result<T> = std::result::Result<T, CoordinatorError>;

/// Parse a `YYYY-MM-DD` day for [`ProposalCoordinator::propose_day_edit`]
pub fn parse_day(day: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(day.trim(), "%Y-%m-%d")
        .map_err(|e| CoordinatorError::InvalidInput(format!("invalid day '{}': {}", day.trim(), e)))
}

fn store_error(err: StoreError) -> CoordinatorError {
    if err.is_transient() {
        CoordinatorError::StorageUnavailable(err.to_string())
    } else {
        CoordinatorError::InvalidOperation(err.to_string())
    }
}

fn non_empty(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|t| !t.is_empty())
}

/// Log contract breaches at warn before handing the error back
fn surface<T>(operation: &str, session_id: Option<&SessionId>, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        if e.is_contract_breach() {
            warn!(operation, session_id = ?session_id.map(SessionId::as_str), error = %e, "Resolver contract breach");
        } else {
            debug!(operation, error = %e, "operation failed");
        }
    }
    result
}

/// The proposal session coordinator
#[derive(Clone)]
pub struct ProposalCoordinator {
    registry: Arc<SessionRegistry>,
    resolver: Arc<dyn ChangeResolver>,
    store: Arc<dyn JournalStore>,
    config: CoordinatorConfig,
}

impl ProposalCoordinator {
    pub fn new(
        registry: Arc<SessionRegistry>,
        resolver: Arc<dyn ChangeResolver>,
        store: Arc<dyn JournalStore>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            registry,
            resolver,
            store,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Propose an entry-mode change; with a session id this re-proposes
    pub async fn propose(
        &self,
        text: &str,
        session_id: Option<&SessionId>,
        instruction: Option<&str>,
    ) -> Result<ProposalView> {
        debug!(?session_id, "propose: called");
        let result = self.propose_inner(text, session_id, non_empty(instruction)).await;
        surface("propose", session_id, result)
    }

    async fn propose_inner(
        &self,
        text: &str,
        session_id: Option<&SessionId>,
        instruction: Option<&str>,
    ) -> Result<ProposalView> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CoordinatorError::InvalidInput("text must not be empty".to_string()));
        }

        let Some(id) = session_id else {
            let resolution = self.resolve(text, &ResolveContext::entry(None, None), instruction).await?;
            return Ok(self.open_session(SessionMode::Entry, text, resolution).await);
        };

        let slot = self.active_slot(id).await?;
        let mut session = slot.lock().await;
        Self::ensure_usable(&session, SessionMode::Entry)?;
        self.ensure_settled(&mut session).await?;
        let context = ResolveContext::entry(session.current_operation.clone(), session.target_date);
        let resolution = self.resolve(text, &context, instruction).await?;
        Ok(Self::replace(&mut session, text, resolution))
    }

    /// Re-resolve the session's last text with a new instruction
    pub async fn revise_entry(&self, session_id: &SessionId, instruction: Option<&str>) -> Result<ProposalView> {
        debug!(%session_id, "revise_entry: called");
        let result = self.revise_inner(session_id, non_empty(instruction)).await;
        surface("revise_entry", Some(session_id), result)
    }

    async fn revise_inner(&self, session_id: &SessionId, instruction: Option<&str>) -> Result<ProposalView> {
        let slot = self.active_slot(session_id).await?;
        let mut session = slot.lock().await;
        Self::ensure_usable(&session, SessionMode::Entry)?;
        self.ensure_settled(&mut session).await?;
        let base = session
            .revisable_text()
            .ok_or_else(|| CoordinatorError::NoRevisableContent(session_id.clone()))?;
        let context = ResolveContext::entry(session.current_operation.clone(), session.target_date);
        let resolution = self.resolve(&base, &context, instruction).await?;
        Ok(Self::replace(&mut session, &base, resolution))
    }

    /// Propose replacing a whole day with `content`; empty content clears it
    pub async fn propose_day_edit(
        &self,
        day: NaiveDate,
        content: &str,
        session_id: Option<&SessionId>,
    ) -> Result<ProposalView> {
        debug!(%day, ?session_id, "propose_day_edit: called");
        let result = self.day_edit_inner(day, content, session_id).await;
        surface("propose_day_edit", session_id, result)
    }

    async fn day_edit_inner(&self, day: NaiveDate, content: &str, session_id: Option<&SessionId>) -> Result<ProposalView> {
        let Some(id) = session_id else {
            let resolution = self.resolve(content, &ResolveContext::day_edit(day, None), None).await?;
            Self::check_day(day, &resolution)?;
            return Ok(self.open_session(SessionMode::DayEdit, content, resolution).await);
        };

        let slot = self.active_slot(id).await?;
        let mut session = slot.lock().await;
        Self::ensure_usable(&session, SessionMode::DayEdit)?;
        self.ensure_settled(&mut session).await?;
        if let Some(session_date) = session.target_date
            && session_date != day
        {
            return Err(CoordinatorError::DateMismatch {
                id: id.clone(),
                session_date,
                requested: day,
            });
        }
        let context = ResolveContext::day_edit(day, session.current_operation.clone());
        let resolution = self.resolve(content, &context, None).await?;
        Self::check_day(day, &resolution)?;
        Ok(Self::replace(&mut session, content, resolution))
    }

    /// Apply the pending operation exactly once per `(session, key)`
    pub async fn confirm(&self, session_id: &SessionId, idempotency_key: &str) -> Result<ConfirmOutcome> {
        debug!(%session_id, idempotency_key, "confirm: called");
        let result = self.confirm_inner(session_id, idempotency_key).await;
        surface("confirm", Some(session_id), result)
    }

    async fn confirm_inner(&self, session_id: &SessionId, key: &str) -> Result<ConfirmOutcome> {
        if key.trim().is_empty() {
            return Err(CoordinatorError::InvalidInput("idempotency key must not be empty".to_string()));
        }

        let slot = match self.registry.lookup(session_id).await {
            Lookup::Active(slot) => slot,
            Lookup::Closed(_) | Lookup::Missing => return self.replay_or_reject(session_id, key).await,
        };
        let mut session = slot.lock().await;

        // a concurrent confirm may have finished while this one waited
        if let Some(outcome) = self.registry.recorded_confirm(session_id, key).await {
            debug!(%session_id, "confirm: replaying recorded result");
            return Ok(outcome);
        }
        if session.is_terminal() {
            return Err(CoordinatorError::SessionClosed(session_id.clone()));
        }
        let operation = session
            .current_operation
            .clone()
            .ok_or_else(|| CoordinatorError::NoPendingOperation(session_id.clone()))?;
        operation.validate()?;

        let day = operation.resolved_date;
        let snapshot = self.storage(self.store.read_day(day)).await?;
        let final_content = match plan_day_write(session.mode, &operation, &snapshot.entries)? {
            Some(entries) => {
                let token = WriteToken::new(format!("{}:{}", session_id, operation.id));
                debug!(%day, entries = entries.len(), %token, "confirm: writing day");
                match self.storage(self.store.write_day(day, entries, &token)).await {
                    Ok(content) => content,
                    Err(e @ CoordinatorError::StorageTimeout(_)) => {
                        warn!(%session_id, %token, "confirm: write outcome unknown, session held until settled");
                        if session.in_doubt.is_none() {
                            session.in_doubt = Some(InDoubtWrite {
                                token,
                                idempotency_key: key.to_string(),
                                operation_id: operation.id,
                                day_date: day,
                            });
                        }
                        return Err(e);
                    }
                    Err(e) => return Err(e),
                }
            }
            None => snapshot.content,
        };

        let outcome = ConfirmOutcome {
            status: SessionStatus::Confirmed,
            session_id: session_id.clone(),
            operation_id: operation.id,
            day_date: day,
            final_content,
        };
        self.finish_confirmed(&mut session, key, &outcome).await?;
        info!(%session_id, %day, action = %operation.action, "Session confirmed");
        Ok(outcome)
    }

    /// Record the outcome under every key that asked for it and close the session
    async fn finish_confirmed(&self, session: &mut Session, key: &str, outcome: &ConfirmOutcome) -> Result<()> {
        let earlier_key = session
            .in_doubt
            .as_ref()
            .map(|write| write.idempotency_key.clone())
            .filter(|earlier| earlier != key);
        self.registry.record_confirm(&session.id, key, outcome.clone()).await;
        if let Some(earlier) = earlier_key {
            self.registry.record_confirm(&session.id, &earlier, outcome.clone()).await;
        }
        session.close(SessionStatus::Confirmed)?;
        self.registry.close(&session.id, SessionStatus::Confirmed).await;
        Ok(())
    }

    /// Settle a confirm write left in doubt by a storage timeout
    ///
    /// If the write reached the store the session is closed as confirmed and
    /// the outcome is returned. Otherwise its token is revoked so the write can
    /// no longer land, and the session carries on.
    async fn settle_in_doubt(&self, session: &mut Session) -> Result<Option<ConfirmOutcome>> {
        let Some(write) = session.in_doubt.clone() else {
            return Ok(None);
        };
        debug!(session_id = %session.id, token = %write.token, "settle_in_doubt: called");

        let applied = self.storage(self.store.revoke_token(&write.token)).await?;
        if !applied {
            session.in_doubt = None;
            info!(session_id = %session.id, token = %write.token, "In-doubt write revoked");
            return Ok(None);
        }

        let snapshot = self.storage(self.store.read_day(write.day_date)).await?;
        let outcome = ConfirmOutcome {
            status: SessionStatus::Confirmed,
            session_id: session.id.clone(),
            operation_id: write.operation_id,
            day_date: write.day_date,
            final_content: snapshot.content,
        };
        self.finish_confirmed(session, &write.idempotency_key, &outcome).await?;
        info!(session_id = %session.id, day = %write.day_date, "Session confirmed by in-doubt write");
        Ok(Some(outcome))
    }

    /// Settle before a session takes a new operation
    async fn ensure_settled(&self, session: &mut Session) -> Result<()> {
        match self.settle_in_doubt(session).await? {
            Some(_) => Err(CoordinatorError::SessionClosed(session.id.clone())),
            None => Ok(()),
        }
    }

    async fn replay_or_reject(&self, session_id: &SessionId, key: &str) -> Result<ConfirmOutcome> {
        if let Some(outcome) = self.registry.recorded_confirm(session_id, key).await {
            debug!(%session_id, "confirm: replaying recorded result for evicted session");
            return Ok(outcome);
        }
        match self.registry.lookup(session_id).await {
            Lookup::Missing => Err(CoordinatorError::SessionNotFound(session_id.clone())),
            _ => Err(CoordinatorError::SessionClosed(session_id.clone())),
        }
    }

    /// Abandon the session; idempotent once it is closed
    pub async fn cancel(&self, session_id: &SessionId) -> Result<CancelOutcome> {
        debug!(%session_id, "cancel: called");
        let slot = match self.registry.lookup(session_id).await {
            Lookup::Active(slot) => slot,
            Lookup::Closed(status) => {
                return Ok(CancelOutcome {
                    status,
                    session_id: session_id.clone(),
                });
            }
            Lookup::Missing => return Err(CoordinatorError::SessionNotFound(session_id.clone())),
        };

        let mut session = slot.lock().await;
        if session.is_terminal() {
            return Ok(CancelOutcome {
                status: session.status,
                session_id: session_id.clone(),
            });
        }
        if let Some(outcome) = self.settle_in_doubt(&mut session).await? {
            return Ok(CancelOutcome {
                status: outcome.status,
                session_id: session_id.clone(),
            });
        }
        session.close(SessionStatus::Canceled)?;
        self.registry.close(session_id, SessionStatus::Canceled).await;
        info!(%session_id, "Session canceled");
        Ok(CancelOutcome {
            status: SessionStatus::Canceled,
            session_id: session_id.clone(),
        })
    }

    /// Current state of a live session
    pub async fn session_snapshot(&self, session_id: &SessionId) -> Result<SessionSummary> {
        let slot = self.active_slot(session_id).await?;
        let session = slot.lock().await;
        Ok(SessionSummary {
            session_id: session.id.clone(),
            mode: session.mode,
            status: session.status,
            target_date: session.target_date,
            operation_id: session.current_operation.as_ref().map(|op| op.id),
            last_input_text: session.last_input_text.clone(),
        })
    }

    pub async fn active_sessions(&self) -> Vec<SessionId> {
        self.registry.active_ids().await
    }

    async fn active_slot(&self, session_id: &SessionId) -> Result<SessionSlot> {
        match self.registry.lookup(session_id).await {
            Lookup::Active(slot) => Ok(slot),
            Lookup::Closed(_) => Err(CoordinatorError::SessionClosed(session_id.clone())),
            Lookup::Missing => Err(CoordinatorError::SessionNotFound(session_id.clone())),
        }
    }

    /// Checks that hold once the session lock is held
    fn ensure_usable(session: &Session, requested: SessionMode) -> Result<()> {
        if session.is_terminal() {
            return Err(CoordinatorError::SessionClosed(session.id.clone()));
        }
        if session.mode != requested {
            return Err(CoordinatorError::SessionModeConflict {
                id: session.id.clone(),
                actual: session.mode,
                requested,
            });
        }
        Ok(())
    }

    fn check_day(day: NaiveDate, resolution: &Resolution) -> Result<()> {
        if resolution.resolved_date != day {
            return Err(CoordinatorError::InvalidOperation(format!(
                "day edit for {} resolved to {}",
                day, resolution.resolved_date
            )));
        }
        Ok(())
    }

    async fn open_session(&self, mode: SessionMode, text: &str, resolution: Resolution) -> ProposalView {
        let mut session = Session::new(mode);
        let view = Self::replace(&mut session, text, resolution);
        info!(session_id = %session.id, %mode, "Session opened");
        self.registry.insert(session).await;
        view
    }

    fn replace(session: &mut Session, text: &str, resolution: Resolution) -> ProposalView {
        let operation = session.replace_operation(text, resolution).clone();
        debug!(session_id = %session.id, operation_id = operation.id, action = %operation.action, "operation replaced");
        ProposalView {
            session_id: session.id.clone(),
            mode: session.mode,
            operation,
        }
    }

    async fn resolve(&self, text: &str, context: &ResolveContext, instruction: Option<&str>) -> Result<Resolution> {
        let deadline = self.config.resolver_timeout();
        match tokio::time::timeout(deadline, self.resolver.resolve(text, context, instruction)).await {
            Ok(Ok(resolution)) => Ok(resolution),
            Ok(Err(ResolverError::Unresolvable(reason))) => Err(CoordinatorError::UnresolvableInput(reason)),
            Ok(Err(ResolverError::Store(e))) => Err(store_error(e)),
            Err(_) => {
                warn!(?deadline, "resolve: resolver timed out");
                Err(CoordinatorError::ResolverTimeout(deadline))
            }
        }
    }

    async fn storage<T, F>(&self, call: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, StoreError>>,
    {
        let deadline: Duration = self.config.storage_timeout();
        match tokio::time::timeout(deadline, call).await {
            Ok(result) => result.map_err(store_error),
            Err(_) => {
                warn!(?deadline, "storage: journal store timed out");
                Err(CoordinatorError::StorageTimeout(deadline))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Action, ProposedEntry};
    use async_trait::async_trait;
    use journalstore::MemoryJournalStore;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 20).unwrap()
    }

    /// Resolver that echoes its input as one new entry
    struct EchoResolver {
        delay: Option<Duration>,
        duplicate_sequence: bool,
        date_shift: i64,
    }

    impl EchoResolver {
        fn new() -> Self {
            Self {
                delay: None,
                duplicate_sequence: false,
                date_shift: 0,
            }
        }
    }

    #[async_trait]
    impl ChangeResolver for EchoResolver {
        async fn resolve(
            &self,
            text: &str,
            context: &ResolveContext,
            instruction: Option<&str>,
        ) -> std::result::Result<Resolution, ResolverError> {
            if let Some(delay) = self.delay
                && text.contains("slow")
            {
                tokio::time::sleep(delay).await;
            }
            let event = match instruction {
                Some(i) => format!("{} ({})", text, i),
                None => text.to_string(),
            };
            let mut entries = vec![ProposedEntry::new(1, event.clone(), text)];
            if self.duplicate_sequence {
                entries.push(ProposedEntry::new(1, "again", text));
            }
            let base = context.target_day.unwrap_or_else(day);
            Ok(Resolution {
                action: Action::Create,
                reason: "echo".to_string(),
                diff_text: format!("+{}", event),
                resolved_date: base + chrono::Duration::days(self.date_shift),
                proposed_entries: entries,
                warnings: vec![],
            })
        }
    }

    fn coordinator(resolver: EchoResolver, store: Arc<MemoryJournalStore>) -> ProposalCoordinator {
        let config = CoordinatorConfig {
            resolver_timeout_ms: 50,
            storage_timeout_ms: 50,
            ..CoordinatorConfig::default()
        };
        let registry = Arc::new(SessionRegistry::new(config.session_ttl(), config.tombstone_ttl()));
        ProposalCoordinator::new(registry, Arc::new(resolver), store, config)
    }

    #[tokio::test]
    async fn test_empty_text_is_invalid_input() {
        let coord = coordinator(EchoResolver::new(), Arc::new(MemoryJournalStore::new()));
        let err = coord.propose("   ", None, None).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::InvalidInput(_)));
        assert!(coord.active_sessions().await.is_empty());
    }

    #[tokio::test]
    async fn test_resolver_timeout_keeps_pending_operation() {
        let resolver = EchoResolver {
            delay: Some(Duration::from_millis(500)),
            ..EchoResolver::new()
        };
        let coord = coordinator(resolver, Arc::new(MemoryJournalStore::new()));
        let first = coord.propose("walked", None, None).await.unwrap();

        let err = coord
            .propose("slow walk", Some(&first.session_id), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::ResolverTimeout(_)));
        assert!(err.is_retryable());

        let summary = coord.session_snapshot(&first.session_id).await.unwrap();
        assert_eq!(summary.operation_id, Some(first.operation.id));
        assert_eq!(summary.last_input_text, "walked");
    }

    #[tokio::test]
    async fn test_new_session_not_created_on_timeout() {
        let resolver = EchoResolver {
            delay: Some(Duration::from_millis(500)),
            ..EchoResolver::new()
        };
        let coord = coordinator(resolver, Arc::new(MemoryJournalStore::new()));
        assert!(coord.propose("slow start", None, None).await.is_err());
        assert!(coord.active_sessions().await.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_sequence_fails_confirm_without_write() {
        let store = Arc::new(MemoryJournalStore::new());
        let resolver = EchoResolver {
            duplicate_sequence: true,
            ..EchoResolver::new()
        };
        let coord = coordinator(resolver, store.clone());
        let view = coord.propose("ran", None, None).await.unwrap();

        let err = coord.confirm(&view.session_id, "k1").await.unwrap_err();
        assert!(matches!(err, CoordinatorError::InvalidOperation(_)));
        assert_eq!(store.write_count(), 0);
        assert_eq!(
            coord.session_snapshot(&view.session_id).await.unwrap().status,
            SessionStatus::Active
        );
    }

    #[tokio::test]
    async fn test_day_edit_on_other_date_is_contract_breach() {
        let resolver = EchoResolver {
            date_shift: 1,
            ..EchoResolver::new()
        };
        let coord = coordinator(resolver, Arc::new(MemoryJournalStore::new()));
        let err = coord.propose_day_edit(day(), "Ran.", None).await.unwrap_err();
        assert!(err.is_contract_breach());
        assert!(coord.active_sessions().await.is_empty());
    }

    #[tokio::test]
    async fn test_day_edit_date_mismatch() {
        let coord = coordinator(EchoResolver::new(), Arc::new(MemoryJournalStore::new()));
        let view = coord.propose_day_edit(day(), "Ran.", None).await.unwrap();
        let other = day().succ_opt().unwrap();

        let err = coord
            .propose_day_edit(other, "Ran.", Some(&view.session_id))
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::DateMismatch { .. }));
    }

    #[tokio::test]
    async fn test_empty_idempotency_key_rejected() {
        let coord = coordinator(EchoResolver::new(), Arc::new(MemoryJournalStore::new()));
        let view = coord.propose("ran", None, None).await.unwrap();
        let err = coord.confirm(&view.session_id, " ").await.unwrap_err();
        assert!(matches!(err, CoordinatorError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let coord = coordinator(EchoResolver::new(), Arc::new(MemoryJournalStore::new()));
        let id = SessionId::from("missing");
        assert!(matches!(
            coord.confirm(&id, "k").await,
            Err(CoordinatorError::SessionNotFound(_))
        ));
        assert!(matches!(coord.cancel(&id).await, Err(CoordinatorError::SessionNotFound(_))));
        assert!(matches!(
            coord.revise_entry(&id, None).await,
            Err(CoordinatorError::SessionNotFound(_))
        ));
    }

    #[test]
    fn test_parse_day() {
        assert_eq!(parse_day(" 2026-02-20 ").unwrap(), day());
        assert!(matches!(parse_day("2026-02-30"), Err(CoordinatorError::InvalidInput(_))));
    }
}
