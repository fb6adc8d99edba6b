//! Change resolution
//!
//! A [`ChangeResolver`] turns raw user text into a proposed change: an
//! action, a display diff, the target date, and the entries the day would
//! hold. Resolvers only read the journal; they never write it.
//!
//! [`JournalResolver`] is the built-in implementation. It resolves dates from
//! phrases, ranks the day's entries by similarity, decides the action
//! (optionally asking a chat model through [`ModelDecider`]), and polishes
//! the entry text, through [`ModelEditor`] when one is configured and
//! deterministically otherwise.

mod dates;
mod decision;
mod diff;
mod editor;
mod hygiene;
mod journal;
mod model;
mod similarity;

use async_trait::async_trait;
use chrono::NaiveDate;
use journalstore::StoreError;
use thiserror::Error;

use crate::domain::{Operation, Resolution, SessionMode};

pub use dates::resolve_date_phrase;
pub use decision::{Decision, DecisionContext, DecisionModel, SemanticRelation, fallback_decision, semantic_relation};
pub use diff::unified_day_diff;
pub use editor::{EditorModel, polish_event_text};
pub use hygiene::sanitize_text;
pub use journal::JournalResolver;
pub use model::{ModelDecider, ModelEditor, ModelError};
pub use similarity::{Candidate, rank_candidates, similarity};

/// Session context handed to the resolver
#[derive(Debug, Clone)]
pub struct ResolveContext {
    pub mode: SessionMode,
    /// Pending operation being revised, if any
    pub prior_operation: Option<Operation>,
    /// Day the session currently targets (required for day edits)
    pub target_day: Option<NaiveDate>,
}

impl ResolveContext {
    pub fn entry(prior_operation: Option<Operation>, target_day: Option<NaiveDate>) -> Self {
        Self {
            mode: SessionMode::Entry,
            prior_operation,
            target_day,
        }
    }

    pub fn day_edit(day: NaiveDate, prior_operation: Option<Operation>) -> Self {
        Self {
            mode: SessionMode::DayEdit,
            prior_operation,
            target_day: Some(day),
        }
    }
}

/// Errors from change resolution
#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("Unresolvable input: {0}")]
    Unresolvable(String),

    #[error("Journal read failed: {0}")]
    Store(#[from] StoreError),
}

/// Turns user text into a proposed change
#[async_trait]
pub trait ChangeResolver: Send + Sync {
    async fn resolve(
        &self,
        text: &str,
        context: &ResolveContext,
        instruction: Option<&str>,
    ) -> Result<Resolution, ResolverError>;
}
