//! Action decision
//!
//! Picks noop/append/update/create for new text against a day. A
//! [`DecisionModel`] may answer first; [`fallback_decision`] is the
//! deterministic answer used when no model is configured or it keeps failing.
//! Either way the lexical similarity check has the last word through
//! [`reconcile_action`].

use async_trait::async_trait;
use chrono::NaiveDate;
use journalstore::EntryId;
use serde::{Deserialize, Serialize};

use super::model::ModelError;
use crate::domain::Action;

/// Similarity at or above which new text is treated as already recorded
pub const NOOP_SIMILARITY: f64 = 0.96;

/// Floor for the same-event relation regardless of the configured threshold
pub const SAME_EVENT_SIMILARITY: f64 = 0.97;

/// What the decider sees about the new text and its day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionContext {
    pub resolved_date: NaiveDate,
    pub user_text: String,
    pub candidate_entry_ids: Vec<EntryId>,
    pub top_similarity: f64,
    pub existing_entries_count: usize,
}

/// A decider's answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub resolved_date: NaiveDate,
    pub action: Action,
    #[serde(default)]
    pub candidate_entry_ids: Vec<EntryId>,
    pub reason: String,
}

/// Something that can decide the action, typically a chat model
#[async_trait]
pub trait DecisionModel: Send + Sync {
    async fn decide(&self, context: &DecisionContext) -> Result<Decision, ModelError>;
}

/// Deterministic decision from similarity and day occupancy
pub fn fallback_decision(context: &DecisionContext, threshold: f64) -> Decision {
    let (action, reason) = if context.top_similarity >= NOOP_SIMILARITY {
        (Action::Noop, "The text is nearly identical to an existing entry.")
    } else if context.top_similarity >= threshold && !context.candidate_entry_ids.is_empty() {
        (Action::Update, "The text resembles an existing entry; update it.")
    } else if context.existing_entries_count > 0 {
        (Action::Append, "The day already has entries; add a new event.")
    } else {
        (Action::Create, "No entry for this day yet; create the first one.")
    };
    Decision {
        resolved_date: context.resolved_date,
        action,
        candidate_entry_ids: context.candidate_entry_ids.clone(),
        reason: reason.to_string(),
    }
}

/// How new text relates to the closest existing entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticRelation {
    SameEvent,
    PotentialUpdate,
    Distinct,
}

impl std::fmt::Display for SemanticRelation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SameEvent => write!(f, "same_event"),
            Self::PotentialUpdate => write!(f, "potential_update"),
            Self::Distinct => write!(f, "distinct"),
        }
    }
}

pub fn semantic_relation(similarity: f64, threshold: f64) -> SemanticRelation {
    if similarity >= threshold.max(SAME_EVENT_SIMILARITY) {
        SemanticRelation::SameEvent
    } else if similarity >= threshold {
        SemanticRelation::PotentialUpdate
    } else {
        SemanticRelation::Distinct
    }
}

/// Final action and reason after checking the decision against similarity
pub fn reconcile_action(decision: &Decision, relation: SemanticRelation, existing_entries: usize) -> (Action, String) {
    let mut reason = decision.reason.clone();
    let action = match relation {
        SemanticRelation::SameEvent => {
            reason.push_str(" Similarity check: same event.");
            Action::Noop
        }
        SemanticRelation::PotentialUpdate if !decision.candidate_entry_ids.is_empty() => {
            reason.push_str(" Similarity check: likely an update of the same event.");
            Action::Update
        }
        SemanticRelation::Distinct if matches!(decision.action, Action::Noop | Action::Update) => {
            reason.push_str(" Similarity check: distinct event.");
            if existing_entries > 0 { Action::Append } else { Action::Create }
        }
        _ => decision.action,
    };
    (action, reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(top: f64, candidates: Vec<EntryId>, existing: usize) -> DecisionContext {
        DecisionContext {
            resolved_date: NaiveDate::from_ymd_opt(2026, 2, 20).unwrap(),
            user_text: "had lunch".to_string(),
            candidate_entry_ids: candidates,
            top_similarity: top,
            existing_entries_count: existing,
        }
    }

    #[test]
    fn test_fallback_ladder() {
        assert_eq!(fallback_decision(&context(0.99, vec![1], 1), 0.88).action, Action::Noop);
        assert_eq!(fallback_decision(&context(0.9, vec![1], 1), 0.88).action, Action::Update);
        assert_eq!(fallback_decision(&context(0.9, vec![], 1), 0.88).action, Action::Append);
        assert_eq!(fallback_decision(&context(0.2, vec![1], 2), 0.88).action, Action::Append);
        assert_eq!(fallback_decision(&context(0.0, vec![], 0), 0.88).action, Action::Create);
    }

    #[test]
    fn test_semantic_relation_thresholds() {
        assert_eq!(semantic_relation(0.98, 0.88), SemanticRelation::SameEvent);
        assert_eq!(semantic_relation(0.9, 0.88), SemanticRelation::PotentialUpdate);
        assert_eq!(semantic_relation(0.5, 0.88), SemanticRelation::Distinct);
        // threshold above the floor wins
        assert_eq!(semantic_relation(0.98, 0.99), SemanticRelation::Distinct);
    }

    #[test]
    fn test_reconcile_overrides_model() {
        let decision = Decision {
            resolved_date: NaiveDate::from_ymd_opt(2026, 2, 20).unwrap(),
            action: Action::Update,
            candidate_entry_ids: vec![],
            reason: "model says update".to_string(),
        };
        let (action, reason) = reconcile_action(&decision, SemanticRelation::Distinct, 0);
        assert_eq!(action, Action::Create);
        assert!(reason.ends_with("distinct event."));

        let (action, _) = reconcile_action(&decision, SemanticRelation::Distinct, 3);
        assert_eq!(action, Action::Append);

        let (action, _) = reconcile_action(&decision, SemanticRelation::SameEvent, 3);
        assert_eq!(action, Action::Noop);
    }

    #[test]
    fn test_reconcile_keeps_agreeing_decision() {
        let decision = Decision {
            resolved_date: NaiveDate::from_ymd_opt(2026, 2, 20).unwrap(),
            action: Action::Append,
            candidate_entry_ids: vec![4],
            reason: "new".to_string(),
        };
        assert_eq!(reconcile_action(&decision, SemanticRelation::Distinct, 1).0, Action::Append);
        assert_eq!(reconcile_action(&decision, SemanticRelation::PotentialUpdate, 1).0, Action::Update);
    }

    #[test]
    fn test_decision_parses_model_json() {
        let raw = r#"{"resolved_date":"2026-02-20","action":"append","reason":"new event"}"#;
        let decision: Decision = serde_json::from_str(raw).unwrap();
        assert_eq!(decision.action, Action::Append);
        assert!(decision.candidate_entry_ids.is_empty());
    }
}
