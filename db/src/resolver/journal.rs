//! Built-in change resolver backed by the journal store

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use journalstore::{JournalStore, parse_day_text, render_day_text};
use tracing::{debug, info, warn};

use super::dates::resolve_date_phrase;
use super::decision::{Decision, DecisionContext, DecisionModel, fallback_decision, reconcile_action, semantic_relation};
use super::diff::unified_day_diff;
use super::editor::{EditorModel, entry_changes, merged_events, polish_event_text};
use super::hygiene::sanitize_text;
use super::model::{ModelDecider, ModelEditor};
use super::similarity::rank_candidates;
use super::{ChangeResolver, ResolveContext, ResolverError};
use crate::config::Config;
use crate::domain::{Action, ProposedEntry, Resolution, SessionMode};

const DEFAULT_THRESHOLD: f64 = 0.88;
const DEFAULT_CANDIDATE_LIMIT: usize = 10;
const DEFAULT_MAX_RETRIES: u32 = 2;

/// Resolves text against the journal's current state
pub struct JournalResolver {
    store: Arc<dyn JournalStore>,
    decider: Option<Arc<dyn DecisionModel>>,
    editor: Option<Arc<dyn EditorModel>>,
    threshold: f64,
    candidate_limit: usize,
    max_retries: u32,
    today: Option<NaiveDate>,
    /// Reported with every resolution, e.g. a model that failed to start
    standing_warnings: Vec<String>,
}

impl JournalResolver {
    pub fn new(store: Arc<dyn JournalStore>) -> Self {
        Self {
            store,
            decider: None,
            editor: None,
            threshold: DEFAULT_THRESHOLD,
            candidate_limit: DEFAULT_CANDIDATE_LIMIT,
            max_retries: DEFAULT_MAX_RETRIES,
            today: None,
            standing_warnings: Vec::new(),
        }
    }

    /// Build from configuration, wiring the model decider when enabled
    pub fn from_config(store: Arc<dyn JournalStore>, config: &Config) -> Self {
        debug!(model_enabled = config.model.enabled, "JournalResolver::from_config: called");
        let mut resolver = Self::new(store)
            .with_threshold(config.decision.dedup_similarity_threshold)
            .with_candidate_limit(config.decision.candidate_limit)
            .with_max_retries(config.model.max_retries);

        if config.model.enabled {
            match ModelDecider::from_config(&config.model) {
                Ok(decider) => {
                    info!(model = %config.model.model, "Decision model enabled");
                    resolver = resolver.with_decider(Arc::new(decider));
                }
                Err(e) => {
                    warn!(error = %e, "Decision model unavailable, deterministic fallback active");
                    resolver
                        .standing_warnings
                        .push(format!("Decision model unavailable, deterministic fallback active: {}", e));
                }
            }
        }

        if config.model.editor.enabled {
            match ModelEditor::from_config(&config.model) {
                Ok(editor) => {
                    info!("Editor model enabled");
                    resolver = resolver.with_editor(Arc::new(editor));
                }
                Err(e) => {
                    warn!(error = %e, "Editor model unavailable, deterministic text active");
                    resolver
                        .standing_warnings
                        .push(format!("Editor model unavailable; deterministic fallback used: {}", e));
                }
            }
        }
        resolver
    }

    pub fn with_decider(mut self, decider: Arc<dyn DecisionModel>) -> Self {
        self.decider = Some(decider);
        self
    }

    pub fn with_editor(mut self, editor: Arc<dyn EditorModel>) -> Self {
        self.editor = Some(editor);
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_candidate_limit(mut self, limit: usize) -> Self {
        self.candidate_limit = limit;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Pin "today" for date phrases (for testing)
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    /// Ask the model, falling back to the deterministic decision
    async fn decide(&self, context: &DecisionContext) -> (Decision, Vec<String>) {
        let mut warnings = self.standing_warnings.clone();
        if let Some(decider) = &self.decider {
            let mut last_error = None;
            for attempt in 0..=self.max_retries {
                match decider.decide(context).await {
                    Ok(decision) => {
                        debug!(attempt, action = %decision.action, "decide: model answered");
                        return (decision, warnings);
                    }
                    Err(e) => {
                        warn!(attempt, error = %e, "decide: model attempt failed");
                        let retryable = e.is_retryable();
                        last_error = Some(e);
                        if !retryable {
                            break;
                        }
                    }
                }
            }
            let mut warning =
                "Decision model output was invalid or unavailable; used the deterministic fallback.".to_string();
            if let Some(e) = last_error {
                warning.push_str(&format!(" Last error: {}", e));
            }
            warnings.push(warning);
        }
        (fallback_decision(context, self.threshold), warnings)
    }

    /// Polish the entry text with the editor model, falling back to the
    /// deterministic polish
    ///
    /// Without an editor, an instruction is only appended verbatim, so the
    /// fallback is reported.
    async fn polish(&self, text: &str, instruction: Option<&str>, warnings: &mut Vec<String>) -> String {
        let Some(editor) = &self.editor else {
            if instruction.is_some() {
                warnings.push("Editor model unavailable; deterministic fallback used.".to_string());
            }
            return polish_event_text(text, instruction);
        };

        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            match editor.edit(text, instruction).await {
                Ok(edited) => {
                    debug!(attempt, "polish: editor answered");
                    return edited;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "polish: editor attempt failed");
                    let retryable = e.is_retryable();
                    last_error = Some(e);
                    if !retryable {
                        break;
                    }
                }
            }
        }
        let mut warning = "Editor model failed; used the deterministic text fallback.".to_string();
        if let Some(e) = last_error {
            warning.push_str(&format!(" Last error: {}", e));
        }
        warnings.push(warning);
        polish_event_text(text, instruction)
    }

    async fn resolve_entry(
        &self,
        text: &str,
        context: &ResolveContext,
        instruction: Option<&str>,
    ) -> Result<Resolution, ResolverError> {
        let text = sanitize_text(text);
        if text.is_empty() {
            return Err(ResolverError::Unresolvable("text is empty after cleanup".to_string()));
        }
        let instruction = instruction.map(sanitize_text).filter(|i| !i.is_empty());

        let today = self.today();
        let day = resolve_date_phrase(&text, today)
            .or(context.target_day)
            .unwrap_or(today);
        let snapshot = self.store.read_day(day).await?;
        let candidates = rank_candidates(&text, &snapshot.entries, self.candidate_limit);
        let top_similarity = candidates.first().map(|c| c.similarity).unwrap_or(0.0);
        debug!(%day, candidates = candidates.len(), top_similarity, "resolve_entry: ranked");

        let decision_context = DecisionContext {
            resolved_date: day,
            user_text: text.clone(),
            candidate_entry_ids: candidates.iter().map(|c| c.entry_id).collect(),
            top_similarity,
            existing_entries_count: snapshot.entries.len(),
        };
        let (decision, mut warnings) = self.decide(&decision_context).await;
        let relation = semantic_relation(top_similarity, self.threshold);
        let (action, reason) = reconcile_action(&decision, relation, snapshot.entries.len());
        let action = match action {
            Action::Create if !snapshot.is_empty() => Action::Append,
            Action::Update if snapshot.is_empty() => Action::Create,
            other => other,
        };

        let polished = if action == Action::Noop {
            polish_event_text(&text, instruction.as_deref())
        } else {
            self.polish(&text, instruction.as_deref(), &mut warnings).await
        };
        let proposed_entries = entry_changes(
            action,
            &polished,
            &text,
            &snapshot.entries,
            &decision.candidate_entry_ids,
        );
        let proposed = render_day_text(day, &merged_events(&snapshot.entries, &proposed_entries));

        Ok(Resolution {
            action,
            reason,
            diff_text: unified_day_diff(day, &snapshot.content, &proposed),
            resolved_date: day,
            proposed_entries,
            warnings,
        })
    }

    async fn resolve_day_edit(&self, content: &str, context: &ResolveContext) -> Result<Resolution, ResolverError> {
        let day = context
            .target_day
            .ok_or_else(|| ResolverError::Unresolvable("day edit without a target day".to_string()))?;
        let proposed_events = parse_day_text(&sanitize_text(content));
        let snapshot = self.store.read_day(day).await?;
        let current_events = snapshot.events();

        let (action, reason) = if current_events == proposed_events {
            (Action::Noop, "The edit introduces no changes.")
        } else if current_events.is_empty() {
            (Action::Create, "The first entries of the selected day will be created.")
        } else {
            (Action::Update, "The manual edit replaces all entries of the selected day.")
        };

        let proposed_entries = proposed_events
            .iter()
            .enumerate()
            .map(|(idx, event)| ProposedEntry::new(idx as u32 + 1, event.as_str(), event.as_str()))
            .collect();

        Ok(Resolution {
            action,
            reason: reason.to_string(),
            diff_text: unified_day_diff(day, &snapshot.content, &render_day_text(day, &proposed_events)),
            resolved_date: day,
            proposed_entries,
            warnings: Vec::new(),
        })
    }
}

#[async_trait]
impl ChangeResolver for JournalResolver {
    async fn resolve(
        &self,
        text: &str,
        context: &ResolveContext,
        instruction: Option<&str>,
    ) -> Result<Resolution, ResolverError> {
        debug!(mode = %context.mode, has_instruction = instruction.is_some(), "resolve: called");
        match context.mode {
            SessionMode::Entry => self.resolve_entry(text, context, instruction).await,
            SessionMode::DayEdit => self.resolve_day_edit(text, context).await,
        }
    }
}
