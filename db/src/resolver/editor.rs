//! Entry text polishing and proposed entry sets

use async_trait::async_trait;
use journalstore::{EntryId, StoredEntry};

use super::model::ModelError;
use crate::domain::{Action, ProposedEntry};

/// Something that rewrites entry text, typically a chat model
#[async_trait]
pub trait EditorModel: Send + Sync {
    /// Polished entry text for `source_text`, following `instruction` if given
    async fn edit(&self, source_text: &str, instruction: Option<&str>) -> Result<String, ModelError>;
}

/// Deterministic cleanup of dictated text into an entry sentence
///
/// Trims, appends the instruction in parentheses, ensures a terminal period
/// and capitalizes the first letter.
pub fn polish_event_text(text: &str, instruction: Option<&str>) -> String {
    let mut polished = text.trim().to_string();
    if let Some(instruction) = instruction.map(str::trim).filter(|i| !i.is_empty()) {
        polished = format!("{} ({})", polished, instruction);
    }
    if !polished.ends_with('.') {
        polished.push('.');
    }
    let mut chars = polished.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => polished,
    }
}

/// Entries the operation proposes for an entry-mode change
///
/// Only entries the operation touches are listed: the new one for
/// create/append, the revised one for update, nothing for noop. Untouched
/// entries stay on the day when the change is written.
pub fn entry_changes(
    action: Action,
    polished: &str,
    source_text: &str,
    existing: &[StoredEntry],
    candidate_entry_ids: &[EntryId],
) -> Vec<ProposedEntry> {
    let next_seq = existing.iter().map(|e| e.sequence_no).max().unwrap_or(0) + 1;
    match action {
        Action::Noop => Vec::new(),
        Action::Create | Action::Append => vec![ProposedEntry::new(next_seq, polished, source_text)],
        Action::Update => {
            let target = candidate_entry_ids
                .iter()
                .find_map(|id| existing.iter().find(|e| e.id == *id))
                .or_else(|| existing.last());
            match target {
                Some(entry) => vec![ProposedEntry::new(entry.sequence_no, polished, source_text).revising(entry.id)],
                None => vec![ProposedEntry::new(1, polished, source_text)],
            }
        }
    }
}

/// The day's events as they would read after the change
pub fn merged_events(existing: &[StoredEntry], changes: &[ProposedEntry]) -> Vec<String> {
    let mut events: Vec<(u32, bool, String)> = existing
        .iter()
        .map(|entry| {
            let text = changes
                .iter()
                .find(|c| c.id == Some(entry.id))
                .map(|c| c.event_text.clone())
                .unwrap_or_else(|| entry.event_text.clone());
            (entry.sequence_no, false, text)
        })
        .collect();
    events.extend(
        changes
            .iter()
            .filter(|c| c.id.is_none())
            .map(|c| (c.sequence_no, true, c.event_text.clone())),
    );
    events.sort_by_key(|(seq, is_new, _)| (*seq, *is_new));
    events.into_iter().map(|(_, _, text)| text).collect()
}
