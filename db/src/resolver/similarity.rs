//! Lexical similarity between new text and a day's entries
//!
//! Token-set Jaccard over lowercase words. Cheap and deterministic, good
//! enough to spot a repeated or reworded event on the same day.

use std::collections::HashSet;

use journalstore::{EntryId, StoredEntry};

/// An existing entry ranked against new text
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub entry_id: EntryId,
    pub similarity: f64,
    pub event_text: String,
}

fn tokens(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 1)
        .map(str::to_string)
        .collect()
}

/// Similarity in [0, 1]
pub fn similarity(left: &str, right: &str) -> f64 {
    let a = tokens(left);
    let b = tokens(right);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(&b).count() as f64;
    let union = a.union(&b).count() as f64;
    shared / union
}

/// Entries with any overlap, most similar first, at most `limit`
pub fn rank_candidates(text: &str, entries: &[StoredEntry], limit: usize) -> Vec<Candidate> {
    let mut scored: Vec<Candidate> = entries
        .iter()
        .map(|entry| Candidate {
            entry_id: entry.id,
            similarity: similarity(text, &entry.event_text).max(similarity(text, &entry.source_user_text)),
            event_text: entry.event_text.clone(),
        })
        .filter(|c| c.similarity > 0.0)
        .collect();
    scored.sort_by(|a, b| b.similarity.total_cmp(&a.similarity).then(a.entry_id.cmp(&b.entry_id)));
    scored.truncate(limit);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: EntryId, text: &str) -> StoredEntry {
        StoredEntry {
            id,
            sequence_no: id as u32,
            event_text: text.to_string(),
            source_user_text: text.to_string(),
        }
    }

    #[test]
    fn test_identical_text_scores_one() {
        assert_eq!(similarity("Had lunch with Ana.", "had lunch with ana"), 1.0);
    }

    #[test]
    fn test_disjoint_scores_zero() {
        assert_eq!(similarity("went running", "cooked dinner"), 0.0);
        assert_eq!(similarity("", "cooked dinner"), 0.0);
    }

    #[test]
    fn test_rank_orders_and_limits() {
        let entries = vec![
            entry(1, "Cooked dinner."),
            entry(2, "Had lunch with Ana."),
            entry(3, "Lunch at the office."),
        ];
        let ranked = rank_candidates("had lunch with Ana today", &entries, 1);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].entry_id, 2);

        let all = rank_candidates("lunch", &entries, 10);
        assert_eq!(all.iter().map(|c| c.entry_id).collect::<Vec<_>>(), vec![3, 2]);
    }
}
