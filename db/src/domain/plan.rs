//! Write planning
//!
//! Turns a pending operation plus the day's current entries into the full
//! ordered entry set handed to the journal store.

use journalstore::{EntryWrite, StoredEntry};

use super::operation::{Action, InvariantError, Operation};
use super::session::SessionMode;

/// Plan the day write for `operation`; `None` means nothing to write
///
/// Day-edit sessions replace the day with the proposed entries. Entry
/// sessions keep every current entry the operation does not mention, revise
/// the ones it references by id, and add the ones without id. The result is
/// ordered by sequence number (existing entries before new ones on a tie)
/// and renumbered from 1.
pub fn plan_day_write(
    mode: SessionMode,
    operation: &Operation,
    current: &[StoredEntry],
) -> Result<Option<Vec<EntryWrite>>, InvariantError> {
    operation.validate()?;
    if operation.action == Action::Noop {
        return Ok(None);
    }

    // (sequence_no, is_new, write)
    let mut planned: Vec<(u32, bool, EntryWrite)> = Vec::new();

    if mode == SessionMode::Entry {
        for entry in current {
            let referenced = operation.proposed_entries.iter().any(|p| p.id == Some(entry.id));
            if !referenced {
                planned.push((entry.sequence_no, false, EntryWrite::from(entry)));
            }
        }
    }

    for proposed in operation.entries_in_order() {
        if let Some(id) = proposed.id
            && !current.iter().any(|e| e.id == id)
        {
            return Err(InvariantError::UnknownEntry(id));
        }
        let write = EntryWrite {
            id: proposed.id,
            sequence_no: proposed.sequence_no,
            event_text: proposed.event_text.trim().to_string(),
            source_user_text: proposed.source_user_text.clone(),
        };
        planned.push((proposed.sequence_no, proposed.id.is_none(), write));
    }

    planned.sort_by_key(|(seq, is_new, _)| (*seq, *is_new));
    let writes = planned
        .into_iter()
        .enumerate()
        .map(|(idx, (_, _, mut write))| {
            write.sequence_no = idx as u32 + 1;
            write
        })
        .collect();
    Ok(Some(writes))
}
