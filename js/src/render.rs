//! Plain-text rendering of a day
//!
//! The rendering doubles as the editable form of a day: [`parse_day_text`]
//! accepts its own output (or a hand-edited version of it) and returns the
//! event lines.

use chrono::NaiveDate;

const HEADER_PREFIX: &str = "Journal for ";
const EMPTY_MARKER: &str = "No entries.";

/// Render a day as a numbered list of events
pub fn render_day_text<S: AsRef<str>>(day: NaiveDate, events: &[S]) -> String {
    let header = format!("{}{}\n\n", HEADER_PREFIX, day.format("%Y-%m-%d"));
    if events.is_empty() {
        return format!("{}{}\n", header, EMPTY_MARKER);
    }
    let lines = events
        .iter()
        .enumerate()
        .map(|(idx, event)| format!("{}. {}", idx + 1, event.as_ref().trim()))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{}{}\n", header, lines)
}

/// Extract event lines from (possibly edited) day text
pub fn parse_day_text(content: &str) -> Vec<String> {
    let mut events = Vec::new();
    for raw in content.lines() {
        let value = raw.trim();
        if value.is_empty() {
            continue;
        }
        let lowered = value.to_lowercase();
        if lowered.starts_with(&HEADER_PREFIX.to_lowercase()) {
            continue;
        }
        if lowered == "no entries." || lowered == "no entries" {
            continue;
        }
        events.push(strip_number(value).to_string());
    }
    events
}

// "3. text" -> "text"; anything else is left alone
fn strip_number(value: &str) -> &str {
    if let Some((head, tail)) = value.split_once('.')
        && !head.is_empty()
        && head.chars().all(|c| c.is_ascii_digit())
        && !tail.trim().is_empty()
    {
        return tail.trim();
    }
    value
}
