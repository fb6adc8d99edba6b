//! Target date resolution from dictated text
//!
//! Recognizes ISO dates, "today"/"yesterday", "on <weekday>", "last
//! <weekday>" and the Slovenian equivalents (danes, včeraj, "v <dan>",
//! "prejšnji ponedeljek").

use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use regex::Regex;
use tracing::debug;

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4}-\d{2}-\d{2})\b").expect("iso date pattern is valid"));

const WEEKDAYS: &[(&str, Weekday)] = &[
    ("monday", Weekday::Mon),
    ("tuesday", Weekday::Tue),
    ("wednesday", Weekday::Wed),
    ("thursday", Weekday::Thu),
    ("friday", Weekday::Fri),
    ("saturday", Weekday::Sat),
    ("sunday", Weekday::Sun),
];

const SLO_WEEKDAYS: &[(&str, Weekday)] = &[
    ("ponedeljek", Weekday::Mon),
    ("torek", Weekday::Tue),
    ("sredo", Weekday::Wed),
    ("sreda", Weekday::Wed),
    ("četrtek", Weekday::Thu),
    ("petek", Weekday::Fri),
    ("soboto", Weekday::Sat),
    ("sobota", Weekday::Sat),
    ("nedeljo", Weekday::Sun),
    ("nedelja", Weekday::Sun),
];

fn most_recent(base: NaiveDate, weekday: Weekday, include_today: bool) -> NaiveDate {
    let delta = (base.weekday().num_days_from_monday() as i64 - weekday.num_days_from_monday() as i64).rem_euclid(7);
    let delta = if delta == 0 && !include_today { 7 } else { delta };
    base - Duration::days(delta)
}

fn has_word(haystack: &str, word: &str) -> bool {
    haystack
        .split(|c: char| !c.is_alphanumeric())
        .any(|token| token == word)
}

/// Date named by a phrase in `text`, relative to `today`
///
/// Returns `None` when the text names no day, so the caller can fall back to
/// the session's current target.
pub fn resolve_date_phrase(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    debug!(%today, "resolve_date_phrase: called");
    let normalized = text.to_lowercase();

    if let Some(caps) = ISO_DATE.captures(&normalized)
        && let Ok(date) = NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d")
    {
        debug!(%date, "resolve_date_phrase: iso date");
        return Some(date);
    }

    if has_word(&normalized, "today") || has_word(&normalized, "danes") {
        return Some(today);
    }
    if has_word(&normalized, "yesterday") || has_word(&normalized, "včeraj") || has_word(&normalized, "vceraj") {
        return Some(today - Duration::days(1));
    }

    if normalized.contains("prejšnji ponedeljek") || normalized.contains("prejsnji ponedeljek") {
        return Some(most_recent(today, Weekday::Mon, true) - Duration::days(7));
    }

    for (name, weekday) in WEEKDAYS {
        if normalized.contains(&format!("on {}", name)) || normalized.contains(&format!("last {}", name)) {
            return Some(most_recent(today, *weekday, false));
        }
    }
    for (name, weekday) in SLO_WEEKDAYS {
        if normalized.contains(&format!("v {}", name)) {
            return Some(most_recent(today, *weekday, false));
        }
    }

    None
}
