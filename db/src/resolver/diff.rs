//! Display diff between two renderings of a day

use chrono::NaiveDate;
use similar::TextDiff;

/// Unified diff labelled `a/day/DATE` and `b/day/DATE`, or `(no diff)`
pub fn unified_day_diff(day: NaiveDate, current: &str, proposed: &str) -> String {
    if current == proposed {
        return "(no diff)".to_string();
    }
    let label = format!("day/{}", day);
    TextDiff::from_lines(current, proposed)
        .unified_diff()
        .context_radius(3)
        .header(&format!("a/{}", label), &format!("b/{}", label))
        .to_string()
}
