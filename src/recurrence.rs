//! Next-occurrence date arithmetic for recurring tasks.

use crate::types::Recurrence;
use chrono::{DateTime, Duration, Months, TimeZone, Utc};

/// Advance `anchor` by one unit of `rule`.
///
/// Month arithmetic clamps to the last valid day of the target month
/// (Jan 31 + 1 month = Feb 28, or Feb 29 in a leap year). For
/// `Recurrence::None` the anchor is returned unchanged; callers are expected
/// to check `is_recurring` first.
pub fn next_occurrence(rule: Recurrence, anchor: DateTime<Utc>) -> DateTime<Utc> {
    match rule {
        Recurrence::None => anchor,
        Recurrence::Daily => anchor + Duration::days(1),
        Recurrence::Weekly => anchor + Duration::weeks(1),
        Recurrence::Monthly => anchor.checked_add_months(Months::new(1)).unwrap_or(anchor),
    }
}

/// Next occurrence in epoch milliseconds, anchored to the task's due date
/// when set, otherwise to `now`.
pub fn next_occurrence_ms(rule: Recurrence, due_ms: Option<i64>, now: DateTime<Utc>) -> i64 {
    let anchor = due_ms
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or(now);
    next_occurrence(rule, anchor).timestamp_millis()
}
