//! Recurring transaction expansion
//!
//! A recurring template is a transaction with a recurrence kind and no
//! parent. Each run generates the instances that have come due since the
//! last generated one, so running twice creates nothing new.

use chrono::{DateTime, Duration, Months, Utc};

use crate::models::RecurrenceKind;

/// Upper bound on instances generated for one template in a single run
pub const MAX_OCCURRENCES_PER_RUN: usize = 1000;

/// The `n`th occurrence after `anchor` (n = 0 is the anchor itself)
fn nth_occurrence(anchor: DateTime<Utc>, kind: RecurrenceKind, n: u32) -> Option<DateTime<Utc>> {
    match kind {
        RecurrenceKind::None => None,
        RecurrenceKind::Daily => anchor.checked_add_signed(Duration::days(i64::from(n))),
        RecurrenceKind::Weekly => anchor.checked_add_signed(Duration::weeks(i64::from(n))),
        // Always step from the anchor so a 31st keeps landing on month ends
        RecurrenceKind::Monthly => anchor.checked_add_months(Months::new(n)),
    }
}

/// Occurrences strictly after `after` and no later than `now`, oldest first
pub fn due_occurrences(
    anchor: DateTime<Utc>,
    kind: RecurrenceKind,
    after: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Vec<DateTime<Utc>> {
    let mut due = Vec::new();
    if !kind.is_recurring() {
        return due;
    }

    let mut n = 1u32;
    while let Some(at) = nth_occurrence(anchor, kind, n) {
        if at > now || due.len() >= MAX_OCCURRENCES_PER_RUN {
            break;
        }
        if at > after {
            due.push(at);
        }
        n += 1;
    }
    due
}
