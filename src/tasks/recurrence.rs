//! Next-occurrence date arithmetic.
//!
//! A pure function of the current due date and the pattern. It never looks
//! at the clock or the store. Callers holding a task without a due date must
//! pick a reference date themselves before calling in.

use crate::tasks::models::RecurrencePattern;
use chrono::{Days, Months, NaiveDate};

/// Compute the due date of the occurrence after `current`.
///
/// - `Daily` adds one day, `Weekly` adds seven.
/// - `Monthly` and `Yearly` add one calendar month or twelve. When the day
///   of month does not exist in the target month the result is clamped to
///   that month's last day (Jan 31 becomes Feb 28 or Feb 29, Feb 29 becomes
///   Feb 28 in a common year).
/// - `Unrecognized` and an absent pattern advance like `Daily`.
///
/// Dates past the calendar's upper limit saturate at [`NaiveDate::MAX`], so
/// the function never fails.
#[must_use]
pub fn next_due_date(current: NaiveDate, pattern: Option<&RecurrencePattern>) -> NaiveDate {
    let next = match pattern {
        Some(RecurrencePattern::Weekly) => current.checked_add_days(Days::new(7)),
        // chrono clamps to the last valid day of the target month
        Some(RecurrencePattern::Monthly) => current.checked_add_months(Months::new(1)),
        Some(RecurrencePattern::Yearly) => current.checked_add_months(Months::new(12)),
        Some(RecurrencePattern::Daily | RecurrencePattern::Unrecognized(_)) | None => {
            current.checked_add_days(Days::new(1))
        }
    };
    next.unwrap_or(NaiveDate::MAX)
}

/// Whether an occurrence due on `next_due` still fits the chain boundary.
///
/// The boundary is inclusive; no boundary means the chain never ends.
#[must_use]
pub fn within_boundary(next_due: NaiveDate, end: Option<NaiveDate>) -> bool {
    end.map_or(true, |end| next_due <= end)
}
