//! Due-date projection from a free-text frequency label.
//!
//! # Algorithm
//!
//! 1. Empty labels and labels mentioning "needed" or "event" (or exactly
//!    "manual") are non-periodic.
//! 2. Without a parseable last-activity timestamp there is no baseline.
//! 3. The label is matched case-insensitively against [`FREQUENCY_MATCHERS`],
//!    first match wins, to obtain an interval in days.
//! 4. `next_due = last_activity + interval`; the remaining whole days are
//!    `floor((next_due - now) / 1 day)`, floored at [`OVERDUE_FLOOR`].
//!
//! # Example
//!
//! ```rust
//! use chrono::{Duration, Utc};
//! use qms_harness_core::schedule::compute_schedule;
//! use qms_harness_core::timestamp::format_rfc3339;
//!
//! let now = Utc::now();
//! let last = format_rfc3339(&(now - Duration::days(40)));
//! let s = compute_schedule("Monthly", Some(&last), now);
//! assert_eq!(s.days_until_next_fill, Some(-10));
//! assert!(s.is_overdue);
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::timestamp::parse_timestamp;

/// Lower bound on `days_until_next_fill` for long-abandoned forms.
pub const OVERDUE_FLOOR: i64 = -999;

const MS_PER_DAY: i64 = 86_400_000;

/// A recognised fill frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    BiWeekly,
    Monthly,
    Quarterly,
    SemiAnnual,
    Annual,
}

/// Substring matchers in priority order, first match wins.
///
/// The plain tokens come first, so a label containing "week" or "month"
/// resolves there even when it also names a longer period: "Bi-weekly" is
/// weekly and "Every 3 months" is monthly.
pub const FREQUENCY_MATCHERS: &[(&str, Frequency)] = &[
    ("daily", Frequency::Daily),
    ("weekly", Frequency::Weekly),
    ("week", Frequency::Weekly),
    ("bi-weekly", Frequency::BiWeekly),
    ("monthly", Frequency::Monthly),
    ("month", Frequency::Monthly),
    ("quarterly", Frequency::Quarterly),
    ("3 months", Frequency::Quarterly),
    ("semi-annually", Frequency::SemiAnnual),
    ("6 months", Frequency::SemiAnnual),
    ("annually", Frequency::Annual),
    ("yearly", Frequency::Annual),
    ("year", Frequency::Annual),
];

impl Frequency {
    pub fn interval_days(self) -> i64 {
        match self {
            Frequency::Daily => 1,
            Frequency::Weekly => 7,
            Frequency::BiWeekly => 14,
            Frequency::Monthly => 30,
            Frequency::Quarterly => 90,
            Frequency::SemiAnnual => 182,
            Frequency::Annual => 365,
        }
    }

    /// Resolve a label to a periodic frequency, or `None` when non-periodic.
    pub fn from_label(label: &str) -> Option<Frequency> {
        if is_non_periodic(label) {
            return None;
        }
        let lower = label.trim().to_lowercase();
        if lower == "day" {
            return Some(Frequency::Daily);
        }
        FREQUENCY_MATCHERS
            .iter()
            .find(|(token, _)| lower.contains(token))
            .map(|(_, freq)| *freq)
    }
}

/// True for labels that never produce a due date ("As needed", "Per event", ...).
pub fn is_non_periodic(label: &str) -> bool {
    let lower = label.trim().to_lowercase();
    lower.is_empty() || lower.contains("needed") || lower.contains("event") || lower == "manual"
}

/// Projected schedule for one form.
///
/// `days_until_next_fill` is `None` exactly when the schedule is not
/// computable, in which case `is_overdue` is false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_until_next_fill: Option<i64>,
    pub is_overdue: bool,
}

impl Schedule {
    pub const NOT_PERIODIC: Schedule = Schedule {
        days_until_next_fill: None,
        is_overdue: false,
    };
}

/// Project the next due date for `frequency_label` given the last activity.
pub fn compute_schedule(
    frequency_label: &str,
    last_activity: Option<&str>,
    now: DateTime<Utc>,
) -> Schedule {
    let Some(frequency) = Frequency::from_label(frequency_label) else {
        return Schedule::NOT_PERIODIC;
    };
    let Some(last) = last_activity.and_then(parse_timestamp) else {
        return Schedule::NOT_PERIODIC;
    };

    let next_due = last + Duration::days(frequency.interval_days());
    let days = (next_due - now)
        .num_milliseconds()
        .div_euclid(MS_PER_DAY)
        .max(OVERDUE_FLOOR);

    Schedule {
        days_until_next_fill: Some(days),
        is_overdue: days < 0,
    }
}
