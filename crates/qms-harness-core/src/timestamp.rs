//! Lenient timestamp parsing and relative-time formatting.
//!
//! Date strings arrive from two places: RFC 3339 `createdTime` values from
//! the document store, and hand-entered cells in the tabular source
//! (`2024-03-01`, `3/1/2024`, `2024-03-01 14:05:00`, ...). Anything that
//! cannot be parsed is treated as "no date" rather than an error.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d %b %Y", "%b %d, %Y"];

/// Parse a timestamp string, returning `None` for empty or unparseable input.
///
/// Naive values are interpreted as UTC; date-only values as UTC midnight.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }
    None
}

/// Render a timestamp the way the document store reports `createdTime`.
pub fn format_rfc3339(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Calendar date (`YYYY-MM-DD`) used for review and attribution dates.
pub fn format_date(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d").to_string()
}

/// Format a date string relative to `now` (e.g. "3 days ago").
pub fn format_time_ago(raw: &str, now: DateTime<Utc>) -> String {
    let Some(ts) = parse_timestamp(raw) else {
        return "Unknown".to_string();
    };

    let days = (now - ts).num_milliseconds().div_euclid(86_400_000);

    match days {
        0 => "Today".to_string(),
        1 => "Yesterday".to_string(),
        d if d < 7 => format!("{} days ago", d),
        d if d < 30 => format!("{} weeks ago", d / 7),
        d if d < 365 => format!("{} months ago", d / 30),
        d => format!("{} years ago", d / 365),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn parses_drive_rfc3339() {
        let ts = parse_timestamp("2024-05-01T08:30:00.000Z").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap());
    }

    #[test]
    fn parses_sheet_dates() {
        let midnight = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-01"), Some(midnight));
        assert_eq!(parse_timestamp(" 3/1/2024 "), Some(midnight));
        assert_eq!(parse_timestamp("2024/03/01"), Some(midnight));
        assert_eq!(
            parse_timestamp("2024-03-01 14:05:00"),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 14, 5, 0).unwrap())
        );
    }

    #[test]
    fn rejects_garbage_and_empty() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("   "), None);
        assert_eq!(parse_timestamp("No Files Yet"), None);
        assert_eq!(parse_timestamp("2024-13-45"), None);
    }

    #[test]
    fn formats_relative_buckets() {
        let n = now();
        let ago = |d: i64| format_rfc3339(&(n - Duration::days(d)));
        assert_eq!(format_time_ago(&ago(0), n), "Today");
        assert_eq!(format_time_ago(&ago(1), n), "Yesterday");
        assert_eq!(format_time_ago(&ago(4), n), "4 days ago");
        assert_eq!(format_time_ago(&ago(15), n), "2 weeks ago");
        assert_eq!(format_time_ago(&ago(95), n), "3 months ago");
        assert_eq!(format_time_ago(&ago(800), n), "2 years ago");
        assert_eq!(format_time_ago("not a date", n), "Unknown");
    }

    #[test]
    fn format_date_is_calendar_day() {
        assert_eq!(format_date(&now()), "2024-06-15");
    }
}
