use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use crate::error::{Error, Result};

/// Format used for every day bucket key.
pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// A date range [start, end] inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Build a range, rejecting `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// True if the calendar day falls inside the range.
    pub fn contains_day(&self, day: NaiveDate) -> bool {
        day >= self.start && day <= self.end
    }

    /// True if the instant's UTC calendar day falls inside the range.
    pub fn contains(&self, at: &DateTime<Utc>) -> bool {
        self.contains_day(at.date_naive())
    }

    /// Every calendar day in the range, ascending.
    pub fn days(&self) -> Vec<NaiveDate> {
        let mut days = Vec::new();
        let mut cursor = self.start;
        while cursor <= self.end {
            days.push(cursor);
            cursor += Duration::days(1);
        }
        days
    }

    pub fn num_days(&self) -> usize {
        ((self.end - self.start).num_days() + 1) as usize
    }

    /// First instant of the range (start day, 00:00 UTC).
    pub fn start_instant(&self) -> DateTime<Utc> {
        self.start.and_time(NaiveTime::MIN).and_utc()
    }

    /// First instant after the range (day after end, 00:00 UTC).
    pub fn end_instant_exclusive(&self) -> DateTime<Utc> {
        (self.end + Duration::days(1)).and_time(NaiveTime::MIN).and_utc()
    }
}

/// Every calendar day between `start` and `end` inclusive, as `YYYY-MM-DD` keys.
/// Empty when `start > end`.
pub fn all_dates_between(start: NaiveDate, end: NaiveDate) -> Vec<String> {
    let mut dates = Vec::new();
    let mut cursor = start;
    while cursor <= end {
        dates.push(day_key(cursor));
        cursor += Duration::days(1);
    }
    dates
}

pub fn day_key(day: NaiveDate) -> String {
    day.format(DAY_FORMAT).to_string()
}

/// Day bucket key for an instant (UTC calendar day).
pub fn day_key_of(at: &DateTime<Utc>) -> String {
    day_key(at.date_naive())
}

/// Parse a `YYYY-MM-DD` day.
pub fn parse_day(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DAY_FORMAT)
        .map_err(|e| Error::DateParse(format!("{s}: {e}")))
}

/// Parse a stored timestamp: RFC 3339, or a bare day taken as midnight UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, DAY_FORMAT)
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
}

/// Get the last day of a given month.
pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1).map(|d| d - Duration::days(1))
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1).map(|d| d - Duration::days(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_all_dates_between_single_day() {
        assert_eq!(all_dates_between(d(2023, 1, 1), d(2023, 1, 1)), vec!["2023-01-01"]);
    }

    #[test]
    fn test_all_dates_between_inclusive() {
        assert_eq!(
            all_dates_between(d(2023, 1, 1), d(2023, 1, 3)),
            vec!["2023-01-01", "2023-01-02", "2023-01-03"]
        );
    }

    #[test]
    fn test_all_dates_between_crosses_month_and_leap_day() {
        let dates = all_dates_between(d(2024, 2, 27), d(2024, 3, 2));
        assert_eq!(
            dates,
            vec!["2024-02-27", "2024-02-28", "2024-02-29", "2024-03-01", "2024-03-02"]
        );
    }

    #[test]
    fn test_all_dates_between_count_matches_span() {
        let start = d(2023, 1, 1);
        let end = d(2023, 12, 31);
        let expected = (end - start).num_days() as usize + 1;
        assert_eq!(all_dates_between(start, end).len(), expected);
    }

    #[test]
    fn test_all_dates_between_reversed_is_empty() {
        assert!(all_dates_between(d(2023, 1, 3), d(2023, 1, 1)).is_empty());
    }

    #[test]
    fn test_date_range_rejects_reversed() {
        let err = DateRange::new(d(2023, 2, 1), d(2023, 1, 1)).unwrap_err();
        assert!(matches!(err, Error::InvalidDateRange { .. }));
    }

    #[test]
    fn test_date_range_contains_instant() {
        let range = DateRange::new(d(2023, 1, 1), d(2023, 1, 2)).unwrap();
        assert!(range.contains(&parse_timestamp("2023-01-02T23:59:59Z").unwrap()));
        assert!(!range.contains(&parse_timestamp("2023-01-03T00:00:00Z").unwrap()));
        assert_eq!(range.num_days(), 2);
        assert_eq!(range.days().len(), 2);
    }

    #[test]
    fn test_parse_timestamp_forms() {
        let full = parse_timestamp("2025-01-15T10:30:00.000Z").unwrap();
        assert_eq!(day_key_of(&full), "2025-01-15");
        let offset = parse_timestamp("2025-01-15T23:30:00-02:00").unwrap();
        assert_eq!(day_key_of(&offset), "2025-01-16");
        let bare = parse_timestamp("2025-01-15").unwrap();
        assert_eq!(day_key_of(&bare), "2025-01-15");
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_parse_day() {
        assert_eq!(parse_day("2025-03-01").unwrap(), d(2025, 3, 1));
        assert!(matches!(parse_day("03/01/2025"), Err(Error::DateParse(_))));
    }

    #[test]
    fn test_last_day_of_month() {
        assert_eq!(last_day_of_month(2025, 2), Some(d(2025, 2, 28)));
        assert_eq!(last_day_of_month(2024, 2), Some(d(2024, 2, 29))); // Leap year
        assert_eq!(last_day_of_month(2025, 12), Some(d(2025, 12, 31)));
    }
}
