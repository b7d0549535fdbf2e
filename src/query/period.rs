use std::sync::LazyLock;

use chrono::{Duration, NaiveDate, Weekday};
use regex::Regex;

use crate::date_util::{last_day_of_month, DateRange};
use crate::error::{Error, Result};

static RE_ROLLING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{1,4})[dD]$").unwrap());
static RE_QUARTER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})-Q([1-4])$").unwrap());
static RE_WEEK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})-W(\d{1,2})$").unwrap());
static RE_MONTH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})$").unwrap());
static RE_YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})$").unwrap());

/// A named reporting window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Period {
    /// The last N days, ending on (and including) the anchor day.
    Rolling(u32, NaiveDate),
    Year(i32),
    Quarter(i32, u8),
    Month(i32, u8),
    Week(i32, u8),
}

impl Period {
    /// Parse a period string.
    ///
    /// Supported formats:
    /// - `30d`: rolling last N days ending `today`
    /// - `2025`: year
    /// - `2025-Q1`: quarter
    /// - `2025-03`: month
    /// - `2025-W05`: ISO week
    pub fn parse(s: &str, today: NaiveDate) -> Result<Self> {
        let s = s.trim();

        if let Some(caps) = RE_ROLLING.captures(s) {
            let n: u32 = caps[1]
                .parse()
                .map_err(|_| Error::PeriodParse(format!("invalid day count: {s}")))?;
            if n == 0 {
                return Err(Error::PeriodParse(format!(
                    "rolling window must be at least 1 day: {s}"
                )));
            }
            return Ok(Period::Rolling(n, today));
        }

        if let Some(caps) = RE_YEAR.captures(s) {
            return Ok(Period::Year(parse_year(&caps[1], s)?));
        }

        if let Some(caps) = RE_QUARTER.captures(s) {
            let q: u8 = caps[2]
                .parse()
                .map_err(|_| Error::PeriodParse(format!("invalid quarter: {s}")))?;
            return Ok(Period::Quarter(parse_year(&caps[1], s)?, q));
        }

        if let Some(caps) = RE_WEEK.captures(s) {
            let year = parse_year(&caps[1], s)?;
            let week: u8 = caps[2]
                .parse()
                .map_err(|_| Error::PeriodParse(format!("invalid week: {s}")))?;
            if NaiveDate::from_isoywd_opt(year, week as u32, Weekday::Mon).is_some() {
                return Ok(Period::Week(year, week));
            }
        }

        if let Some(caps) = RE_MONTH.captures(s) {
            let year = parse_year(&caps[1], s)?;
            let month: u8 = caps[2]
                .parse()
                .map_err(|_| Error::PeriodParse(format!("invalid month: {s}")))?;
            if (1..=12).contains(&month) {
                return Ok(Period::Month(year, month));
            }
        }

        Err(Error::PeriodParse(format!("unrecognized period: {s}")))
    }

    /// Canonical string form, accepted back by [`Period::parse`].
    pub fn to_key(&self) -> String {
        match self {
            Period::Rolling(n, _) => format!("{n}d"),
            Period::Year(y) => format!("{y}"),
            Period::Quarter(y, q) => format!("{y}-Q{q}"),
            Period::Month(y, m) => format!("{y}-{m:02}"),
            Period::Week(y, w) => format!("{y}-W{w:02}"),
        }
    }

    /// The inclusive day range the period covers.
    pub fn date_range(&self) -> Result<DateRange> {
        let invalid = || Error::PeriodParse(format!("period out of range: {}", self.to_key()));
        let (start, end) = match self {
            Period::Rolling(n, as_of) => (*as_of - Duration::days(*n as i64 - 1), *as_of),
            Period::Year(y) => (
                NaiveDate::from_ymd_opt(*y, 1, 1).ok_or_else(invalid)?,
                NaiveDate::from_ymd_opt(*y, 12, 31).ok_or_else(invalid)?,
            ),
            Period::Quarter(y, q) => {
                let start_month = (*q as u32 - 1) * 3 + 1;
                (
                    NaiveDate::from_ymd_opt(*y, start_month, 1).ok_or_else(invalid)?,
                    last_day_of_month(*y, start_month + 2).ok_or_else(invalid)?,
                )
            }
            Period::Month(y, m) => (
                NaiveDate::from_ymd_opt(*y, *m as u32, 1).ok_or_else(invalid)?,
                last_day_of_month(*y, *m as u32).ok_or_else(invalid)?,
            ),
            Period::Week(y, w) => {
                let start = NaiveDate::from_isoywd_opt(*y, *w as u32, Weekday::Mon)
                    .ok_or_else(invalid)?;
                (start, start + Duration::days(6))
            }
        };
        DateRange::new(start, end)
    }
}

fn parse_year(digits: &str, input: &str) -> Result<i32> {
    digits
        .parse()
        .map_err(|_| Error::PeriodParse(format!("invalid year: {input}")))
}

/// Resolve the reporting window from explicit bounds or a period.
///
/// A period wins over `start`/`end`. Without either, the window ends
/// `today` and starts `default_days` before the end.
pub fn resolve_range(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    period: Option<&Period>,
    today: NaiveDate,
    default_days: u32,
) -> Result<DateRange> {
    if let Some(period) = period {
        let range = period.date_range()?;
        log::debug!("Resolved period {} to {} .. {}", period.to_key(), range.start, range.end);
        return Ok(range);
    }

    let end = end.unwrap_or(today);
    let start = match start {
        Some(start) => start,
        None => Duration::try_days(default_days as i64)
            .and_then(|window| end.checked_sub_signed(window))
            .ok_or_else(|| {
                Error::Config(format!("default window of {default_days} days is out of range"))
            })?,
    };
    let range = DateRange::new(start, end)?;
    log::debug!("Resolved range {} .. {}", range.start, range.end);
    Ok(range)
}
