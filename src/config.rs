use std::ops::RangeInclusive;

use serde::Serialize;

use crate::error::{Error, Result};

pub const DEFAULT_WINDOW_DAYS: &str = "default_window_days";
pub const TOP_LABEL_COUNT: &str = "top_label_count";
pub const MOST_ACTIVE_COUNT: &str = "most_active_count";
pub const RATIO_PRECISION: &str = "ratio_precision";

/// Every key `config set` accepts.
pub const KNOWN_KEYS: [&str; 4] = [
    DEFAULT_WINDOW_DAYS,
    TOP_LABEL_COUNT,
    MOST_ACTIVE_COUNT,
    RATIO_PRECISION,
];

/// Tunables read from `app_config`, loaded once per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSettings {
    /// Days looked back when a request has no start date.
    pub default_window_days: u32,
    /// N in "top N labels plus Others".
    pub top_label_count: usize,
    pub most_active_count: usize,
    /// Decimal places for ratios and percentages.
    pub ratio_precision: u32,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            default_window_days: 10,
            top_label_count: 3,
            most_active_count: 2,
            ratio_precision: 2,
        }
    }
}

impl MetricsSettings {
    /// Build settings from stored key/value pairs. Keys this crate does not
    /// own are ignored; known keys with bad values are errors.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut settings = Self::default();
        for (key, value) in pairs {
            match key {
                DEFAULT_WINDOW_DAYS => settings.default_window_days = parse_bounded(key, value)?,
                TOP_LABEL_COUNT => settings.top_label_count = parse_bounded(key, value)? as usize,
                MOST_ACTIVE_COUNT => {
                    settings.most_active_count = parse_bounded(key, value)? as usize
                }
                RATIO_PRECISION => settings.ratio_precision = parse_bounded(key, value)?,
                _ => {}
            }
        }
        Ok(settings)
    }
}

/// Accepted values per key.
pub fn bounds(key: &str) -> Option<RangeInclusive<u32>> {
    match key {
        DEFAULT_WINDOW_DAYS => Some(1..=3650),
        TOP_LABEL_COUNT | MOST_ACTIVE_COUNT => Some(0..=100),
        RATIO_PRECISION => Some(0..=6),
        _ => None,
    }
}

/// Reject unknown keys and out-of-range values before anything is stored.
pub fn validate(key: &str, value: &str) -> Result<()> {
    if !KNOWN_KEYS.contains(&key) {
        return Err(Error::Config(format!(
            "unknown key '{key}' (expected one of: {})",
            KNOWN_KEYS.join(", ")
        )));
    }
    parse_bounded(key, value).map(|_| ())
}

fn parse_bounded(key: &str, value: &str) -> Result<u32> {
    let n: u32 = parse_value(key, value)?;
    match bounds(key) {
        Some(range) if !range.contains(&n) => Err(Error::Config(format!(
            "{key} must be between {} and {}, got {n}",
            range.start(),
            range.end()
        ))),
        _ => Ok(n),
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{key} must be a non-negative integer, got '{value}'")))
}
