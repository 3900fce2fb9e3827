use crate::error::{AppError, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use std::str::FromStr;

/// Validate a required configuration value, rejecting missing or blank values
pub fn require_value(key: &str, value: Option<String>) -> Result<String> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(AppError::Config(format!("{} must be set", key))),
    }
}

/// Parse an optional configuration value, falling back to `default` when unset
pub fn parse_or<T>(key: &str, value: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| AppError::Config(format!("Invalid {}='{}': {}", key, raw, e))),
        _ => Ok(default),
    }
}

/// Parse a wall-clock time in HH:MM form
pub fn parse_run_time(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|e| AppError::Config(format!("Invalid run time '{}' (expected HH:MM): {}", s, e)))
}

/// Canonical storage key for a trading day: the civil date at 00:00 UTC
pub fn trading_day_key(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// Format a date as YYYY-MM-DD
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
