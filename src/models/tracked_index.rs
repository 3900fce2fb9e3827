use crate::error::{AppError, Result};
use crate::models::MarketCalendar;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// A market index whose previous close is recorded every day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedIndex {
    /// Short identifier used as the storage key (e.g. "dow")
    pub key: String,

    /// Display name matched against upstream snapshot entries
    pub label: String,

    /// Exchange calendar used for the holiday check
    pub holiday_calendar: MarketCalendar,

    /// Ad-hoc closures not covered by the calendar rules
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_holidays: Vec<NaiveDate>,
}

impl TrackedIndex {
    pub fn new(key: &str, label: &str, holiday_calendar: MarketCalendar) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            holiday_calendar,
            extra_holidays: Vec::new(),
        }
    }

    /// True when this index's market is closed on `date`
    pub fn is_closed_on(&self, date: NaiveDate) -> bool {
        !self.holiday_calendar.is_trading_day(date) || self.extra_holidays.contains(&date)
    }
}

/// The fixed set of indices processed by every run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackedIndices {
    pub indices: Vec<TrackedIndex>,
}

impl TrackedIndices {
    pub fn new(indices: Vec<TrackedIndex>) -> Result<Self> {
        let tracked = Self { indices };
        tracked.validate()?;
        Ok(tracked)
    }

    /// Load tracked indices from a JSON array file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read tracked indices file {}: {}", path.display(), e))
        })?;
        let indices: Vec<TrackedIndex> = serde_json::from_str(&content).map_err(|e| {
            AppError::Config(format!("Invalid tracked indices file {}: {}", path.display(), e))
        })?;
        Self::new(indices)
    }

    /// Global indices published by the upstream snapshot
    pub fn defaults() -> Self {
        Self {
            indices: vec![
                TrackedIndex::new("dow", "Dow Jones", MarketCalendar::Us),
                TrackedIndex::new("sp500", "S&P 500", MarketCalendar::Us),
                TrackedIndex::new("nasdaq", "NASDAQ", MarketCalendar::Us),
                TrackedIndex::new("ftse", "FTSE 100", MarketCalendar::Uk),
                TrackedIndex::new("dax", "DAX", MarketCalendar::Germany),
                TrackedIndex::new("cac", "CAC 40", MarketCalendar::France),
                TrackedIndex::new("nikkei", "Nikkei 225", MarketCalendar::Japan),
                TrackedIndex::new("hangseng", "Hang Seng", MarketCalendar::HongKong),
            ],
        }
    }

    fn validate(&self) -> Result<()> {
        if self.indices.is_empty() {
            return Err(AppError::Config("At least one tracked index is required".to_string()));
        }
        let mut seen = HashSet::new();
        for index in &self.indices {
            if index.key.trim().is_empty() || index.label.trim().is_empty() {
                return Err(AppError::Config(format!(
                    "Tracked index needs a non-empty key and label: {:?}",
                    index
                )));
            }
            if !seen.insert(index.key.as_str()) {
                return Err(AppError::Config(format!("Duplicate tracked index key: {}", index.key)));
            }
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&TrackedIndex> {
        self.indices.iter().find(|i| i.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> Vec<&str> {
        self.indices.iter().map(|i| i.key.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedIndex> {
        self.indices.iter()
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}
