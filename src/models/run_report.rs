use crate::models::PreviewRecord;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

/// Where a run sends its results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Reconcile against the store
    Persist,
    /// Collect would-be records in memory, touch nothing
    Preview,
}

/// What happened to one tracked index during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Written,
    Unchanged,
    Holiday,
    NotFound,
    ParseFailed,
    StoreFailed,
    Previewed,
}

impl OutcomeStatus {
    /// Soft failures worth a warning in the run summary
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            OutcomeStatus::NotFound | OutcomeStatus::ParseFailed | OutcomeStatus::StoreFailed
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexOutcome {
    pub index_key: String,
    pub status: OutcomeStatus,

    /// Snapshot entry name the label resolved to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub trading_date: Option<NaiveDate>,

    #[serde(skip_serializing_if = "Option::is_none", with = "rust_decimal::serde::float_option")]
    pub close_value: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl IndexOutcome {
    pub fn new(index_key: &str, status: OutcomeStatus) -> Self {
        Self {
            index_key: index_key.to_string(),
            status,
            matched_name: None,
            trading_date: None,
            close_value: None,
            detail: None,
        }
    }

    pub fn matched(mut self, name: &str) -> Self {
        self.matched_name = Some(name.to_string());
        self
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.trading_date = Some(date);
        self
    }

    pub fn value(mut self, close: Decimal) -> Self {
        self.close_value = Some(close);
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Summary of one pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub mode: RunMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub snapshot_entries: usize,
    pub outcomes: Vec<IndexOutcome>,

    /// Would-be records, populated in preview mode only
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub preview_records: Vec<PreviewRecord>,
}

impl RunReport {
    pub fn new(mode: RunMode, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            mode,
            started_at,
            finished_at: None,
            snapshot_entries: 0,
            outcomes: Vec::new(),
            preview_records: Vec::new(),
        }
    }

    pub fn count(&self, status: OutcomeStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| o.status.is_failure()).count()
    }

    pub fn outcome(&self, index_key: &str) -> Option<&IndexOutcome> {
        self.outcomes.iter().find(|o| o.index_key == index_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let mut report = RunReport::new(RunMode::Persist, Utc::now());
        report.outcomes.push(IndexOutcome::new("dow", OutcomeStatus::Written));
        report.outcomes.push(IndexOutcome::new("ftse", OutcomeStatus::Holiday));
        report.outcomes.push(IndexOutcome::new("dax", OutcomeStatus::NotFound).detail("missing"));

        assert_eq!(report.count(OutcomeStatus::Written), 1);
        assert_eq!(report.failures(), 1);
        assert_eq!(report.outcome("dax").unwrap().detail.as_deref(), Some("missing"));
    }

    #[test]
    fn test_outcome_serialization_skips_empty_fields() {
        let outcome = IndexOutcome::new("dow", OutcomeStatus::Unchanged)
            .on(NaiveDate::from_ymd_opt(2025, 3, 13).unwrap())
            .value(Decimal::new(4198563, 2));
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "unchanged");
        assert_eq!(json["trading_date"], "2025-03-13");
        assert_eq!(json["close_value"].as_f64(), Some(41985.63));
        assert!(json.get("detail").is_none());
    }
}
