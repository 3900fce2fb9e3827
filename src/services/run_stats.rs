use crate::models::{OutcomeStatus, RunMode, RunReport};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

/// How the last run ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LastRunStatus {
    Completed,
    CompletedWithFailures,
    Aborted,
}

/// Run statistics shown on the health endpoint
#[derive(Clone, Debug, Serialize)]
pub struct RunStats {
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_run_status: Option<LastRunStatus>,
    pub last_run_error: Option<String>,

    pub runs_total: u64,
    pub runs_aborted: u64,
    pub runs_rejected: u64,
    pub previews_total: u64,

    // Per-index outcomes accumulated over persisted runs
    pub records_written: u64,
    pub records_unchanged: u64,
    pub holidays_skipped: u64,
    pub index_failures: u64,

    pub started_at: DateTime<Utc>,
}

impl Default for RunStats {
    fn default() -> Self {
        Self {
            last_run_at: None,
            last_run_status: None,
            last_run_error: None,
            runs_total: 0,
            runs_aborted: 0,
            runs_rejected: 0,
            previews_total: 0,
            records_written: 0,
            records_unchanged: 0,
            holidays_skipped: 0,
            index_failures: 0,
            started_at: Utc::now(),
        }
    }
}

impl RunStats {
    pub fn record_report(&mut self, report: &RunReport) {
        if report.mode == RunMode::Preview {
            self.previews_total += 1;
            return;
        }

        self.runs_total += 1;
        self.last_run_at = Some(report.finished_at.unwrap_or(report.started_at));
        self.last_run_error = None;
        self.records_written += report.count(OutcomeStatus::Written) as u64;
        self.records_unchanged += report.count(OutcomeStatus::Unchanged) as u64;
        self.holidays_skipped += report.count(OutcomeStatus::Holiday) as u64;

        let failures = report.failures() as u64;
        self.index_failures += failures;
        self.last_run_status = Some(if failures > 0 {
            LastRunStatus::CompletedWithFailures
        } else {
            LastRunStatus::Completed
        });
    }

    pub fn record_abort(&mut self, at: DateTime<Utc>, error: &str) {
        self.runs_total += 1;
        self.runs_aborted += 1;
        self.last_run_at = Some(at);
        self.last_run_status = Some(LastRunStatus::Aborted);
        self.last_run_error = Some(error.to_string());
    }

    pub fn record_rejection(&mut self) {
        self.runs_rejected += 1;
    }

    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds().max(0)
    }
}

pub type SharedRunStats = Arc<RwLock<RunStats>>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IndexOutcome;

    #[test]
    fn test_record_report() {
        let mut stats = RunStats::default();
        let mut report = RunReport::new(RunMode::Persist, Utc::now());
        report.outcomes.push(IndexOutcome::new("dow", OutcomeStatus::Written));
        report.outcomes.push(IndexOutcome::new("ftse", OutcomeStatus::Unchanged));
        report.outcomes.push(IndexOutcome::new("dax", OutcomeStatus::ParseFailed));
        stats.record_report(&report);

        assert_eq!(stats.runs_total, 1);
        assert_eq!(stats.records_written, 1);
        assert_eq!(stats.records_unchanged, 1);
        assert_eq!(stats.index_failures, 1);
        assert_eq!(stats.last_run_status, Some(LastRunStatus::CompletedWithFailures));
    }

    #[test]
    fn test_previews_do_not_count_as_runs() {
        let mut stats = RunStats::default();
        stats.record_report(&RunReport::new(RunMode::Preview, Utc::now()));
        assert_eq!(stats.runs_total, 0);
        assert_eq!(stats.previews_total, 1);
        assert!(stats.last_run_at.is_none());
    }

    #[test]
    fn test_abort_then_success_clears_error() {
        let mut stats = RunStats::default();
        stats.record_abort(Utc::now(), "Network error: timed out");
        assert_eq!(stats.last_run_status, Some(LastRunStatus::Aborted));
        assert!(stats.last_run_error.is_some());

        stats.record_report(&RunReport::new(RunMode::Persist, Utc::now()));
        assert_eq!(stats.runs_total, 2);
        assert_eq!(stats.runs_aborted, 1);
        assert_eq!(stats.last_run_status, Some(LastRunStatus::Completed));
        assert!(stats.last_run_error.is_none());
    }
}
