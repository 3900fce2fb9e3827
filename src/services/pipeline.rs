//! Sync orchestrator
//!
//! A run fetches one snapshot and walks the tracked indices in order:
//! resolve the snapshot entry, resolve the previous trading day, normalize the
//! close, then reconcile it (or, in preview mode, collect it). Only a failed
//! fetch aborts a run; everything after that is scoped to one index.

use crate::error::{AppError, Result};
use crate::models::{
    CloseRecord, IndexOutcome, OutcomeStatus, PreviewRecord, RunMode, RunReport, SnapshotCollection, SnapshotEntry,
    TrackedIndex, TrackedIndices,
};
use crate::services::close_parser::parse_close;
use crate::services::close_store::{reconcile, ReconcileOutcome, SharedCloseStore};
use crate::services::entry_resolver::resolve_entry;
use crate::services::run_stats::{RunStats, SharedRunStats};
use crate::services::snapshot_client::SnapshotSource;
use crate::services::trading_day::{resolve_previous_trading_day, TradingDay};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, instrument, warn};

pub struct SyncPipeline {
    source: Arc<dyn SnapshotSource>,
    store: SharedCloseStore,
    indices: Arc<TrackedIndices>,
    stats: SharedRunStats,
    run_guard: Mutex<()>,
    // Status only; never used to decide whether a run may start
    running: AtomicBool,
}

/// Keeps `running` set for as long as it lives
struct RunningFlag<'a>(&'a AtomicBool);

impl<'a> RunningFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for RunningFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub type SharedPipeline = Arc<SyncPipeline>;

impl SyncPipeline {
    pub fn new(source: Arc<dyn SnapshotSource>, store: SharedCloseStore, indices: Arc<TrackedIndices>) -> Self {
        Self {
            source,
            store,
            indices,
            stats: Arc::new(RwLock::new(RunStats::default())),
            run_guard: Mutex::new(()),
            running: AtomicBool::new(false),
        }
    }

    pub fn stats(&self) -> SharedRunStats {
        self.stats.clone()
    }

    pub fn store(&self) -> SharedCloseStore {
        self.store.clone()
    }

    pub fn indices(&self) -> &TrackedIndices {
        &self.indices
    }

    /// Whether a run is in progress. Reads a status flag and leaves the run guard alone.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Fetch the current snapshot as-is, outside any run. Nothing is resolved or stored.
    pub async fn fetch_raw(&self) -> Result<SnapshotCollection> {
        self.source.fetch_snapshot().await
    }

    /// One persisted run, as fired by the daily timer or `/trigger`
    pub async fn run_once(&self) -> Result<RunReport> {
        self.run_at(Utc::now(), RunMode::Persist).await
    }

    /// Same steps as `run_once`, but nothing is read from or written to the store
    pub async fn preview(&self) -> Result<RunReport> {
        self.run_at(Utc::now(), RunMode::Preview).await
    }

    /// Execute a run as if the clock read `now`
    #[instrument(skip(self), fields(indices = self.indices.len()))]
    pub async fn run_at(&self, now: DateTime<Utc>, mode: RunMode) -> Result<RunReport> {
        let _guard = match self.run_guard.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                warn!("Run rejected: another run is still in progress");
                self.stats.write().await.record_rejection();
                return Err(AppError::RunInProgress);
            }
        };
        let _running = RunningFlag::raise(&self.running);

        let mut report = RunReport::new(mode, now);
        info!(run_id = %report.run_id, "Run started");

        let entries = match self.source.fetch_snapshot().await {
            Ok(entries) => entries,
            Err(e) => {
                error!(run_id = %report.run_id, error = %e, "Run aborted: snapshot fetch failed");
                if mode == RunMode::Persist {
                    self.stats.write().await.record_abort(Utc::now(), &e.to_string());
                }
                return Err(e);
            }
        };
        report.snapshot_entries = entries.len();

        for index in self.indices.iter() {
            let outcome = self
                .process_index(index, &entries, now, mode, &mut report.preview_records)
                .await;
            report.outcomes.push(outcome);
        }

        report.finished_at = Some(Utc::now());
        self.stats.write().await.record_report(&report);

        info!(
            run_id = %report.run_id,
            written = report.count(OutcomeStatus::Written),
            unchanged = report.count(OutcomeStatus::Unchanged),
            holidays = report.count(OutcomeStatus::Holiday),
            previewed = report.count(OutcomeStatus::Previewed),
            failures = report.failures(),
            "Run completed"
        );
        Ok(report)
    }

    async fn process_index(
        &self,
        index: &TrackedIndex,
        entries: &[SnapshotEntry],
        now: DateTime<Utc>,
        mode: RunMode,
        preview_records: &mut Vec<PreviewRecord>,
    ) -> IndexOutcome {
        let key = index.key.as_str();

        let Some((entry, kind)) = resolve_entry(entries, &index.label) else {
            warn!(index = %key, label = %index.label, "No snapshot entry matches label");
            return IndexOutcome::new(key, OutcomeStatus::NotFound)
                .detail(format!("No snapshot entry matches label '{}'", index.label));
        };
        debug!(index = %key, entry = %entry.name, kind = ?kind, "Snapshot entry resolved");

        let trading_day = match resolve_previous_trading_day(now, index) {
            TradingDay::Open(date) => date,
            TradingDay::Closed(date) => {
                info!(index = %key, date = %date, calendar = %index.holiday_calendar, "Market closed, skipping");
                return IndexOutcome::new(key, OutcomeStatus::Holiday)
                    .matched(&entry.name)
                    .on(date);
            }
        };

        let close_value = match parse_close(&entry.previous_close_raw) {
            Ok(value) => value,
            Err(e) => {
                warn!(index = %key, raw = %entry.previous_close_raw, error = %e, "Unparseable close");
                return IndexOutcome::new(key, OutcomeStatus::ParseFailed)
                    .matched(&entry.name)
                    .on(trading_day)
                    .detail(e.to_string());
            }
        };

        let outcome = IndexOutcome::new(key, OutcomeStatus::Previewed)
            .matched(&entry.name)
            .on(trading_day)
            .value(close_value);

        match mode {
            RunMode::Preview => {
                preview_records.push(PreviewRecord::new(CloseRecord::new(key, trading_day, close_value)));
                outcome
            }
            RunMode::Persist => match reconcile(self.store.as_ref(), key, trading_day, close_value).await {
                Ok(ReconcileOutcome::Written) => IndexOutcome {
                    status: OutcomeStatus::Written,
                    ..outcome
                },
                Ok(ReconcileOutcome::SkippedUnchanged) => IndexOutcome {
                    status: OutcomeStatus::Unchanged,
                    ..outcome
                },
                Err(e) => {
                    error!(index = %key, date = %trading_day, error = %e, "Store write failed");
                    IndexOutcome {
                        status: OutcomeStatus::StoreFailed,
                        ..outcome
                    }
                    .detail(e.to_string())
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MarketCalendar;
    use crate::services::close_store::{CloseStore, MemoryCloseStore};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use tokio::sync::Notify;

    /// Serves a fixed snapshot, or a shape error when `entries` is `None`
    struct StaticSource {
        entries: Option<SnapshotCollection>,
    }

    #[async_trait]
    impl SnapshotSource for StaticSource {
        async fn fetch_snapshot(&self) -> Result<SnapshotCollection> {
            match &self.entries {
                Some(entries) => Ok(entries.clone()),
                None => Err(AppError::Shape("success flag is false".to_string())),
            }
        }
    }

    /// Blocks inside the fetch until released
    struct GatedSource {
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl SnapshotSource for GatedSource {
        async fn fetch_snapshot(&self) -> Result<SnapshotCollection> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(vec![SnapshotEntry::new("Dow Jones", "41,985.63")])
        }
    }

    /// Fails every write for one index key
    struct FlakyStore {
        inner: MemoryCloseStore,
        failing_key: String,
    }

    #[async_trait]
    impl CloseStore for FlakyStore {
        async fn latest(&self, index_key: &str) -> Result<Option<CloseRecord>> {
            self.inner.latest(index_key).await
        }

        async fn upsert(&self, record: &CloseRecord) -> Result<()> {
            self.inner.upsert(record).await
        }

        async fn reconcile(&self, record: &CloseRecord) -> Result<ReconcileOutcome> {
            if record.index_key == self.failing_key {
                return Err(AppError::Database("disk I/O error".to_string()));
            }
            self.inner.reconcile(record).await
        }

        async fn list_all(&self) -> Result<Vec<CloseRecord>> {
            self.inner.list_all().await
        }

        async fn list_for_index(&self, index_key: &str) -> Result<Vec<CloseRecord>> {
            self.inner.list_for_index(index_key).await
        }

        async fn count(&self) -> Result<i64> {
            self.inner.count().await
        }
    }

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn indices(list: Vec<TrackedIndex>) -> Arc<TrackedIndices> {
        Arc::new(TrackedIndices::new(list).unwrap())
    }

    fn pipeline_with(
        entries: Option<SnapshotCollection>,
        store: SharedCloseStore,
        tracked: Vec<TrackedIndex>,
    ) -> SyncPipeline {
        SyncPipeline::new(Arc::new(StaticSource { entries }), store, indices(tracked))
    }

    fn dow() -> TrackedIndex {
        TrackedIndex::new("dow", "Dow", MarketCalendar::Us)
    }

    // Friday 14 Mar 2025, 08:30 in Kolkata; yesterday was an ordinary Thursday
    const THURSDAY_AFTER: &str = "2025-03-14T03:00:00Z";

    #[tokio::test]
    async fn test_single_index_written() {
        let store: SharedCloseStore = Arc::new(MemoryCloseStore::new());
        let pipeline = pipeline_with(
            Some(vec![SnapshotEntry::new("Dow Jones", "41,985.63")]),
            store.clone(),
            vec![dow()],
        );

        let report = pipeline.run_at(utc(THURSDAY_AFTER), RunMode::Persist).await.unwrap();
        assert_eq!(report.outcome("dow").unwrap().status, OutcomeStatus::Written);
        assert_eq!(report.snapshot_entries, 1);

        let records = store.list_all().await.unwrap();
        assert_eq!(records.len(), 1);
        let json = serde_json::to_value(&records[0]).unwrap();
        assert_eq!(json["index"], "dow");
        assert_eq!(json["date"], "2025-03-13T00:00:00Z");
        assert_eq!(json["close"].as_f64(), Some(41985.63));
    }

    #[tokio::test]
    async fn test_second_run_same_day_is_unchanged() {
        let store: SharedCloseStore = Arc::new(MemoryCloseStore::new());
        let pipeline = pipeline_with(
            Some(vec![SnapshotEntry::new("Dow Jones", "41,985.63")]),
            store.clone(),
            vec![dow()],
        );

        pipeline.run_at(utc(THURSDAY_AFTER), RunMode::Persist).await.unwrap();
        let second = pipeline.run_at(utc("2025-03-14T09:00:00Z"), RunMode::Persist).await.unwrap();

        assert_eq!(second.outcome("dow").unwrap().status, OutcomeStatus::Unchanged);
        assert_eq!(store.count().await.unwrap(), 1);

        let stats = pipeline.stats();
        let stats = stats.read().await;
        assert_eq!(stats.runs_total, 2);
        assert_eq!(stats.records_written, 1);
        assert_eq!(stats.records_unchanged, 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts_before_any_index() {
        let store: SharedCloseStore = Arc::new(MemoryCloseStore::new());
        let pipeline = pipeline_with(None, store.clone(), vec![dow()]);

        let result = pipeline.run_at(utc(THURSDAY_AFTER), RunMode::Persist).await;
        assert!(matches!(result, Err(AppError::Shape(_))));
        assert_eq!(store.count().await.unwrap(), 0);

        let stats = pipeline.stats();
        assert_eq!(stats.read().await.runs_aborted, 1);
    }

    #[tokio::test]
    async fn test_holiday_skip_is_per_index() {
        let store: SharedCloseStore = Arc::new(MemoryCloseStore::new());
        let pipeline = pipeline_with(
            Some(vec![
                SnapshotEntry::new("Dow Jones", "44,828.53"),
                SnapshotEntry::new("FTSE 100", "8,822.91"),
            ]),
            store.clone(),
            vec![dow(), TrackedIndex::new("ftse", "FTSE 100", MarketCalendar::Uk)],
        );

        // Yesterday in Kolkata was 4 July 2025
        let report = pipeline.run_at(utc("2025-07-05T03:00:00Z"), RunMode::Persist).await.unwrap();

        let dow_outcome = report.outcome("dow").unwrap();
        assert_eq!(dow_outcome.status, OutcomeStatus::Holiday);
        assert_eq!(dow_outcome.trading_date, Some(date(2025, 7, 4)));
        assert_eq!(report.outcome("ftse").unwrap().status, OutcomeStatus::Written);

        let records = store.list_all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].index_key, "ftse");
        assert_eq!(records[0].close_value, dec("8822.91"));
    }

    #[tokio::test]
    async fn test_soft_failures_do_not_stop_other_indices() {
        let store: SharedCloseStore = Arc::new(FlakyStore {
            inner: MemoryCloseStore::new(),
            failing_key: "dax".to_string(),
        });
        let pipeline = pipeline_with(
            Some(vec![
                SnapshotEntry::new("Dow Jones", "41,985.63"),
                SnapshotEntry::new("Nikkei 225", "N/A"),
                SnapshotEntry::new("DAX", "22,676.41"),
                SnapshotEntry::new("S&P 500", "5,521.52"),
            ]),
            store.clone(),
            vec![
                dow(),
                TrackedIndex::new("nikkei", "Nikkei 225", MarketCalendar::Japan),
                TrackedIndex::new("dax", "DAX", MarketCalendar::Germany),
                TrackedIndex::new("hangseng", "Hang Seng", MarketCalendar::HongKong),
                TrackedIndex::new("sp500", "S&P", MarketCalendar::Us),
            ],
        );

        let report = pipeline.run_at(utc(THURSDAY_AFTER), RunMode::Persist).await.unwrap();

        assert_eq!(report.outcome("dow").unwrap().status, OutcomeStatus::Written);
        assert_eq!(report.outcome("nikkei").unwrap().status, OutcomeStatus::ParseFailed);
        assert_eq!(report.outcome("dax").unwrap().status, OutcomeStatus::StoreFailed);
        assert_eq!(report.outcome("hangseng").unwrap().status, OutcomeStatus::NotFound);

        let sp500 = report.outcome("sp500").unwrap();
        assert_eq!(sp500.status, OutcomeStatus::Written);
        assert_eq!(sp500.matched_name.as_deref(), Some("S&P 500"));

        assert_eq!(report.failures(), 3);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_preview_writes_nothing() {
        let store: SharedCloseStore = Arc::new(MemoryCloseStore::new());
        store
            .upsert(&CloseRecord::new("dow", date(2025, 3, 12), dec("41985.63")))
            .await
            .unwrap();
        let pipeline = pipeline_with(
            Some(vec![SnapshotEntry::new("Dow Jones", "41,985.63")]),
            store.clone(),
            vec![dow()],
        );

        let report = pipeline.run_at(utc(THURSDAY_AFTER), RunMode::Preview).await.unwrap();

        // No comparison against history: an unchanged value is still previewed
        assert_eq!(report.outcome("dow").unwrap().status, OutcomeStatus::Previewed);
        assert_eq!(report.preview_records.len(), 1);
        assert_eq!(report.preview_records[0].record.trading_day(), date(2025, 3, 13));
        assert!(!report.preview_records[0].id.is_nil());
        assert_eq!(store.count().await.unwrap(), 1);

        let stats = pipeline.stats();
        let stats = stats.read().await;
        assert_eq!(stats.previews_total, 1);
        assert_eq!(stats.runs_total, 0);
    }

    #[tokio::test]
    async fn test_concurrent_run_is_rejected() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let store: SharedCloseStore = Arc::new(MemoryCloseStore::new());
        let pipeline = Arc::new(SyncPipeline::new(
            Arc::new(GatedSource {
                entered: entered.clone(),
                release: release.clone(),
            }),
            store.clone(),
            indices(vec![dow()]),
        ));

        let running = pipeline.clone();
        let first = tokio::spawn(async move { running.run_at(utc(THURSDAY_AFTER), RunMode::Persist).await });

        entered.notified().await;
        assert!(pipeline.is_running());
        let second = pipeline.run_once().await;
        assert!(matches!(second, Err(AppError::RunInProgress)));

        release.notify_one();
        let report = first.await.unwrap().unwrap();
        assert_eq!(report.outcome("dow").unwrap().status, OutcomeStatus::Written);
        assert!(!pipeline.is_running());
        assert_eq!(pipeline.stats().read().await.runs_rejected, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_status_reads_never_reject_a_run() {
        let store: SharedCloseStore = Arc::new(MemoryCloseStore::new());
        let pipeline = Arc::new(pipeline_with(
            Some(vec![SnapshotEntry::new("Dow Jones", "41,985.63")]),
            store.clone(),
            vec![dow()],
        ));

        let stop = Arc::new(AtomicBool::new(false));
        let watcher = {
            let pipeline = pipeline.clone();
            let stop = stop.clone();
            tokio::spawn(async move {
                let mut polls = 0u64;
                while !stop.load(Ordering::SeqCst) {
                    let _ = pipeline.is_running();
                    polls += 1;
                    tokio::task::yield_now().await;
                }
                polls
            })
        };

        for _ in 0..500 {
            let result = pipeline.run_at(utc(THURSDAY_AFTER), RunMode::Persist).await;
            assert!(result.is_ok(), "run rejected while status was being polled: {:?}", result.err());
        }

        stop.store(true, Ordering::SeqCst);
        assert!(watcher.await.unwrap() > 0);
        assert!(!pipeline.is_running());

        let stats = pipeline.stats();
        let stats = stats.read().await;
        assert_eq!(stats.runs_rejected, 0);
        assert_eq!(stats.runs_total, 500);
    }
}
