//! Reconciliation store
//!
//! Owns every write to the close history. A candidate close is compared with
//! the latest stored close of the same index; equal values are skipped no
//! matter which date they carry, anything else is upserted on
//! `(index_key, trading_date)`.

use crate::error::Result;
use crate::models::CloseRecord;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// What `reconcile` did with a candidate record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Written,
    SkippedUnchanged,
}

/// Dedup rule: write unless the latest stored close has the same value.
///
/// The date is not compared: a stale previous close served again on a later
/// day produces no new row.
pub fn should_write(latest: Option<&CloseRecord>, candidate: &CloseRecord) -> bool {
    match latest {
        Some(last) => last.close_value != candidate.close_value,
        None => true,
    }
}

/// Persistence capability for close history
#[async_trait]
pub trait CloseStore: Send + Sync {
    /// Latest record of an index (maximum trading date)
    async fn latest(&self, index_key: &str) -> Result<Option<CloseRecord>>;

    /// Insert or overwrite the record for `(index_key, trading_date)`
    async fn upsert(&self, record: &CloseRecord) -> Result<()>;

    /// Apply the dedup rule and write as one atomic step
    async fn reconcile(&self, record: &CloseRecord) -> Result<ReconcileOutcome>;

    /// All records, newest date first, then by index key
    async fn list_all(&self) -> Result<Vec<CloseRecord>>;

    /// Records of one index, newest date first
    async fn list_for_index(&self, index_key: &str) -> Result<Vec<CloseRecord>>;

    async fn count(&self) -> Result<i64>;
}

pub type SharedCloseStore = Arc<dyn CloseStore>;

/// Reconcile one normalized close against the store
pub async fn reconcile(
    store: &dyn CloseStore,
    index_key: &str,
    trading_day: NaiveDate,
    close_value: Decimal,
) -> Result<ReconcileOutcome> {
    let record = CloseRecord::new(index_key, trading_day, close_value);
    let outcome = store.reconcile(&record).await?;

    match outcome {
        ReconcileOutcome::Written => {
            info!(index = %index_key, date = %trading_day, close = %close_value, "Close written")
        }
        ReconcileOutcome::SkippedUnchanged => {
            debug!(index = %index_key, date = %trading_day, close = %close_value, "Close unchanged, skipped")
        }
    }
    Ok(outcome)
}

/// In-memory store keyed by `(index_key, trading_day)`
#[derive(Debug, Default)]
pub struct MemoryCloseStore {
    records: RwLock<BTreeMap<(String, NaiveDate), Decimal>>,
}

impl MemoryCloseStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn latest_in(map: &BTreeMap<(String, NaiveDate), Decimal>, index_key: &str) -> Option<CloseRecord> {
        map.iter()
            .filter(|((key, _), _)| key == index_key)
            .max_by_key(|((_, date), _)| *date)
            .map(|((key, date), close)| CloseRecord::new(key, *date, *close))
    }
}

#[async_trait]
impl CloseStore for MemoryCloseStore {
    async fn latest(&self, index_key: &str) -> Result<Option<CloseRecord>> {
        let records = self.records.read().await;
        Ok(Self::latest_in(&records, index_key))
    }

    async fn upsert(&self, record: &CloseRecord) -> Result<()> {
        let mut records = self.records.write().await;
        records.insert((record.index_key.clone(), record.trading_day()), record.close_value);
        Ok(())
    }

    async fn reconcile(&self, record: &CloseRecord) -> Result<ReconcileOutcome> {
        // Holding the write lock across read and write keeps the step atomic
        let mut records = self.records.write().await;
        let latest = Self::latest_in(&records, &record.index_key);
        if !should_write(latest.as_ref(), record) {
            return Ok(ReconcileOutcome::SkippedUnchanged);
        }
        records.insert((record.index_key.clone(), record.trading_day()), record.close_value);
        Ok(ReconcileOutcome::Written)
    }

    async fn list_all(&self) -> Result<Vec<CloseRecord>> {
        let records = self.records.read().await;
        let mut all: Vec<CloseRecord> = records
            .iter()
            .map(|((key, date), close)| CloseRecord::new(key, *date, *close))
            .collect();
        all.sort_by(|a, b| {
            b.trading_date
                .cmp(&a.trading_date)
                .then_with(|| a.index_key.cmp(&b.index_key))
        });
        Ok(all)
    }

    async fn list_for_index(&self, index_key: &str) -> Result<Vec<CloseRecord>> {
        let mut all = self.list_all().await?;
        all.retain(|r| r.index_key == index_key);
        Ok(all)
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.records.read().await.len() as i64)
    }
}
