use crate::error::{AppError, Result};
use crate::models::CloseRecord;
use crate::services::close_store::{CloseStore, ReconcileOutcome};
use crate::utils::format_date;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Database schema version for migrations
const DB_SCHEMA_VERSION: &str = "1";

const SELECT_COLUMNS: &str = "SELECT index_key, trade_date, close FROM index_closes";

/// SQLite-backed close history
#[derive(Debug, Clone)]
pub struct SqliteCloseStore {
    pool: SqlitePool,
}

impl SqliteCloseStore {
    /// Connect using a connection string such as `sqlite://data/closes.db`
    pub async fn connect(database_url: &str) -> Result<Self> {
        info!("Connecting to SQLite database: {}", database_url);

        let connect_options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| AppError::Config(format!("Invalid DATABASE_URL '{}': {}", database_url, e)))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal) // Concurrent readers while the worker writes
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;

        let store = Self { pool };
        store.initialize_database().await?;

        info!("SQLite database initialized successfully");
        Ok(store)
    }

    /// Create schema if missing
    async fn initialize_database(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS index_closes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                index_key TEXT NOT NULL,
                trade_date TEXT NOT NULL,
                close TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        let indexes = vec![
            // Natural key: one close per index per trading day
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_index_closes_key_date ON index_closes(index_key, trade_date)",
            "CREATE INDEX IF NOT EXISTS idx_index_closes_date ON index_closes(trade_date DESC)",
        ];
        for index in indexes {
            sqlx::query(index).execute(&self.pool).await?;
        }

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)")
            .bind(DB_SCHEMA_VERSION)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Close the database connection pool
    pub async fn close(&self) {
        self.pool.close().await;
        info!("SQLite database connection pool closed");
    }

    fn row_to_record(row: SqliteRow) -> Result<CloseRecord> {
        let index_key: String = row.try_get("index_key")?;
        let trade_date: String = row.try_get("trade_date")?;
        let close: String = row.try_get("close")?;

        let day = NaiveDate::parse_from_str(&trade_date, "%Y-%m-%d")
            .map_err(|e| AppError::Database(format!("Corrupt trade_date '{}': {}", trade_date, e)))?;
        let close_value = Decimal::from_str(&close)
            .map_err(|e| AppError::Database(format!("Corrupt close '{}': {}", close, e)))?;

        Ok(CloseRecord::new(&index_key, day, close_value))
    }
}

/// Canonical text form so equal decimals compare equal in SQL
fn close_text(value: &Decimal) -> String {
    value.normalize().to_string()
}

fn date_text(record: &CloseRecord) -> String {
    format_date(record.trading_day())
}

#[async_trait]
impl CloseStore for SqliteCloseStore {
    async fn latest(&self, index_key: &str) -> Result<Option<CloseRecord>> {
        let row = sqlx::query(&format!(
            "{} WHERE index_key = ?1 ORDER BY trade_date DESC LIMIT 1",
            SELECT_COLUMNS
        ))
        .bind(index_key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_record).transpose()
    }

    async fn upsert(&self, record: &CloseRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO index_closes (index_key, trade_date, close)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(index_key, trade_date)
            DO UPDATE SET close = excluded.close, updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&record.index_key)
        .bind(date_text(record))
        .bind(close_text(&record.close_value))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn reconcile(&self, record: &CloseRecord) -> Result<ReconcileOutcome> {
        // One conditional statement: no row is touched when the latest stored
        // close of the index already has this value.
        let result = sqlx::query(
            r#"
            INSERT INTO index_closes (index_key, trade_date, close)
            SELECT ?1, ?2, ?3
            WHERE NOT EXISTS (
                SELECT 1 FROM index_closes
                WHERE index_key = ?1
                  AND close = ?3
                  AND trade_date = (SELECT MAX(trade_date) FROM index_closes WHERE index_key = ?1)
            )
            ON CONFLICT(index_key, trade_date)
            DO UPDATE SET close = excluded.close, updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&record.index_key)
        .bind(date_text(record))
        .bind(close_text(&record.close_value))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            Ok(ReconcileOutcome::Written)
        } else {
            Ok(ReconcileOutcome::SkippedUnchanged)
        }
    }

    async fn list_all(&self) -> Result<Vec<CloseRecord>> {
        let rows = sqlx::query(&format!("{} ORDER BY trade_date DESC, index_key ASC", SELECT_COLUMNS))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Self::row_to_record).collect()
    }

    async fn list_for_index(&self, index_key: &str) -> Result<Vec<CloseRecord>> {
        let rows = sqlx::query(&format!(
            "{} WHERE index_key = ?1 ORDER BY trade_date DESC",
            SELECT_COLUMNS
        ))
        .bind(index_key)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_record).collect()
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM index_closes")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::close_store::reconcile;
    use tempfile::{tempdir, TempDir};

    async fn test_store() -> (SqliteCloseStore, TempDir) {
        let temp_dir = tempdir().unwrap();
        let url = format!("sqlite://{}", temp_dir.path().join("closes.db").display());
        let store = SqliteCloseStore::connect(&url).await.unwrap();
        (store, temp_dir)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[tokio::test]
    async fn test_database_creation() {
        let (store, _dir) = test_store().await;
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.latest("dow").await.unwrap().is_none());
        store.close().await;
    }

    #[tokio::test]
    async fn test_reconcile_idempotent() {
        let (store, _dir) = test_store().await;

        let first = reconcile(&store, "dow", date(2025, 3, 13), dec("41985.63")).await.unwrap();
        let second = reconcile(&store, "dow", date(2025, 3, 13), dec("41985.63")).await.unwrap();

        assert_eq!(first, ReconcileOutcome::Written);
        assert_eq!(second, ReconcileOutcome::SkippedUnchanged);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reconcile_value_only_rule() {
        let (store, _dir) = test_store().await;

        reconcile(&store, "dow", date(2025, 3, 13), dec("41985.63")).await.unwrap();
        // Same value on a later date: skipped
        let stale = reconcile(&store, "dow", date(2025, 3, 14), dec("41985.630")).await.unwrap();
        assert_eq!(stale, ReconcileOutcome::SkippedUnchanged);

        // New value on a later date: appended
        let fresh = reconcile(&store, "dow", date(2025, 3, 17), dec("41488.19")).await.unwrap();
        assert_eq!(fresh, ReconcileOutcome::Written);

        // Corrected value for an existing date: overwritten in place
        let corrected = reconcile(&store, "dow", date(2025, 3, 17), dec("41490")).await.unwrap();
        assert_eq!(corrected, ReconcileOutcome::Written);

        assert_eq!(store.count().await.unwrap(), 2);
        let latest = store.latest("dow").await.unwrap().unwrap();
        assert_eq!(latest.trading_day(), date(2025, 3, 17));
        assert_eq!(latest.close_value, dec("41490"));
    }

    #[tokio::test]
    async fn test_listing_order() {
        let (store, _dir) = test_store().await;
        store.upsert(&CloseRecord::new("sp500", date(2025, 3, 12), dec("5599.30"))).await.unwrap();
        store.upsert(&CloseRecord::new("dow", date(2025, 3, 12), dec("41350.93"))).await.unwrap();
        store.upsert(&CloseRecord::new("dow", date(2025, 3, 13), dec("40813.57"))).await.unwrap();

        let all = store.list_all().await.unwrap();
        let keys: Vec<(&str, NaiveDate)> = all.iter().map(|r| (r.index_key.as_str(), r.trading_day())).collect();
        assert_eq!(
            keys,
            vec![("dow", date(2025, 3, 13)), ("dow", date(2025, 3, 12)), ("sp500", date(2025, 3, 12))]
        );
        assert_eq!(all[2].close_value, dec("5599.3"));

        let dow = store.list_for_index("dow").await.unwrap();
        assert_eq!(dow.len(), 2);
        assert_eq!(dow[0].close_value, dec("40813.57"));
    }

    #[tokio::test]
    async fn test_data_survives_reconnect() {
        let temp_dir = tempdir().unwrap();
        let url = format!("sqlite://{}", temp_dir.path().join("closes.db").display());

        let store = SqliteCloseStore::connect(&url).await.unwrap();
        store.upsert(&CloseRecord::new("dax", date(2025, 3, 13), dec("22676.41"))).await.unwrap();
        store.close().await;

        let reopened = SqliteCloseStore::connect(&url).await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
        let outcome = reconcile(&reopened, "dax", date(2025, 3, 14), dec("22676.41")).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::SkippedUnchanged);
    }
}
