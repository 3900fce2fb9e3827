pub mod close_parser;
pub mod close_store;
pub mod database;
pub mod entry_resolver;
pub mod pipeline;
pub mod run_stats;
pub mod snapshot_client;
pub mod trading_day;

pub use close_parser::parse_close;
pub use close_store::{reconcile, should_write, CloseStore, MemoryCloseStore, ReconcileOutcome, SharedCloseStore};
pub use database::SqliteCloseStore;
pub use entry_resolver::{resolve_entry, MatchKind};
pub use pipeline::{SharedPipeline, SyncPipeline};
pub use run_stats::{LastRunStatus, RunStats, SharedRunStats};
pub use snapshot_client::{parse_snapshot_body, with_retry, SnapshotClient, SnapshotSource};
pub use trading_day::{next_daily_run, previous_civil_day, resolve_previous_trading_day, until_next_run, TradingDay};
