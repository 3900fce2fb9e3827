mod close_record;
mod market_calendar;
mod run_report;
mod snapshot;
mod sync_config;
mod tracked_index;

pub use close_record::{CloseRecord, PreviewRecord};
pub use market_calendar::{easter_sunday, is_weekend, MarketCalendar};
pub use run_report::{IndexOutcome, OutcomeStatus, RunMode, RunReport};
pub use snapshot::{SnapshotCollection, SnapshotEntry};
pub use sync_config::SyncConfig;
pub use tracked_index::{TrackedIndex, TrackedIndices};
