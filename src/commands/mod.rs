pub mod serve;
pub mod show;
pub mod sync;

use crate::error::Result;
use crate::models::SyncConfig;
use crate::services::{SharedPipeline, SnapshotClient, SqliteCloseStore, SyncPipeline};
use std::sync::Arc;

/// Wire the SQLite store and upstream client into a pipeline
pub async fn build_pipeline(config: &SyncConfig) -> Result<SharedPipeline> {
    let store = SqliteCloseStore::connect(&config.database_url).await?;
    let client = SnapshotClient::from_config(config)?;

    Ok(Arc::new(SyncPipeline::new(
        Arc::new(client),
        Arc::new(store),
        Arc::new(config.tracked_indices.clone()),
    )))
}

fn format_close(value: &rust_decimal::Decimal) -> String {
    value.round_dp(2).to_string()
}
