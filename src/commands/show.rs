use crate::commands::format_close;
use crate::error::{AppError, Result};
use crate::models::SyncConfig;
use crate::services::{CloseStore, SqliteCloseStore};

pub async fn run(config: SyncConfig, index: Option<String>) {
    println!("📊 Stored Index Closes\n");

    if let Err(e) = show(&config, index.as_deref()).await {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn show(config: &SyncConfig, index: Option<&str>) -> Result<()> {
    let store = SqliteCloseStore::connect(&config.database_url).await?;

    let records = match index {
        Some(key) => {
            if !config.tracked_indices.contains(key) {
                return Err(AppError::NotFound(format!(
                    "Index '{}' is not tracked (tracked: {})",
                    key,
                    config.tracked_indices.keys().join(", ")
                )));
            }
            store.list_for_index(key).await?
        }
        None => store.list_all().await?,
    };

    if records.is_empty() {
        println!("⚠️  No closes stored yet. Run 'sync' first.");
        return Ok(());
    }

    for record in &records {
        println!(
            "   {:<10} {}  {:>12}",
            record.index_key,
            record.trading_day(),
            format_close(&record.close_value)
        );
    }
    println!("\n📈 Total records: {}", records.len());

    store.close().await;
    Ok(())
}
