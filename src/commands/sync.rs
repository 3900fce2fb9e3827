use crate::commands::{build_pipeline, format_close};
use crate::error::Result;
use crate::models::{RunMode, RunReport, SyncConfig};

pub async fn run(config: SyncConfig, preview: bool) {
    if preview {
        println!("🔍 Previewing sync (nothing will be written)\n");
    } else {
        println!("🔄 Syncing index closes\n");
    }

    match sync(&config, preview).await {
        Ok(report) => print_report(&report),
        Err(e) => {
            eprintln!("❌ Sync failed: {}", e);
            std::process::exit(1);
        }
    }
}

async fn sync(config: &SyncConfig, preview: bool) -> Result<RunReport> {
    let pipeline = build_pipeline(config).await?;
    if preview {
        pipeline.preview().await
    } else {
        pipeline.run_once().await
    }
}

fn print_report(report: &RunReport) {
    println!("📦 Snapshot entries: {}", report.snapshot_entries);
    println!("═══════════════════════════════════════════════════════════");

    for outcome in &report.outcomes {
        let icon = if outcome.status.is_failure() { "⚠️ " } else { "✅" };
        let date = outcome
            .trading_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());
        let close = outcome
            .close_value
            .as_ref()
            .map(format_close)
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{} {:<10} {:<13} {:<12} {:>12}",
            icon,
            outcome.index_key,
            format!("{:?}", outcome.status).to_lowercase(),
            date,
            close
        );
        if let Some(detail) = &outcome.detail {
            println!("   {}", detail);
        }
    }

    println!("═══════════════════════════════════════════════════════════");
    if report.mode == RunMode::Preview {
        println!("💡 {} records would be written", report.preview_records.len());
    } else {
        println!("💡 {} outcomes, {} failures", report.outcomes.len(), report.failures());
    }
}
