use crate::commands::build_pipeline;
use crate::models::SyncConfig;
use crate::server;
use crate::services::next_daily_run;
use crate::worker;
use chrono::Utc;

pub async fn run(config: SyncConfig, port: Option<u16>) {
    let port = port.unwrap_or(config.port);
    println!("🚀 Starting indexcloses server on port {}", port);
    println!("🗄️  Database: {}", config.database_url);
    println!("🌐 Snapshot URL: {}", config.snapshot_url);
    println!(
        "📋 Tracking {} indices: {}",
        config.tracked_indices.len(),
        config.tracked_indices.keys().join(", ")
    );

    let pipeline = match build_pipeline(&config).await {
        Ok(pipeline) => pipeline,
        Err(e) => {
            eprintln!("❌ Failed to initialize pipeline: {}", e);
            std::process::exit(1);
        }
    };

    let next_run = next_daily_run(Utc::now(), config.daily_run_time);
    println!(
        "⏰ Daily run at {} (next: {})",
        config.daily_run_time.format("%H:%M"),
        next_run.to_rfc3339()
    );

    let worker_pipeline = pipeline.clone();
    let run_time = config.daily_run_time;
    tokio::spawn(async move {
        worker::run_daily_worker(worker_pipeline, run_time).await;
    });

    if let Err(e) = server::serve(pipeline, port).await {
        eprintln!("❌ Server error: {}", e);
        std::process::exit(1);
    }
}
