use crate::error::AppError;
use crate::services::{until_next_run, SharedPipeline};
use chrono::{NaiveTime, Utc};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// Daily timer: sleep until the configured local run time, then fire one run.
///
/// A failed or rejected run is logged and the worker waits for the next slot;
/// the loop never exits.
#[instrument(skip(pipeline))]
pub async fn run(pipeline: SharedPipeline, run_time: NaiveTime) {
    info!("Starting daily worker - run time {} (operational timezone)", run_time.format("%H:%M"));

    let mut iteration_count = 0u64;

    loop {
        let wait = until_next_run(Utc::now(), run_time);
        info!(
            next_run_in_secs = wait.as_secs(),
            "Daily worker: Sleeping until next run"
        );
        sleep(wait).await;

        iteration_count += 1;
        let loop_start = std::time::Instant::now();
        info!(iteration = iteration_count, "Daily worker: Starting run");

        match pipeline.run_once().await {
            Ok(report) => {
                info!(
                    iteration = iteration_count,
                    run_id = %report.run_id,
                    outcomes = report.outcomes.len(),
                    failures = report.failures(),
                    duration_secs = loop_start.elapsed().as_secs_f64(),
                    "Daily worker: Run completed"
                );
            }
            Err(AppError::RunInProgress) => {
                warn!(iteration = iteration_count, "Daily worker: Run already in progress, waiting for next slot");
            }
            Err(e) => {
                error!(iteration = iteration_count, error = %e, "Daily worker: Run aborted");
            }
        }
    }
}
