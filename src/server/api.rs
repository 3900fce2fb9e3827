use crate::error::AppError;
use crate::models::{CloseRecord, OutcomeStatus, SnapshotEntry};
use crate::server::AppState;
use crate::services::{RunStats, SharedPipeline};
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

/// List envelope: `{ success, count, data }`
#[derive(Debug, Serialize)]
pub struct ListResponse<T: Serialize> {
    pub success: bool,
    pub count: usize,
    pub data: Vec<T>,
}

impl<T: Serialize> ListResponse<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self {
            success: true,
            count: data.len(),
            data,
        }
    }
}

/// Health payload for GET /health
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_secs: i64,
    pub run_in_progress: bool,
    pub tracked_indices: Vec<String>,
    pub records_count: Option<i64>,
    pub run_stats: RunStats,
    pub current_system_time: String,
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::RunInProgress => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            e if e.is_fatal_to_run() => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Request failed");
        }
        (
            status,
            Json(serde_json::json!({
                "success": false,
                "message": self.to_string(),
            })),
        )
            .into_response()
    }
}

/// GET / - Service name and endpoint listing
pub async fn root_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "indexcloses",
        "endpoints": [
            "GET /health",
            "GET /closes",
            "GET /closes/{index_key}",
            "GET /snapshot",
            "GET /trigger",
            "GET /preview",
        ],
    }))
}

/// GET /health - Run statistics and store size
#[instrument(skip(app_state))]
pub async fn health_handler(State(app_state): State<AppState>) -> impl IntoResponse {
    debug!("Received request for health stats");

    // Short timeout so a busy writer never stalls the health check
    let run_stats = match tokio::time::timeout(
        tokio::time::Duration::from_millis(100),
        app_state.run_stats.read(),
    )
    .await
    {
        Ok(stats) => stats.clone(),
        Err(_) => {
            warn!("Run stats lock timeout, using defaults");
            RunStats::default()
        }
    };

    let pipeline = &app_state.pipeline;
    let records_count = match pipeline.store().count().await {
        Ok(count) => Some(count),
        Err(e) => {
            warn!(error = %e, "Failed to count stored records");
            None
        }
    };

    let health = HealthResponse {
        status: if records_count.is_some() { "ok" } else { "degraded" },
        uptime_secs: run_stats.uptime_secs(),
        run_in_progress: pipeline.is_running(),
        tracked_indices: pipeline.indices().keys().into_iter().map(String::from).collect(),
        records_count,
        run_stats,
        current_system_time: Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(health))
}

/// GET /closes - Every stored close, newest date first
#[instrument(skip(pipeline))]
pub async fn list_closes_handler(
    State(pipeline): State<SharedPipeline>,
) -> Result<Json<ListResponse<CloseRecord>>, AppError> {
    let records = pipeline.store().list_all().await?;
    info!(count = records.len(), "Returning all closes");
    Ok(Json(ListResponse::new(records)))
}

/// GET /closes/{index_key} - Close history of one index.
///
/// History outlives the tracked set: a key dropped from config still serves
/// what was stored for it. 404 only when the key is untracked and has nothing.
#[instrument(skip(pipeline))]
pub async fn index_closes_handler(
    State(pipeline): State<SharedPipeline>,
    Path(index_key): Path<String>,
) -> Result<Json<ListResponse<CloseRecord>>, AppError> {
    let records = pipeline.store().list_for_index(&index_key).await?;
    if records.is_empty() && !pipeline.indices().contains(&index_key) {
        return Err(AppError::NotFound(format!(
            "Index '{}' is not tracked and has no stored closes",
            index_key
        )));
    }

    info!(index = %index_key, count = records.len(), "Returning index closes");
    Ok(Json(ListResponse::new(records)))
}

/// GET /snapshot - Current upstream entries, fetched on demand and never stored
#[instrument(skip(pipeline))]
pub async fn snapshot_handler(
    State(pipeline): State<SharedPipeline>,
) -> Result<Json<ListResponse<SnapshotEntry>>, AppError> {
    let entries = pipeline.fetch_raw().await?;
    info!(count = entries.len(), "Returning raw snapshot");
    Ok(Json(ListResponse::new(entries)))
}

/// GET /trigger - Run the pipeline now and return its report
#[instrument(skip(pipeline))]
pub async fn trigger_handler(State(pipeline): State<SharedPipeline>) -> Result<impl IntoResponse, AppError> {
    info!("Manual run triggered");
    let report = pipeline.run_once().await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": format!(
            "Run completed: {} written, {} unchanged, {} failed",
            report.count(OutcomeStatus::Written),
            report.count(OutcomeStatus::Unchanged),
            report.failures()
        ),
        "data": report,
    })))
}

/// GET /preview - Records a run would write right now, without writing them
#[instrument(skip(pipeline))]
pub async fn preview_handler(State(pipeline): State<SharedPipeline>) -> Result<impl IntoResponse, AppError> {
    let report = pipeline.preview().await?;
    info!(count = report.preview_records.len(), "Returning preview");

    Ok(Json(serde_json::json!({
        "success": true,
        "count": report.preview_records.len(),
        "data": report.preview_records,
        "outcomes": report.outcomes,
    })))
}
