pub mod api;

use crate::error::Result;
use crate::services::{SharedPipeline, SharedRunStats};
use axum::{extract::FromRef, routing::get, Router};
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: SharedPipeline,
    pub run_stats: SharedRunStats,
}

impl AppState {
    pub fn new(pipeline: SharedPipeline) -> Self {
        let run_stats = pipeline.stats();
        Self { pipeline, run_stats }
    }
}

impl FromRef<AppState> for SharedPipeline {
    fn from_ref(app_state: &AppState) -> SharedPipeline {
        app_state.pipeline.clone()
    }
}

impl FromRef<AppState> for SharedRunStats {
    fn from_ref(app_state: &AppState) -> SharedRunStats {
        app_state.run_stats.clone()
    }
}

/// Build the router with all routes and layers
pub fn router(app_state: AppState) -> Router {
    // Read-only API: any origin may query it
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/", get(api::root_handler))
        .route("/health", get(api::health_handler))
        .route("/closes", get(api::list_closes_handler))
        .route("/closes/{index_key}", get(api::index_closes_handler))
        .route("/snapshot", get(api::snapshot_handler))
        .route("/trigger", get(api::trigger_handler))
        .route("/preview", get(api::preview_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Start the axum server
pub async fn serve(pipeline: SharedPipeline, port: u16) -> Result<()> {
    tracing::info!("Starting indexcloses server");

    tracing::info!("Registering routes:");
    tracing::info!("  GET /");
    tracing::info!("  GET /health");
    tracing::info!("  GET /closes");
    tracing::info!("  GET /closes/{{index_key}}");
    tracing::info!("  GET /snapshot");
    tracing::info!("  GET /trigger");
    tracing::info!("  GET /preview");

    let app = router(AppState::new(pipeline));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "Server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
