//! Upstream snapshot client
//!
//! One GET per run against the configured snapshot URL, retried a bounded
//! number of times with a fixed delay. Transport failures (connect errors,
//! timeouts, non-2xx statuses, unreadable bodies) are retried. A response that
//! arrives but does not look like a snapshot is a data-shape problem and ends
//! the fetch immediately.

use crate::constants::UPSTREAM_USER_AGENT;
use crate::error::{AppError, Result};
use crate::models::{SnapshotCollection, SnapshotEntry, SyncConfig};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Anything that can produce the entries of one snapshot
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch_snapshot(&self) -> Result<SnapshotCollection>;
}

/// HTTP client for the upstream global-indices snapshot
pub struct SnapshotClient {
    url: String,
    attempts: u32,
    retry_delay: Duration,
    client: reqwest::Client,
}

impl SnapshotClient {
    pub fn new(url: &str, attempts: u32, retry_delay: Duration, timeout: Duration) -> Result<Self> {
        let url = url.trim().to_string();

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(UPSTREAM_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| AppError::Network(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            "Created SnapshotClient: url='{}', attempts={}, retry_delay_ms={}",
            url,
            attempts.max(1),
            retry_delay.as_millis()
        );

        Ok(Self {
            url,
            attempts: attempts.max(1),
            retry_delay,
            client,
        })
    }

    pub fn from_config(config: &SyncConfig) -> Result<Self> {
        Self::new(
            &config.snapshot_url,
            config.fetch_attempts,
            config.fetch_retry_delay,
            config.fetch_timeout,
        )
    }

    /// Single request, no retry
    async fn fetch_once(&self) -> Result<SnapshotCollection> {
        debug!("Sending snapshot request to: {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| AppError::Network(format!("Snapshot request failed: {} (url: {})", e, self.url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Network(format!("Upstream returned error status {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::Network(format!("Failed to read response body: {}", e)))?;

        parse_snapshot_body(&body)
    }
}

#[async_trait]
impl SnapshotSource for SnapshotClient {
    async fn fetch_snapshot(&self) -> Result<SnapshotCollection> {
        let entries = with_retry(self.attempts, self.retry_delay, || self.fetch_once()).await?;
        info!("Fetched snapshot with {} entries", entries.len());
        Ok(entries)
    }
}

/// Run `op` up to `attempts` times, sleeping `delay` between attempts.
///
/// Shape errors are returned at once. After the last attempt the last error is
/// returned unchanged.
pub async fn with_retry<T, F, Fut>(attempts: u32, delay: Duration, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        if attempt > 1 {
            info!(
                "Snapshot retry: attempt {}/{}, waiting {}ms",
                attempt,
                attempts,
                delay.as_millis()
            );
            sleep(delay).await;
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(AppError::Shape(msg)) => {
                error!(attempt, "Snapshot payload rejected, not retrying: {}", msg);
                return Err(AppError::Shape(msg));
            }
            Err(e) => {
                warn!(attempt, max_attempts = attempts, error = %e, "Snapshot fetch attempt failed");
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| AppError::Network("No fetch attempt was made".to_string())))
}

/// Validate an upstream body: `{ "success": true, "data": [ {name, prev_close}, ... ] }`
pub fn parse_snapshot_body(body: &str) -> Result<SnapshotCollection> {
    let json: Value = serde_json::from_str(body).map_err(|e| {
        let preview: String = body.chars().take(200).collect();
        AppError::Shape(format!("Response is not JSON: {} (body: {})", e, preview))
    })?;

    match json.get("success").and_then(Value::as_bool) {
        Some(true) => {}
        Some(false) => {
            let message = json.get("message").and_then(Value::as_str).unwrap_or("no message");
            return Err(AppError::Shape(format!("Upstream reported success=false: {}", message)));
        }
        None => return Err(AppError::Shape("Missing boolean 'success' flag".to_string())),
    }

    let data = json
        .get("data")
        .filter(|d| d.is_array())
        .ok_or_else(|| AppError::Shape("Missing 'data' array".to_string()))?;

    serde_json::from_value::<Vec<SnapshotEntry>>(data.clone())
        .map_err(|e| AppError::Shape(format!("Invalid snapshot entry: {}", e)))
}
