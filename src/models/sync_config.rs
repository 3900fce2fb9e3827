use crate::constants::{
    env_keys, DEFAULT_DAILY_RUN_TIME, DEFAULT_FETCH_ATTEMPTS, DEFAULT_FETCH_RETRY_DELAY_MS,
    DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_PORT,
};
use crate::error::{AppError, Result};
use crate::models::TrackedIndices;
use crate::utils::{parse_or, parse_run_time, require_value};
use chrono::NaiveTime;
use std::time::Duration;

/// Configuration for the sync pipeline, built once at startup
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Store connection string (e.g. "sqlite://data/closes.db")
    pub database_url: String,

    /// Upstream snapshot endpoint
    pub snapshot_url: String,

    /// Fetch attempts per run (at least 1)
    pub fetch_attempts: u32,

    /// Fixed delay between fetch attempts
    pub fetch_retry_delay: Duration,

    /// Request-level HTTP timeout
    pub fetch_timeout: Duration,

    /// Local time of the daily run in the operational timezone
    pub daily_run_time: NaiveTime,

    /// HTTP port for `serve`
    pub port: u16,

    /// Indices processed by every run
    pub tracked_indices: TrackedIndices,
}

impl SyncConfig {
    /// Build the configuration from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = require_value(env_keys::DATABASE_URL, lookup(env_keys::DATABASE_URL))?;
        let snapshot_url = require_value(env_keys::SNAPSHOT_URL, lookup(env_keys::SNAPSHOT_URL))?;

        if !snapshot_url.starts_with("http://") && !snapshot_url.starts_with("https://") {
            return Err(AppError::Config(format!(
                "Invalid {}: must start with http:// or https://, got: '{}'",
                env_keys::SNAPSHOT_URL,
                snapshot_url
            )));
        }

        let fetch_attempts: u32 = parse_or(
            env_keys::FETCH_ATTEMPTS,
            lookup(env_keys::FETCH_ATTEMPTS),
            DEFAULT_FETCH_ATTEMPTS,
        )?;
        let retry_delay_ms: u64 = parse_or(
            env_keys::FETCH_RETRY_DELAY_MS,
            lookup(env_keys::FETCH_RETRY_DELAY_MS),
            DEFAULT_FETCH_RETRY_DELAY_MS,
        )?;
        let timeout_secs: u64 = parse_or(
            env_keys::FETCH_TIMEOUT_SECS,
            lookup(env_keys::FETCH_TIMEOUT_SECS),
            DEFAULT_FETCH_TIMEOUT_SECS,
        )?;
        let run_time = lookup(env_keys::DAILY_RUN_TIME)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DAILY_RUN_TIME.to_string());
        let port: u16 = parse_or(env_keys::PORT, lookup(env_keys::PORT), DEFAULT_PORT)?;

        let tracked_indices = match lookup(env_keys::TRACKED_INDICES_FILE).filter(|s| !s.trim().is_empty()) {
            Some(path) => TrackedIndices::from_file(path.trim())?,
            None => TrackedIndices::defaults(),
        };

        Ok(Self {
            database_url,
            snapshot_url,
            fetch_attempts: fetch_attempts.max(1),
            fetch_retry_delay: Duration::from_millis(retry_delay_ms),
            fetch_timeout: Duration::from_secs(timeout_secs.max(1)),
            daily_run_time: parse_run_time(&run_time)?,
            port,
            tracked_indices,
        })
    }
}
