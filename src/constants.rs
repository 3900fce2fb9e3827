//! Pipeline constants
//!
//! Defaults for the fetcher, scheduler and matching rules. Everything that an
//! operator may want to change is also exposed through `SyncConfig`.

use chrono_tz::Tz;

/// Civil timezone used for every date computation ("yesterday", daily timer).
///
/// The upstream snapshot is published for Indian users, so its notion of the
/// previous session follows Indian civil days.
pub const OPERATIONAL_TIMEZONE: Tz = chrono_tz::Asia::Kolkata;

/// Default number of fetch attempts per run
pub const DEFAULT_FETCH_ATTEMPTS: u32 = 3;

/// Default fixed delay between fetch attempts
pub const DEFAULT_FETCH_RETRY_DELAY_MS: u64 = 1000;

/// Default request-level HTTP timeout
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Default local time for the daily run (HH:MM, operational timezone)
pub const DEFAULT_DAILY_RUN_TIME: &str = "06:00";

/// Default HTTP port for `serve`
pub const DEFAULT_PORT: u16 = 3000;

/// Upstream rejects requests without a browser-like user agent
pub const UPSTREAM_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Short alias used to pick the Dow Jones Industrial Average out of a snapshot.
///
/// Upstream has shipped the Dow under several display names ("Dow Jones",
/// "DOW JONES INDUSTRIAL AVERAGE", "Dow 30"), all starting with this alias.
pub const DOW_ALIAS: &str = "DOW";

/// Environment variable names
pub mod env_keys {
    pub const DATABASE_URL: &str = "DATABASE_URL";
    pub const SNAPSHOT_URL: &str = "SNAPSHOT_URL";
    pub const FETCH_ATTEMPTS: &str = "FETCH_ATTEMPTS";
    pub const FETCH_RETRY_DELAY_MS: &str = "FETCH_RETRY_DELAY_MS";
    pub const FETCH_TIMEOUT_SECS: &str = "FETCH_TIMEOUT_SECS";
    pub const DAILY_RUN_TIME: &str = "DAILY_RUN_TIME";
    pub const PORT: &str = "PORT";
    pub const TRACKED_INDICES_FILE: &str = "TRACKED_INDICES_FILE";
}
