use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),

    /// Transport-level failure talking to the upstream. Retried by the fetcher.
    #[error("Network error: {0}")]
    Network(String),

    /// Upstream answered but the payload is not a usable snapshot. Never retried.
    #[error("Malformed snapshot: {0}")]
    Shape(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("A sync run is already in progress")]
    RunInProgress,

    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Errors that end a whole run rather than a single index.
    pub fn is_fatal_to_run(&self) -> bool {
        matches!(self, AppError::Network(_) | AppError::Shape(_))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Parse(format!("JSON error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
