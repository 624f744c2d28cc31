//! Error types for stats query operations

use thiserror::Error;

/// Result type for stats operations
pub type StatsResult<T> = Result<T, StatsError>;

/// Failures a producer, the store or the analytics client can report
#[derive(Error, Debug)]
pub enum StatsError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Analytics API error: {0}")]
    Analytics(String),

    #[error("Malformed analytics response: {0}")]
    MalformedResponse(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Timeout error: operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StatsError {
    /// Create a new database error
    pub fn database<S: Into<String>>(message: S) -> Self {
        Self::Database(message.into())
    }

    /// Create a new connection error
    pub fn connection<S: Into<String>>(message: S) -> Self {
        Self::Connection(message.into())
    }

    /// Create a new analytics error
    pub fn analytics<S: Into<String>>(message: S) -> Self {
        Self::Analytics(message.into())
    }

    /// Create a new malformed-response error
    pub fn malformed<S: Into<String>>(message: S) -> Self {
        Self::MalformedResponse(message.into())
    }

    /// Create a new serialization error
    pub fn serialization<S: Into<String>>(message: S) -> Self {
        Self::Serialization(message.into())
    }

    /// Create a new timeout error
    pub fn timeout(timeout_ms: u64) -> Self {
        Self::Timeout { timeout_ms }
    }

    /// Create a new configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Get the error category for monitoring/metrics
    pub fn category(&self) -> &'static str {
        match self {
            StatsError::Database(_) => "database",
            StatsError::Connection(_) => "connection",
            StatsError::Analytics(_) => "analytics",
            StatsError::MalformedResponse(_) => "malformed_response",
            StatsError::Serialization(_) => "serialization",
            StatsError::Timeout { .. } => "timeout",
            StatsError::Configuration(_) => "configuration",
            StatsError::Internal(_) => "internal",
            StatsError::Io(_) => "io",
            StatsError::Json(_) => "json",
        }
    }
}

impl From<tokio_postgres::Error> for StatsError {
    fn from(err: tokio_postgres::Error) -> Self {
        match err.as_db_error() {
            Some(db) => StatsError::Database(format!("{}: {}", db.code().code(), db.message())),
            None if err.is_closed() => StatsError::Connection(err.to_string()),
            None => StatsError::Database(err.to_string()),
        }
    }
}

impl From<deadpool_postgres::PoolError> for StatsError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        match err {
            deadpool_postgres::PoolError::Backend(err) => err.into(),
            deadpool_postgres::PoolError::Timeout(kind) => StatsError::Connection(format!(
                "timed out waiting for a database connection ({:?})",
                kind
            )),
            other => StatsError::Connection(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for StatsError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            StatsError::MalformedResponse(err.to_string())
        } else {
            StatsError::Analytics(err.to_string())
        }
    }
}
