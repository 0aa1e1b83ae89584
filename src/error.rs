//! Error type shared by the stores, the DDL executors and configuration loading.
//!
//! None of these errors is fatal to the host: the decision engine and the
//! statement hook log them and carry on with the next item.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AutoIndexError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("SQL execution error '{0}': {1}")]
    SqlExecutionError(String, String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Scheduler unavailable: {0}")]
    SchedulerUnavailable(String),
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for AutoIndexError {
    fn from(err: sqlx::Error) -> Self {
        AutoIndexError::DatabaseError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AutoIndexError>;
