use swo_core::DbError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PgError {
    #[error("postgres error: {message}")]
    Postgres {
        message: String,
        code: Option<String>,
    },

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("invalid connection string: {0}")]
    InvalidConnectionString(String),

    #[error("table {0} does not exist")]
    TableNotFound(String),
}

impl From<tokio_postgres::Error> for PgError {
    fn from(e: tokio_postgres::Error) -> Self {
        // Extract database error details if available
        if let Some(db_err) = e.as_db_error() {
            let message = format!(
                "{}: {} (code: {})",
                db_err.severity(),
                db_err.message(),
                db_err.code().code()
            );
            PgError::Postgres {
                message,
                code: Some(db_err.code().code().to_string()),
            }
        } else if e.is_closed() {
            PgError::Connection(e.to_string())
        } else {
            PgError::Postgres {
                message: e.to_string(),
                code: None,
            }
        }
    }
}

impl From<PgError> for DbError {
    fn from(e: PgError) -> Self {
        match e {
            PgError::Postgres { message, code } => DbError::Query { message, code },
            PgError::Connection(message) => DbError::Connection(message),
            other => DbError::query(other.to_string()),
        }
    }
}

/// Convert a driver error into the engine's error type, keeping the SQLSTATE.
pub(crate) fn db_error(e: tokio_postgres::Error) -> DbError {
    PgError::from(e).into()
}

pub type PgResult<T> = Result<T, PgError>;
