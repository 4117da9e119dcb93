use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("The database is not connected; the pool must be connected before handles are acquired.")]
    NotConnected,

    #[error("Gave up connecting to the database after {attempts} attempts: {last_error}")]
    ConnectionExhausted { attempts: u32, last_error: String },

    #[error("Timed out after {0:?} waiting for a free database connection.")]
    AcquireTimeout(Duration),

    #[error("Connection attempt timed out after {0:?}.")]
    ConnectTimeout(Duration),

    #[error("Request '{operation}' timed out after {timeout:?}.")]
    RequestTimeout { operation: String, timeout: Duration },

    #[error("The connection pool has been shut down.")]
    Closed,

    #[error("Invalid procedure name '{0}'.")]
    InvalidProcedureName(String),

    #[error("Invalid call argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to decode column '{column}': {message}")]
    Decode { column: String, message: String },

    #[error("Database error: {0}")]
    Query(#[from] sqlx::Error),

    #[error("Database backend error: {0}")]
    Backend(String),
}

impl DbError {
    /// Errors raised by the pool lifecycle rather than by a statement.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            DbError::NotConnected
                | DbError::ConnectionExhausted { .. }
                | DbError::AcquireTimeout(_)
                | DbError::ConnectTimeout(_)
                | DbError::Closed
        )
    }
}
