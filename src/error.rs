//! Error types for the switchboard.
//!
//! Every failure propagates to the immediate caller. Backend failures keep the
//! driver's own message and SQLSTATE so callers see exactly what the database
//! reported.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Unknown backend kind: '{backend_kind}'")]
    UnknownBackendKind { backend_kind: String },

    #[error("No adapter registered for backend '{backend_kind}'")]
    AdapterUnavailable { backend_kind: String },

    #[error("Connection not found: {connection_name}")]
    ConnectionNotFound { connection_name: String },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Backend execution error: {message}")]
    BackendExecution {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
    },

    #[error("Timeout: {operation} exceeded {limit_ms}ms")]
    Timeout { operation: String, limit_ms: u64 },

    #[error(
        "'{statement}' failed on connection '{failed_connection}' \
         after being applied to {applied:?}: {source}"
    )]
    PartialTransaction {
        statement: String,
        /// Connections that already received the statement, in visit order.
        applied: Vec<String>,
        failed_connection: String,
        #[source]
        source: Box<DbError>,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

impl DbError {
    /// Create an unknown backend kind error.
    pub fn unknown_backend_kind(backend_kind: impl Into<String>) -> Self {
        Self::UnknownBackendKind {
            backend_kind: backend_kind.into(),
        }
    }

    /// Create an adapter unavailable error.
    pub fn adapter_unavailable(backend_kind: impl Into<String>) -> Self {
        Self::AdapterUnavailable {
            backend_kind: backend_kind.into(),
        }
    }

    /// Create a connection not found error.
    pub fn connection_not_found(connection_name: impl Into<String>) -> Self {
        Self::ConnectionNotFound {
            connection_name: connection_name.into(),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a backend execution error with optional SQL state.
    pub fn backend_execution(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::BackendExecution {
            message: message.into(),
            sql_state,
        }
    }

    /// Create a timeout error for an operation bounded by `limit`.
    pub fn timeout(operation: impl Into<String>, limit: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            limit_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// The error a partial fan-out failure wraps, or `self` for every other kind.
    pub fn root_cause(&self) -> &DbError {
        match self {
            Self::PartialTransaction { source, .. } => source.root_cause(),
            _ => self,
        }
    }
}

/// Convert sqlx errors raised while a statement runs.
///
/// Anything the database itself rejected becomes `BackendExecution` with its
/// SQLSTATE. Losing the connection mid-statement (I/O, TLS, protocol or a
/// crashed worker) is also an execution failure and keeps the driver's
/// message. Failures while opening a connection are mapped separately by the
/// adapters.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the connection configuration and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::backend_execution(db_err.message(), code)
            }
            other => DbError::backend_execution(other.to_string(), None),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;
