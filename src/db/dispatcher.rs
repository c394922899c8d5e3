//! Query dispatch.
//!
//! Resolves a connection name, runs one statement on its handle and records
//! the statement in the audit log once the backend has accepted it.

use crate::db::audit::AuditLog;
use crate::db::placeholders::resolve_params;
use crate::db::registry::ConnectionRegistry;
use crate::error::{DbError, DbResult};
use crate::models::{LogRecord, Params, StatementResult};
use chrono::Utc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Executes statements against named connections and audits them.
#[derive(Debug, Clone)]
pub struct QueryDispatcher {
    registry: ConnectionRegistry,
    log: AuditLog,
    statement_timeout: Option<Duration>,
}

impl QueryDispatcher {
    /// Create a dispatcher with no statement timeout.
    pub fn new(registry: ConnectionRegistry, log: AuditLog) -> Self {
        Self {
            registry,
            log,
            statement_timeout: None,
        }
    }

    /// Bound every statement by `limit`. A statement that runs out of time
    /// fails with `Timeout` and is not logged.
    pub fn with_statement_timeout(mut self, limit: Option<Duration>) -> Self {
        self.statement_timeout = limit;
        self
    }

    pub fn statement_timeout(&self) -> Option<Duration> {
        self.statement_timeout
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn log(&self) -> &AuditLog {
        &self.log
    }

    /// Execute `sql` on the connection registered as `name`.
    ///
    /// On success exactly one record is appended before this returns; on any
    /// failure nothing is appended and the error is returned as is.
    pub async fn execute(
        &self,
        name: &str,
        sql: &str,
        params: impl Into<Params>,
    ) -> DbResult<StatementResult> {
        let params = params.into();
        let handle = self.registry.get_connection(name).await?;
        let submitted_at = Utc::now();
        let start = Instant::now();

        debug!(
            connection = %name,
            sql = %sql,
            params = params.len(),
            "Executing statement"
        );

        // Held until the record is appended, so per-connection log order
        // matches execution order
        let mut connection = handle.lock().await;
        let (bound_sql, values) = resolve_params(sql, &params, connection.backend_kind())?;

        let outcome = match self.statement_timeout {
            Some(limit) => match timeout(limit, connection.execute(&bound_sql, &values)).await {
                Ok(result) => result,
                Err(_) => Err(DbError::timeout("statement execution", limit)),
            },
            None => connection.execute(&bound_sql, &values).await,
        };

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                warn!(connection = %name, sql = %sql, error = %e, "Statement failed");
                return Err(e);
            }
        };

        let sequence = self
            .log
            .append(LogRecord::at(submitted_at, name, sql, params))
            .await;
        drop(connection);

        debug!(
            connection = %name,
            sequence = sequence,
            rows = result.row_count(),
            rows_affected = result.rows_affected,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Statement executed"
        );

        Ok(result)
    }
}
