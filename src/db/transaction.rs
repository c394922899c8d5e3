//! Transaction control fan-out.
//!
//! The coordinator keeps no transaction state of its own. It sends a control
//! statement to every registered connection through the dispatcher, so each
//! one is logged like any other statement. Whether a connection is actually
//! in the expected state is the caller's concern.

use crate::db::dispatcher::QueryDispatcher;
use crate::error::{DbError, DbResult};
use crate::models::Params;
use futures_util::future::join_all;
use std::str::FromStr;
use tracing::{info, warn};

pub const TRANSACTION_BEGIN: &str = "BEGIN;";
pub const TRANSACTION_COMMIT: &str = "COMMIT;";
pub const TRANSACTION_ROLLBACK: &str = "ROLLBACK;";

/// Transaction-control statement kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionMode {
    Begin,
    Commit,
    Rollback,
}

impl TransactionMode {
    /// The literal statement sent to each backend.
    pub fn statement(&self) -> &'static str {
        match self {
            Self::Begin => TRANSACTION_BEGIN,
            Self::Commit => TRANSACTION_COMMIT,
            Self::Rollback => TRANSACTION_ROLLBACK,
        }
    }
}

impl FromStr for TransactionMode {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_end_matches(';').to_ascii_uppercase().as_str() {
            "BEGIN" => Ok(Self::Begin),
            "COMMIT" => Ok(Self::Commit),
            "ROLLBACK" => Ok(Self::Rollback),
            _ => Err(DbError::invalid_input(format!(
                "Unknown transaction mode '{s}', expected BEGIN, COMMIT or ROLLBACK"
            ))),
        }
    }
}

impl std::fmt::Display for TransactionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.statement())
    }
}

/// Per-connection outcome of a concurrent fan-out.
#[derive(Debug)]
pub struct FanOutReport {
    pub mode: TransactionMode,
    /// One entry per snapshot connection, in snapshot order.
    pub outcomes: Vec<(String, DbResult<()>)>,
}

impl FanOutReport {
    /// Connections that accepted the statement.
    pub fn succeeded(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, r)| r.is_ok())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Connections that rejected the statement, with their errors.
    pub fn failed(&self) -> Vec<(&str, &DbError)> {
        self.outcomes
            .iter()
            .filter_map(|(name, r)| r.as_ref().err().map(|e| (name.as_str(), e)))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(|(_, r)| r.is_ok())
    }

    /// Collapse into the sequential error shape: the first failure wrapped
    /// with every connection that succeeded, or the bare failure when none did.
    pub fn into_result(self) -> DbResult<Vec<String>> {
        let mut applied = Vec::new();
        let mut first_failure = None;
        for (name, outcome) in self.outcomes {
            match outcome {
                Ok(()) => applied.push(name),
                Err(e) if first_failure.is_none() => first_failure = Some((name, e)),
                Err(_) => {}
            }
        }
        match first_failure {
            None => Ok(applied),
            Some((failed_connection, source)) => {
                Err(partial_failure(self.mode.statement(), applied, failed_connection, source))
            }
        }
    }
}

/// Wrap `source` with the connections that already took the statement.
/// Nothing was applied when the very first connection failed, so the
/// backend's error is returned as is.
fn partial_failure(
    statement: &str,
    applied: Vec<String>,
    failed_connection: String,
    source: DbError,
) -> DbError {
    if applied.is_empty() {
        return source;
    }
    DbError::PartialTransaction {
        statement: statement.to_string(),
        applied,
        failed_connection,
        source: Box::new(source),
    }
}

/// Applies transaction-control statements to every registered connection.
#[derive(Debug, Clone)]
pub struct TransactionCoordinator {
    dispatcher: QueryDispatcher,
}

impl TransactionCoordinator {
    pub fn new(dispatcher: QueryDispatcher) -> Self {
        Self { dispatcher }
    }

    /// Send `mode` to each connection registered at call time, one at a time
    /// in registration order.
    ///
    /// The first failure stops the loop: earlier connections have received the
    /// statement, later ones have not. The error lists the former and wraps
    /// the backend's own error; a failure on the first connection is returned
    /// unwrapped. Returns the visited names on success.
    pub async fn apply_transaction_control(
        &self,
        mode: TransactionMode,
    ) -> DbResult<Vec<String>> {
        let statement = mode.statement();
        let snapshot = self.dispatcher.registry().list_connections().await;
        let mut applied = Vec::with_capacity(snapshot.len());

        for name in snapshot {
            if let Err(e) = self
                .dispatcher
                .execute(&name, statement, Params::none())
                .await
            {
                warn!(
                    statement = %statement,
                    connection = %name,
                    applied = ?applied,
                    error = %e,
                    "Transaction control stopped part way"
                );
                return Err(partial_failure(statement, applied, name, e));
            }
            applied.push(name);
        }

        info!(
            statement = %statement,
            connections = applied.len(),
            "Transaction control applied"
        );
        Ok(applied)
    }

    /// Best-effort variant: send `mode` to every snapshot connection
    /// concurrently and report each outcome. Never stops early.
    pub async fn apply_transaction_control_concurrent(
        &self,
        mode: TransactionMode,
    ) -> FanOutReport {
        let statement = mode.statement();
        let snapshot = self.dispatcher.registry().list_connections().await;

        let results = join_all(snapshot.iter().map(|name| async move {
            self.dispatcher
                .execute(name, statement, Params::none())
                .await
                .map(|_| ())
        }))
        .await;

        let report = FanOutReport {
            mode,
            outcomes: snapshot.into_iter().zip(results).collect(),
        };

        if report.is_complete() {
            info!(
                statement = %statement,
                connections = report.outcomes.len(),
                "Transaction control applied concurrently"
            );
        } else {
            warn!(
                statement = %statement,
                failed = ?report.failed().iter().map(|(n, _)| *n).collect::<Vec<_>>(),
                "Concurrent transaction control incomplete"
            );
        }
        report
    }

    pub async fn begin(&self) -> DbResult<Vec<String>> {
        self.apply_transaction_control(TransactionMode::Begin).await
    }

    pub async fn commit(&self) -> DbResult<Vec<String>> {
        self.apply_transaction_control(TransactionMode::Commit).await
    }

    pub async fn rollback(&self) -> DbResult<Vec<String>> {
        self.apply_transaction_control(TransactionMode::Rollback).await
    }
}
