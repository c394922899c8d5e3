//! Switchboard context.
//!
//! Bundles one registry, one audit log and the components that share them.
//! Independent instances do not see each other's connections or records.

use crate::db::adapter::{AdapterTable, ConnectionHandle};
use crate::db::audit::AuditLog;
use crate::db::dispatcher::QueryDispatcher;
use crate::db::registry::ConnectionRegistry;
use crate::db::transaction::{FanOutReport, TransactionCoordinator, TransactionMode};
use crate::error::DbResult;
use crate::models::{ConnectionConfig, ConnectionInfo, LogRecord, Params, StatementResult};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Switchboard {
    registry: ConnectionRegistry,
    log: AuditLog,
    dispatcher: QueryDispatcher,
    coordinator: TransactionCoordinator,
}

impl Switchboard {
    /// Create an empty switchboard using the built-in adapters.
    pub fn new() -> Self {
        Self::with_adapters(AdapterTable::with_defaults())
    }

    /// Create an empty switchboard with an explicit adapter table.
    pub fn with_adapters(adapters: AdapterTable) -> Self {
        Self::build(ConnectionRegistry::with_adapters(adapters), AuditLog::new(), None)
    }

    /// Bound every statement run through this switchboard. Registered
    /// connections and the log carry over.
    pub fn with_statement_timeout(self, limit: Option<Duration>) -> Self {
        Self::build(self.registry, self.log, limit)
    }

    fn build(registry: ConnectionRegistry, log: AuditLog, limit: Option<Duration>) -> Self {
        let dispatcher =
            QueryDispatcher::new(registry.clone(), log.clone()).with_statement_timeout(limit);
        let coordinator = TransactionCoordinator::new(dispatcher.clone());
        Self {
            registry,
            log,
            dispatcher,
            coordinator,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn dispatcher(&self) -> &QueryDispatcher {
        &self.dispatcher
    }

    pub fn coordinator(&self) -> &TransactionCoordinator {
        &self.coordinator
    }

    pub async fn has_connection(&self, name: &str) -> bool {
        self.registry.has_connection(name).await
    }

    pub async fn add_connection(
        &self,
        name: &str,
        config: ConnectionConfig,
    ) -> DbResult<ConnectionInfo> {
        self.registry.add_connection(name, config).await
    }

    pub async fn get_connection(&self, name: &str) -> DbResult<ConnectionHandle> {
        self.registry.get_connection(name).await
    }

    pub async fn list_connections(&self) -> Vec<String> {
        self.registry.list_connections().await
    }

    pub async fn remove_connection(&self, name: &str) -> DbResult<bool> {
        self.registry.remove_connection(name).await
    }

    pub async fn close_all(&self) {
        self.registry.close_all().await
    }

    pub async fn execute(
        &self,
        name: &str,
        sql: &str,
        params: impl Into<Params>,
    ) -> DbResult<StatementResult> {
        self.dispatcher.execute(name, sql, params).await
    }

    pub async fn begin(&self) -> DbResult<Vec<String>> {
        self.coordinator.begin().await
    }

    pub async fn commit(&self) -> DbResult<Vec<String>> {
        self.coordinator.commit().await
    }

    pub async fn rollback(&self) -> DbResult<Vec<String>> {
        self.coordinator.rollback().await
    }

    pub async fn apply_transaction_control(&self, mode: TransactionMode) -> DbResult<Vec<String>> {
        self.coordinator.apply_transaction_control(mode).await
    }

    pub async fn apply_transaction_control_concurrent(
        &self,
        mode: TransactionMode,
    ) -> FanOutReport {
        self.coordinator
            .apply_transaction_control_concurrent(mode)
            .await
    }

    pub fn log(&self) -> &AuditLog {
        &self.log
    }

    /// Copy of every record appended so far, in execution order.
    pub async fn records(&self) -> Vec<LogRecord> {
        self.log.all().await
    }
}

impl Default for Switchboard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> ConnectionConfig {
        ConnectionConfig::new("sqlite").with("path", ":memory:")
    }

    #[tokio::test]
    async fn test_instances_are_independent() {
        let first = Switchboard::new();
        let second = Switchboard::new();

        first.add_connection("a", memory()).await.unwrap();
        first.execute("a", "SELECT 1", ()).await.unwrap();

        assert!(first.has_connection("a").await);
        assert!(!second.has_connection("a").await);
        assert_eq!(first.records().await.len(), 1);
        assert!(second.records().await.is_empty());
    }

    #[tokio::test]
    async fn test_statement_timeout_keeps_state() {
        let switchboard = Switchboard::new();
        switchboard.add_connection("a", memory()).await.unwrap();
        switchboard.execute("a", "SELECT 1", ()).await.unwrap();

        let switchboard = switchboard.with_statement_timeout(Some(Duration::from_secs(30)));
        assert_eq!(
            switchboard.dispatcher().statement_timeout(),
            Some(Duration::from_secs(30))
        );
        assert!(switchboard.has_connection("a").await);
        assert_eq!(switchboard.records().await.len(), 1);

        switchboard.execute("a", "SELECT 2", ()).await.unwrap();
        assert_eq!(switchboard.log().len().await, 2);
    }
}
