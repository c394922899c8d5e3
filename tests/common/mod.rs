//! Shared helpers for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sql_switchboard::DbResult;
use sql_switchboard::db::{AdapterTable, BackendAdapter, Connection};
use sql_switchboard::error::DbError;
use sql_switchboard::models::{BackendKind, ConnectionConfig, QueryParam, StatementResult};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Fresh in-memory SQLite configuration.
pub fn memory() -> ConnectionConfig {
    ConnectionConfig::new("sqlite").with("path", ":memory:")
}

/// Read an integer cell that SQLite may report as a number or text.
pub fn as_i64(value: Option<&JsonValue>) -> Option<i64> {
    match value? {
        JsonValue::Number(n) => n.as_i64(),
        JsonValue::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Statements a scripted connection has accepted, shared with the test.
pub type Journal = Arc<Mutex<Vec<String>>>;

/// Adapter whose connections accept every statement except the ones listed
/// in the `fail` option (separated by `|`). An optional `delay_ms` option
/// slows every statement down.
pub struct ScriptedAdapter {
    kind: BackendKind,
    journal: Journal,
}

impl ScriptedAdapter {
    pub fn new(kind: BackendKind) -> (Self, Journal) {
        let journal = Journal::default();
        (
            Self {
                kind,
                journal: Arc::clone(&journal),
            },
            journal,
        )
    }
}

#[async_trait]
impl BackendAdapter for ScriptedAdapter {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn connect(&self, config: &ConnectionConfig) -> DbResult<Box<dyn Connection>> {
        if config.get("refuse").is_some() {
            return Err(DbError::connection("scripted refusal", "none"));
        }
        let fail_on = config
            .get("fail")
            .map(|s| s.split('|').map(str::to_string).collect())
            .unwrap_or_default();
        let delay = config
            .get("delay_ms")
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis);
        Ok(Box::new(ScriptedConnection {
            kind: self.kind,
            label: config.get("label").unwrap_or("scripted").to_string(),
            fail_on,
            delay,
            journal: Arc::clone(&self.journal),
            closed: false,
        }))
    }
}

struct ScriptedConnection {
    kind: BackendKind,
    label: String,
    fail_on: Vec<String>,
    delay: Option<Duration>,
    journal: Journal,
    closed: bool,
}

#[async_trait]
impl Connection for ScriptedConnection {
    fn backend_kind(&self) -> BackendKind {
        self.kind
    }

    async fn execute(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<StatementResult> {
        if self.closed {
            return Err(DbError::backend_execution("connection closed", None));
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_on.iter().any(|s| s == sql) {
            return Err(DbError::backend_execution(
                format!("scripted failure on {}", self.label),
                Some("XX000".to_string()),
            ));
        }
        self.journal
            .lock()
            .unwrap()
            .push(format!("{}: {} {:?}", self.label, sql, params));
        Ok(StatementResult::affected(0))
    }

    async fn close(&mut self) -> DbResult<()> {
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Built-in adapters plus a scripted adapter registered for Oracle.
pub fn tables_with_scripted_oracle() -> (AdapterTable, Journal) {
    let (adapter, journal) = ScriptedAdapter::new(BackendKind::Oracle);
    let mut table = AdapterTable::with_defaults();
    table.register(Arc::new(adapter));
    (table, journal)
}

/// Scripted Oracle connection configuration.
pub fn scripted(label: &str) -> ConnectionConfig {
    ConnectionConfig::new("oracle").with("label", label)
}
