//! Backend adapter seam.
//!
//! An adapter turns a [`ConnectionConfig`] into a live [`Connection`]. The
//! registry never talks to a driver directly: it looks the adapter up by
//! backend kind in an [`AdapterTable`] that is fixed when the registry is
//! built.

use crate::db::backends::{MySqlAdapter, PgSqlAdapter, SqliteAdapter};
use crate::error::{DbError, DbResult};
use crate::models::{BackendKind, ConnectionConfig, QueryParam, StatementResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A live connection to one backend.
///
/// Statements arrive with positional bind values already laid out in the
/// backend's placeholder style.
#[async_trait]
pub trait Connection: Send {
    fn backend_kind(&self) -> BackendKind;

    /// Prepare `sql`, bind `params` and execute it.
    async fn execute(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<StatementResult>;

    /// Close the connection. Later calls to `execute` fail.
    async fn close(&mut self) -> DbResult<()>;

    fn is_closed(&self) -> bool;
}

/// Factory for connections of one backend family.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Open a connection. The adapter validates its own configuration keys.
    async fn connect(&self, config: &ConnectionConfig) -> DbResult<Box<dyn Connection>>;
}

/// Shared handle to a registered connection. One statement runs at a time.
pub type ConnectionHandle = Arc<Mutex<Box<dyn Connection>>>;

/// Registration table mapping backend kinds to adapters.
#[derive(Clone, Default)]
pub struct AdapterTable {
    adapters: HashMap<BackendKind, Arc<dyn BackendAdapter>>,
}

impl AdapterTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with the built-in MySQL, PostgreSQL and SQLite adapters.
    ///
    /// Oracle has no built-in driver; register one with [`AdapterTable::register`].
    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        table.register(Arc::new(MySqlAdapter));
        table.register(Arc::new(PgSqlAdapter));
        table.register(Arc::new(SqliteAdapter));
        table
    }

    /// Register an adapter under its own kind, returning any adapter it replaces.
    pub fn register(
        &mut self,
        adapter: Arc<dyn BackendAdapter>,
    ) -> Option<Arc<dyn BackendAdapter>> {
        self.adapters.insert(adapter.kind(), adapter)
    }

    /// Look up the adapter for `kind`.
    pub fn get(&self, kind: BackendKind) -> DbResult<Arc<dyn BackendAdapter>> {
        self.adapters
            .get(&kind)
            .cloned()
            .ok_or_else(|| DbError::adapter_unavailable(kind.tag()))
    }

    pub fn supports(&self, kind: BackendKind) -> bool {
        self.adapters.contains_key(&kind)
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<BackendKind> {
        let mut kinds: Vec<_> = self.adapters.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

impl std::fmt::Debug for AdapterTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterTable")
            .field("kinds", &self.kinds())
            .finish()
    }
}
