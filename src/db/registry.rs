//! Connection registry.
//!
//! Owns the mapping from connection name to live handle. Names keep the
//! position of their first registration, which is the order transaction
//! fan-out visits them in.

use crate::db::adapter::{AdapterTable, ConnectionHandle};
use crate::error::{DbError, DbResult};
use crate::models::{BackendKind, ConnectionConfig, ConnectionInfo};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

#[derive(Clone)]
struct ConnectionEntry {
    name: String,
    handle: ConnectionHandle,
    /// Kept for listing only; dispatch goes through the handle.
    backend_kind: BackendKind,
}

#[derive(Clone)]
pub struct ConnectionRegistry {
    // A registry holds a handful of names, a Vec keeps insertion order cheaply
    entries: Arc<RwLock<Vec<ConnectionEntry>>>,
    adapters: Arc<AdapterTable>,
}

impl ConnectionRegistry {
    /// Create a registry using the built-in adapters.
    pub fn new() -> Self {
        Self::with_adapters(AdapterTable::with_defaults())
    }

    /// Create a registry with an explicit adapter table.
    pub fn with_adapters(adapters: AdapterTable) -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
            adapters: Arc::new(adapters),
        }
    }

    pub fn adapters(&self) -> &AdapterTable {
        &self.adapters
    }

    /// Check if a connection exists.
    pub async fn has_connection(&self, name: &str) -> bool {
        let entries = self.entries.read().await;
        entries.iter().any(|e| e.name == name)
    }

    /// Connect through the adapter selected by `config` and store the handle
    /// under `name`.
    ///
    /// An existing entry under the same name is replaced in place and its
    /// handle closed once the new one is stored.
    pub async fn add_connection(
        &self,
        name: &str,
        config: ConnectionConfig,
    ) -> DbResult<ConnectionInfo> {
        if name.is_empty() {
            return Err(DbError::invalid_input("Connection name cannot be empty"));
        }

        let backend_kind = config.backend_kind()?;
        let adapter = self.adapters.get(backend_kind)?;

        info!(
            connection = %name,
            backend = %backend_kind,
            url = ?config.masked_url(),
            "Connecting to database"
        );

        let connection = adapter.connect(&config).await?;
        let handle: ConnectionHandle = Arc::new(Mutex::new(connection));

        // Swap under the lock, close outside it
        let replaced = {
            let mut entries = self.entries.write().await;
            let entry = ConnectionEntry {
                name: name.to_string(),
                handle,
                backend_kind,
            };
            match entries.iter_mut().find(|e| e.name == name) {
                Some(existing) => Some(std::mem::replace(existing, entry)),
                None => {
                    entries.push(entry);
                    None
                }
            }
        };

        let was_replaced = replaced.is_some();
        if let Some(old) = replaced {
            info!(
                connection = %name,
                previous_backend = %old.backend_kind,
                "Replaced existing connection"
            );
            close_handle(&old).await;
        }

        info!(connection = %name, backend = %backend_kind, "Connected successfully");

        Ok(ConnectionInfo {
            name: name.to_string(),
            backend_kind,
            replaced: was_replaced,
        })
    }

    /// Get the handle registered under `name`.
    pub async fn get_connection(&self, name: &str) -> DbResult<ConnectionHandle> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| Arc::clone(&e.handle))
            .ok_or_else(|| DbError::connection_not_found(name))
    }

    /// Get the backend kind a connection was created with.
    pub async fn backend_kind(&self, name: &str) -> DbResult<BackendKind> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.backend_kind)
            .ok_or_else(|| DbError::connection_not_found(name))
    }

    /// List all connection names in registration order.
    pub async fn list_connections(&self) -> Vec<String> {
        let entries = self.entries.read().await;
        entries.iter().map(|e| e.name.clone()).collect()
    }

    /// Get the number of registered connections.
    pub async fn connection_count(&self) -> usize {
        let entries = self.entries.read().await;
        entries.len()
    }

    /// Remove a connection and close its handle.
    ///
    /// Returns `Ok(false)` if nothing was registered under `name`. A failure
    /// to close is returned after the entry is already gone.
    pub async fn remove_connection(&self, name: &str) -> DbResult<bool> {
        let removed = {
            let mut entries = self.entries.write().await;
            entries
                .iter()
                .position(|e| e.name == name)
                .map(|idx| entries.remove(idx))
        };

        match removed {
            Some(entry) => {
                info!(connection = %name, "Closing connection");
                entry.handle.lock().await.close().await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Close all connections and clear the registry.
    pub async fn close_all(&self) {
        let drained: Vec<ConnectionEntry> = {
            let mut entries = self.entries.write().await;
            entries.drain(..).collect()
        };
        for entry in &drained {
            info!(connection = %entry.name, "Closing connection");
            close_handle(entry).await;
        }
        info!("All connections closed");
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("adapters", &self.adapters)
            .finish_non_exhaustive()
    }
}

/// Close a handle that is leaving the registry. Failures are logged; the
/// entry is already gone.
async fn close_handle(entry: &ConnectionEntry) {
    let mut connection = entry.handle.lock().await;
    if let Err(e) = connection.close().await {
        warn!(connection = %entry.name, error = %e, "Failed to close connection");
    }
}
