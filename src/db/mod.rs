//! Database access layer.
//!
//! This module provides:
//! - Backend adapters and the connection handle trait
//! - The connection registry
//! - Statement dispatch with auditing
//! - Transaction-control fan-out
//! - Parameter binding and result decoding

pub mod adapter;
pub mod audit;
pub mod backends;
pub mod context;
pub mod dispatcher;
pub mod params;
pub mod placeholders;
pub mod registry;
pub mod transaction;
pub mod types;

pub use adapter::{AdapterTable, BackendAdapter, Connection, ConnectionHandle};
pub use audit::AuditLog;
pub use backends::{MySqlAdapter, PgSqlAdapter, SqliteAdapter};
pub use context::Switchboard;
pub use dispatcher::QueryDispatcher;
pub use registry::ConnectionRegistry;
pub use transaction::{FanOutReport, TransactionCoordinator, TransactionMode};
