//! Data models for the switchboard.
//!
//! This module re-exports all model types used throughout the crate.

pub mod audit;
pub mod connection;
pub mod query;

// Re-export commonly used types
pub use audit::{LogRecord, TIMESTAMP_FORMAT};
pub use connection::{BackendKind, ConnectionConfig, ConnectionInfo, DRIVER_KEY, URL_KEY};
pub use query::{ColumnMetadata, Params, QueryParam, StatementResult};
