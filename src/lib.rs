//! SQL Switchboard Library
//!
//! Named connections to heterogeneous SQL backends (MySQL, PostgreSQL,
//! SQLite) behind one interface, with an audit trail of every statement
//! executed and transaction control applied across all connections at once.

pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use config::Config;
pub use db::{Switchboard, TransactionMode};
pub use error::{DbError, DbResult};
