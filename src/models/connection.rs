//! Connection-related data models.
//!
//! This module defines backend kinds and the configuration map handed to
//! backend adapters.

use crate::error::{DbError, DbResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Configuration key naming the backend family.
pub const DRIVER_KEY: &str = "driver";

/// Configuration key holding a full connection URL.
pub const URL_KEY: &str = "url";

/// Supported backend families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Includes MariaDB
    MySql,
    Sqlite,
    PgSql,
    Oracle,
}

impl BackendKind {
    pub const ALL: [BackendKind; 4] = [
        BackendKind::MySql,
        BackendKind::Sqlite,
        BackendKind::PgSql,
        BackendKind::Oracle,
    ];

    /// Canonical tag used in configuration maps.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
            Self::PgSql => "pgsql",
            Self::Oracle => "oracle",
        }
    }

    /// Get the display name for this backend.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::MySql => "MySQL",
            Self::Sqlite => "SQLite",
            Self::PgSql => "PostgreSQL",
            Self::Oracle => "Oracle",
        }
    }

    /// Get the default port for this backend.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Self::MySql => Some(3306),
            Self::PgSql => Some(5432),
            Self::Oracle => Some(1521),
            Self::Sqlite => None,
        }
    }

    /// Parse the backend kind from a connection URL scheme.
    pub fn from_connection_string(connection_string: &str) -> Option<Self> {
        let lower = connection_string.to_lowercase();
        if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
            Some(Self::PgSql)
        } else if lower.starts_with("mysql://") || lower.starts_with("mariadb://") {
            Some(Self::MySql)
        } else if lower.starts_with("sqlite:") {
            Some(Self::Sqlite)
        } else if lower.starts_with("oracle://") {
            Some(Self::Oracle)
        } else {
            None
        }
    }
}

impl FromStr for BackendKind {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Self::MySql),
            "sqlite" => Ok(Self::Sqlite),
            "pgsql" | "postgres" | "postgresql" => Ok(Self::PgSql),
            "oracle" => Ok(Self::Oracle),
            _ => Err(DbError::unknown_backend_kind(s)),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Key/value configuration passed through unchanged to a backend adapter.
///
/// The `driver` key selects the adapter; every other key belongs to the
/// adapter, which validates it on connect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionConfig {
    options: BTreeMap<String, String>,
}

impl ConnectionConfig {
    /// Create a configuration for the given backend tag.
    pub fn new(driver: impl Into<String>) -> Self {
        Self::default().with(DRIVER_KEY, driver)
    }

    /// Create a configuration from a connection URL, inferring the driver
    /// from the scheme.
    pub fn from_url(url: impl Into<String>) -> DbResult<Self> {
        let url = url.into();
        let kind = BackendKind::from_connection_string(&url).ok_or_else(|| {
            let scheme = url.split(':').next().unwrap_or_default();
            DbError::unknown_backend_kind(scheme)
        })?;
        Ok(Self::new(kind.tag()).with(URL_KEY, url))
    }

    /// Set an option, returning the updated configuration.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Set an option in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.options.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// First present value among several alias keys.
    pub fn get_any(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|k| self.get(k))
    }

    /// Raw driver tag, if set.
    pub fn driver(&self) -> Option<&str> {
        self.get(DRIVER_KEY)
    }

    /// Resolve the driver tag to a backend kind.
    pub fn backend_kind(&self) -> DbResult<BackendKind> {
        match self.driver() {
            Some(driver) => driver.parse(),
            None => Err(DbError::unknown_backend_kind("")),
        }
    }

    pub fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }

    /// Display-safe rendering of the URL option (credentials masked).
    pub fn masked_url(&self) -> Option<String> {
        let url = self.get(URL_KEY)?;
        if let Some(at_pos) = url.find('@') {
            if let Some(colon_pos) = url[..at_pos].rfind(':') {
                // Only a password colon, not the scheme separator
                if !url[colon_pos..].starts_with("://") {
                    let prefix = &url[..colon_pos + 1];
                    let suffix = &url[at_pos..];
                    return Some(format!("{}****{}", prefix, suffix));
                }
            }
        }
        Some(url.to_string())
    }
}

impl<K, V> FromIterator<(K, V)> for ConnectionConfig
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            options: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Information about a registered connection, returned after registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionInfo {
    pub name: String,
    pub backend_kind: BackendKind,
    /// True when the registration displaced an existing handle.
    pub replaced: bool,
}
