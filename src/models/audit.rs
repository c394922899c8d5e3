//! Audit record model.

use crate::models::Params;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Display format for record timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// One successfully executed statement.
///
/// `connection_name` is a plain reference by name; the connection may have
/// been replaced or removed since.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Position in the owning log, starting at 0.
    pub sequence: u64,
    /// Submission time, whole seconds.
    pub timestamp: DateTime<Utc>,
    pub connection_name: String,
    pub statement_text: String,
    pub parameters: Params,
}

impl LogRecord {
    /// Create a record stamped with the current time. The sequence is assigned
    /// by the log on append.
    pub fn new(
        connection_name: impl Into<String>,
        statement_text: impl Into<String>,
        parameters: Params,
    ) -> Self {
        Self::at(Utc::now(), connection_name, statement_text, parameters)
    }

    /// Create a record with an explicit timestamp (truncated to seconds).
    pub fn at(
        timestamp: DateTime<Utc>,
        connection_name: impl Into<String>,
        statement_text: impl Into<String>,
        parameters: Params,
    ) -> Self {
        Self {
            sequence: 0,
            timestamp: timestamp.trunc_subsecs(0),
            connection_name: connection_name.into(),
            statement_text: statement_text.into(),
            parameters,
        }
    }

    pub fn formatted_timestamp(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }
}

impl std::fmt::Display for LogRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.formatted_timestamp(),
            self.connection_name,
            self.statement_text
        )
    }
}
