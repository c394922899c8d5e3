//! Append-only audit log of executed statements.

use crate::models::LogRecord;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Ordered history of every statement the dispatcher executed successfully.
///
/// Records are never mutated or removed; readers get copies.
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    records: Arc<RwLock<Vec<LogRecord>>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `record` at the end of the log and return its sequence number.
    pub async fn append(&self, mut record: LogRecord) -> u64 {
        let mut records = self.records.write().await;
        let sequence = records.len() as u64;
        record.sequence = sequence;
        records.push(record);
        sequence
    }

    /// Snapshot of the full log in execution order.
    pub async fn all(&self) -> Vec<LogRecord> {
        self.records.read().await.clone()
    }

    /// Records sent to `connection_name`, in execution order.
    pub async fn records_for(&self, connection_name: &str) -> Vec<LogRecord> {
        let records = self.records.read().await;
        records
            .iter()
            .filter(|r| r.connection_name == connection_name)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}
