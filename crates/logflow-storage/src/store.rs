use async_trait::async_trait;
use logflow_core::{ProcessedLogRecord, RecordKey, TenantId};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::Result;

/// Collection names making up a record path:
/// `{tenants_collection}/{tenant_id}/{logs_collection}/{log_id}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    pub tenants_collection: String,
    pub logs_collection: String,
}

impl StoreLayout {
    pub fn new(tenants_collection: impl Into<String>, logs_collection: impl Into<String>) -> Self {
        Self {
            tenants_collection: tenants_collection.into(),
            logs_collection: logs_collection.into(),
        }
    }

    pub fn record_path(&self, key: &RecordKey) -> String {
        format!(
            "{}/{}/{}/{}",
            self.tenants_collection, key.tenant_id, self.logs_collection, key.log_id
        )
    }
}

impl Default for StoreLayout {
    fn default() -> Self {
        Self::new("tenants", "processed_logs")
    }
}

/// A message the worker gave up on, kept for manual inspection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub id: String,
    /// Transport message id, when the delivery carried one
    #[serde(default)]
    pub message_id: Option<String>,
    pub reason: String,
    /// Raw delivery bytes, lossily decoded as UTF-8
    pub payload: String,
    #[serde(with = "time::serde::rfc3339")]
    pub received_at: OffsetDateTime,
}

/// Tenant-partitioned document store.
///
/// Every record operation is addressed by tenant first; there is no way to
/// reach a record without naming its owner.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Full-document overwrite at `key`. Writing the same key twice leaves one record.
    async fn put_record(&self, key: &RecordKey, record: &ProcessedLogRecord) -> Result<()>;

    async fn get_record(&self, key: &RecordKey) -> Result<Option<ProcessedLogRecord>>;

    /// All records of one tenant as `(log_id, record)`, ordered by log id
    async fn list_records(&self, tenant_id: &TenantId) -> Result<Vec<(String, ProcessedLogRecord)>>;

    async fn put_dead_letter(&self, letter: &DeadLetter) -> Result<()>;

    async fn list_dead_letters(&self) -> Result<Vec<DeadLetter>>;

    fn layout(&self) -> &StoreLayout;
}
