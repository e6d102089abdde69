use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use logflow_config::PermanentFailurePolicy;
use logflow_core::{LogSource, NormalizedMessage, ProcessedLogRecord, RecordKey, TenantId};
use logflow_security::Redactor;
use logflow_storage::{DeadLetter, LogStore, MemoryStore, StorageError, StoreLayout};
use time::OffsetDateTime;

use crate::Processor;

/// Memory store whose first `failures` record writes fail
pub struct FlakyStore {
    inner: MemoryStore,
    failures: AtomicUsize,
}

impl FlakyStore {
    pub fn new(failures: usize) -> Self {
        Self {
            inner: MemoryStore::default(),
            failures: AtomicUsize::new(failures),
        }
    }

    pub fn always_failing() -> Self {
        Self::new(usize::MAX)
    }
}

#[async_trait]
impl LogStore for FlakyStore {
    async fn put_record(
        &self,
        key: &RecordKey,
        record: &ProcessedLogRecord,
    ) -> logflow_storage::Result<()> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining.saturating_sub(1), Ordering::SeqCst);
            return Err(StorageError::Io(std::io::Error::other("store unavailable")));
        }
        self.inner.put_record(key, record).await
    }

    async fn get_record(&self, key: &RecordKey) -> logflow_storage::Result<Option<ProcessedLogRecord>> {
        self.inner.get_record(key).await
    }

    async fn list_records(
        &self,
        tenant_id: &TenantId,
    ) -> logflow_storage::Result<Vec<(String, ProcessedLogRecord)>> {
        self.inner.list_records(tenant_id).await
    }

    async fn put_dead_letter(&self, letter: &DeadLetter) -> logflow_storage::Result<()> {
        self.inner.put_dead_letter(letter).await
    }

    async fn list_dead_letters(&self) -> logflow_storage::Result<Vec<DeadLetter>> {
        self.inner.list_dead_letters().await
    }

    fn layout(&self) -> &StoreLayout {
        self.inner.layout()
    }
}

pub fn message(tenant: &str, log_id: &str, text: &str) -> NormalizedMessage {
    NormalizedMessage {
        tenant_id: TenantId::new(tenant),
        log_id: log_id.to_string(),
        text: text.to_string(),
        source: LogSource::JsonUpload,
        received_at: OffsetDateTime::now_utc(),
    }
}

pub fn processor(store: Arc<dyn LogStore>, rate_per_char: f64) -> Processor {
    Processor::new(
        store,
        Redactor::default(),
        rate_per_char,
        PermanentFailurePolicy::DeadLetter,
    )
}
