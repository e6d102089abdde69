//! In-memory store for tests and ephemeral runs

use async_trait::async_trait;
use dashmap::DashMap;
use logflow_core::{ProcessedLogRecord, RecordKey, TenantId};

use crate::Result;
use crate::store::{DeadLetter, LogStore, StoreLayout};

#[derive(Default)]
pub struct MemoryStore {
    layout: StoreLayout,
    records: DashMap<RecordKey, ProcessedLogRecord>,
    dead_letters: DashMap<String, DeadLetter>,
}

impl MemoryStore {
    pub fn new(layout: StoreLayout) -> Self {
        Self {
            layout,
            records: DashMap::new(),
            dead_letters: DashMap::new(),
        }
    }

    /// Total records across all tenants
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Every record path currently stored
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .records
            .iter()
            .map(|entry| self.layout.record_path(entry.key()))
            .collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl LogStore for MemoryStore {
    async fn put_record(&self, key: &RecordKey, record: &ProcessedLogRecord) -> Result<()> {
        self.records.insert(key.clone(), record.clone());
        Ok(())
    }

    async fn get_record(&self, key: &RecordKey) -> Result<Option<ProcessedLogRecord>> {
        Ok(self.records.get(key).map(|entry| entry.value().clone()))
    }

    async fn list_records(&self, tenant_id: &TenantId) -> Result<Vec<(String, ProcessedLogRecord)>> {
        let mut records: Vec<_> = self
            .records
            .iter()
            .filter(|entry| &entry.key().tenant_id == tenant_id)
            .map(|entry| (entry.key().log_id.clone(), entry.value().clone()))
            .collect();
        records.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(records)
    }

    async fn put_dead_letter(&self, letter: &DeadLetter) -> Result<()> {
        self.dead_letters.insert(letter.id.clone(), letter.clone());
        Ok(())
    }

    async fn list_dead_letters(&self) -> Result<Vec<DeadLetter>> {
        let mut letters: Vec<_> = self
            .dead_letters
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        letters.sort_by(|a, b| a.received_at.cmp(&b.received_at));
        Ok(letters)
    }

    fn layout(&self) -> &StoreLayout {
        &self.layout
    }
}
