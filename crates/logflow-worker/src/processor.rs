//! Per-message processing pipeline shared by push and pull delivery

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use logflow_config::{Config, PermanentFailurePolicy};
use logflow_core::{DecodeError, NormalizedMessage, ProcessedLogRecord, PushEnvelope, RecordKey};
use logflow_security::Redactor;
use logflow_storage::{DeadLetter, LogStore};
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::WorkerError;

/// Where a message is in its lifecycle.
///
/// `Received → Simulating → Redacting → Persisting → Acknowledged`, or `Failed`
/// from any stage before acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Simulating,
    Redacting,
    Persisting,
    Acknowledged,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::Simulating => "simulating",
            Stage::Redacting => "redacting",
            Stage::Persisting => "persisting",
            Stage::Acknowledged => "acknowledged",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Result of a delivery that may be acknowledged
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Processed {
        key: RecordKey,
        record: ProcessedLogRecord,
    },
    /// The message can never be processed; acknowledge without retry
    Discarded { reason: String },
}

pub struct Processor {
    store: Arc<dyn LogStore>,
    redactor: Redactor,
    rate_per_char: f64,
    failure_policy: PermanentFailurePolicy,
}

impl Processor {
    pub fn new(
        store: Arc<dyn LogStore>,
        redactor: Redactor,
        rate_per_char: f64,
        failure_policy: PermanentFailurePolicy,
    ) -> Self {
        Self {
            store,
            redactor,
            rate_per_char,
            failure_policy,
        }
    }

    pub fn from_config(config: &Config, store: Arc<dyn LogStore>) -> Self {
        Self::new(
            store,
            Redactor::new(&config.redaction.patterns),
            config.worker.processing_rate_per_char,
            config.worker.permanent_failure_policy,
        )
    }

    pub fn store(&self) -> &Arc<dyn LogStore> {
        &self.store
    }

    /// Seconds of simulated work charged for `char_count` characters.
    /// Always equal to the delay actually slept.
    pub fn processing_time(&self, char_count: usize) -> f64 {
        self.simulated_delay(char_count).as_secs_f64()
    }

    /// Saturates at [`Duration::MAX`] when the product overflows
    fn simulated_delay(&self, char_count: usize) -> Duration {
        let secs = char_count as f64 * self.rate_per_char;
        if secs > 0.0 {
            Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        }
    }

    /// Handle a push-subscription request body
    pub async fn handle_push(&self, body: &[u8]) -> Result<Outcome, WorkerError> {
        let envelope = match PushEnvelope::from_slice(body) {
            Ok(envelope) => envelope,
            Err(e) => return self.discard(None, &e, body).await,
        };

        let message_id = envelope.message_id();
        match envelope.decode() {
            Ok(message) => self.process(message, message_id).await,
            Err(e) => self.discard(message_id, &e, body).await,
        }
    }

    /// Handle the data of a pulled message
    pub async fn handle_data(
        &self,
        message_id: Option<&str>,
        data: &[u8],
    ) -> Result<Outcome, WorkerError> {
        match logflow_core::decode_message(data) {
            Ok(message) => self.process(message, message_id).await,
            Err(e) => self.discard(message_id, &e, data).await,
        }
    }

    /// Simulate, redact, persist. Only a persisted message is reported as processed.
    pub async fn process(
        &self,
        message: NormalizedMessage,
        message_id: Option<&str>,
    ) -> Result<Outcome, WorkerError> {
        let key = message.key();
        let message_id = message_id.unwrap_or("-");
        let char_count = message.char_count();
        debug!(tenant_id = %key.tenant_id, log_id = %key.log_id, message_id, stage = %Stage::Received);

        let delay = self.simulated_delay(char_count);
        debug!(
            tenant_id = %key.tenant_id,
            log_id = %key.log_id,
            stage = %Stage::Simulating,
            delay_ms = delay.as_millis() as u64
        );
        tokio::time::sleep(delay).await;

        debug!(tenant_id = %key.tenant_id, log_id = %key.log_id, stage = %Stage::Redacting);
        let (modified_data, redactions) = self.redactor.redact_with_info(&message.text);
        for info in &redactions {
            debug!(
                tenant_id = %key.tenant_id,
                log_id = %key.log_id,
                rule = %info.redaction_type,
                count = info.count,
                "redacted"
            );
        }

        let record = ProcessedLogRecord {
            source: message.source,
            original_text: message.text,
            modified_data,
            received_at: message.received_at,
            processed_at: OffsetDateTime::now_utc(),
            processing_time: self.processing_time(char_count),
            char_count,
        };

        let path = self.store.layout().record_path(&key);
        debug!(path = %path, stage = %Stage::Persisting);
        if let Err(source) = self.store.put_record(&key, &record).await {
            error!(
                path = %path,
                message_id,
                stage = %Stage::Failed,
                "persist failed: {}",
                source
            );
            return Err(WorkerError::Persist { path, source });
        }

        info!(
            tenant_id = %key.tenant_id,
            log_id = %key.log_id,
            message_id,
            char_count,
            processing_time = record.processing_time,
            redactions = redactions.iter().map(|r| r.count).sum::<usize>(),
            stage = %Stage::Acknowledged,
            "log processed"
        );

        Ok(Outcome::Processed { key, record })
    }

    async fn discard(
        &self,
        message_id: Option<&str>,
        cause: &DecodeError,
        payload: &[u8],
    ) -> Result<Outcome, WorkerError> {
        let reason = cause.to_string();
        warn!(
            message_id = message_id.unwrap_or("-"),
            reason = %reason,
            stage = %Stage::Failed,
            "discarding message that can never be processed"
        );

        if self.failure_policy == PermanentFailurePolicy::DeadLetter {
            // Redeliveries of one message overwrite a single letter
            let id = message_id.map_or_else(|| Uuid::new_v4().to_string(), str::to_string);
            let letter = DeadLetter {
                id,
                message_id: message_id.map(str::to_string),
                reason: reason.clone(),
                payload: String::from_utf8_lossy(payload).into_owned(),
                received_at: OffsetDateTime::now_utc(),
            };
            self.store
                .put_dead_letter(&letter)
                .await
                .map_err(WorkerError::DeadLetter)?;
            debug!(id = %letter.id, "dead letter stored");
        }

        Ok(Outcome::Discarded { reason })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, FlakyStore};
    use logflow_core::{LogSource, TenantId};
    use logflow_storage::MemoryStore;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_process_redacts_and_persists() {
        let store = Arc::new(MemoryStore::default());
        let processor = testing::processor(store.clone(), 0.0);
        let message = testing::message("acme", "log-1", "Contact 555-1234 or 555-987-6543");
        let received_at = message.received_at;

        let outcome = processor.process(message, Some("7")).await.unwrap();
        assert!(matches!(outcome, Outcome::Processed { .. }));

        let key = RecordKey::new(TenantId::new("acme"), "log-1");
        let record = store.get_record(&key).await.unwrap().unwrap();
        assert_eq!(record.original_text, "Contact 555-1234 or 555-987-6543");
        assert!(record.modified_data.contains("[REDACTED]"));
        assert!(!record.modified_data.contains("1234"));
        assert!(!record.modified_data.contains("6543"));
        assert_eq!(record.char_count, 32);
        assert_eq!(record.source, LogSource::JsonUpload);
        assert_eq!(record.received_at, received_at);
        assert!(record.processed_at >= received_at);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_scales_with_length() {
        let store = Arc::new(MemoryStore::default());
        let processor = testing::processor(store.clone(), 0.01);
        let message = testing::message("acme", "log-1", &"x".repeat(100));

        let started = tokio::time::Instant::now();
        let outcome = processor.process(message, None).await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(1));
        let Outcome::Processed { record, .. } = outcome else {
            panic!("expected a processed outcome");
        };
        assert!((record.processing_time - 1.0).abs() < 1e-9);
        assert_eq!(record.char_count, 100);
    }

    #[test]
    fn test_overflowing_rate_saturates() {
        let store = Arc::new(MemoryStore::default());
        let processor = testing::processor(store, f64::MAX);

        assert_eq!(processor.simulated_delay(10), Duration::MAX);
        assert_eq!(processor.processing_time(10), Duration::MAX.as_secs_f64());
        assert!(processor.processing_time(10).is_finite());
        assert_eq!(processor.simulated_delay(0), Duration::ZERO);
        assert_eq!(processor.processing_time(0), 0.0);
    }

    #[tokio::test]
    async fn test_reprocessing_overwrites() {
        let store = Arc::new(MemoryStore::default());
        let processor = testing::processor(store.clone(), 0.0);

        processor
            .process(testing::message("acme", "log-1", "first"), None)
            .await
            .unwrap();
        processor
            .process(testing::message("acme", "log-1", "second"), None)
            .await
            .unwrap();

        let records = store.list_records(&TenantId::new("acme")).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].1.original_text, "second");
    }

    #[tokio::test]
    async fn test_missing_log_id_is_dead_lettered() {
        let store = Arc::new(MemoryStore::default());
        let processor = testing::processor(store.clone(), 0.0);
        let data = br#"{"tenant_id": "acme", "text": "hi", "source": "json_upload", "received_at": "2024-05-01T12:00:00Z"}"#;

        let outcome = processor.handle_data(Some("9"), data).await.unwrap();

        assert!(matches!(outcome, Outcome::Discarded { .. }));
        assert!(store.is_empty());
        let letters = store.list_dead_letters().await.unwrap();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].message_id.as_deref(), Some("9"));
        assert!(letters[0].payload.contains("\"acme\""));
    }

    #[tokio::test]
    async fn test_drop_policy_keeps_nothing() {
        let store = Arc::new(MemoryStore::default());
        let processor = Processor::new(
            store.clone(),
            Redactor::default(),
            0.0,
            PermanentFailurePolicy::Drop,
        );

        let outcome = processor.handle_data(None, b"not json").await.unwrap();

        assert!(matches!(outcome, Outcome::Discarded { .. }));
        assert!(store.list_dead_letters().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_push_envelope_round_trip() {
        let store = Arc::new(MemoryStore::default());
        let processor = testing::processor(store.clone(), 0.0);
        let data = testing::message("tenant_b", "log-2", "call 555-1234")
            .to_json_bytes()
            .unwrap();
        let body = serde_json::to_vec(&PushEnvelope::wrap("m-1", &data, BTreeMap::new())).unwrap();

        let outcome = processor.handle_push(&body).await.unwrap();

        let Outcome::Processed { key, record } = outcome else {
            panic!("expected a processed outcome");
        };
        assert_eq!(key.tenant_id.as_str(), "tenant_b");
        assert_eq!(record.modified_data, "call [REDACTED]");
    }

    #[tokio::test]
    async fn test_bad_envelopes_are_discarded() {
        let store = Arc::new(MemoryStore::default());
        let processor = testing::processor(store.clone(), 0.0);

        let bodies: [&[u8]; 4] = [
            b"{broken",
            br#"{"subscription": "s"}"#,
            br#"{"message": {"messageId": "1"}}"#,
            br#"{"message": {"data": "!!not base64!!", "messageId": "2"}}"#,
        ];
        for body in bodies {
            let outcome = processor.handle_push(body).await.unwrap();
            assert!(matches!(outcome, Outcome::Discarded { .. }));
        }

        assert!(store.is_empty());
        assert_eq!(store.list_dead_letters().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_redelivered_bad_message_keeps_one_dead_letter() {
        let store = Arc::new(MemoryStore::default());
        let processor = testing::processor(store.clone(), 0.0);
        let body = br#"{"message": {"data": "!!not base64!!", "messageId": "42"}}"#;

        for _ in 0..3 {
            let outcome = processor.handle_push(body).await.unwrap();
            assert!(matches!(outcome, Outcome::Discarded { .. }));
        }

        let letters = store.list_dead_letters().await.unwrap();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].id, "42");
        assert_eq!(letters[0].message_id.as_deref(), Some("42"));
    }

    #[tokio::test]
    async fn test_store_failure_is_transient() {
        let store = Arc::new(FlakyStore::always_failing());
        let processor = testing::processor(store.clone(), 0.0);

        let result = processor
            .process(testing::message("acme", "log-1", "hello"), None)
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, WorkerError::Persist { .. }));
        assert!(err.to_string().contains("tenants/acme/processed_logs/log-1"));
    }
}
