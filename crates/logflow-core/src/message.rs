//! Queue contract and persisted record

use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Queue attribute carrying the owning tenant, for downstream filtering
pub const TENANT_ATTRIBUTE: &str = "tenant_id";

/// Opaque per-customer partition key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Wire format a message was accepted in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogSource {
    JsonUpload,
    TextUpload,
}

impl LogSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogSource::JsonUpload => "json_upload",
            LogSource::TextUpload => "text_upload",
        }
    }
}

impl fmt::Display for LogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical unit placed on the queue.
///
/// Built once by the gateway and never changed afterwards; the queue may
/// hand the same message to the worker more than once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedMessage {
    pub tenant_id: TenantId,
    pub log_id: String,
    pub text: String,
    pub source: LogSource,
    #[serde(with = "time::serde::rfc3339")]
    pub received_at: OffsetDateTime,
}

impl NormalizedMessage {
    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.tenant_id.clone(), self.log_id.clone())
    }

    /// Number of Unicode scalar values in the text
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    pub fn to_json_bytes(&self) -> crate::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Store key. Tenant always comes first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub tenant_id: TenantId,
    pub log_id: String,
}

impl RecordKey {
    pub fn new(tenant_id: TenantId, log_id: impl Into<String>) -> Self {
        Self {
            tenant_id,
            log_id: log_id.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tenant_id, self.log_id)
    }
}

/// Redacted copy of a log with provenance, keyed by `(tenant_id, log_id)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedLogRecord {
    pub source: LogSource,
    pub original_text: String,
    pub modified_data: String,
    #[serde(with = "time::serde::rfc3339")]
    pub received_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub processed_at: OffsetDateTime,
    /// Simulated processing delay in seconds
    pub processing_time: f64,
    pub char_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn sample() -> NormalizedMessage {
        NormalizedMessage {
            tenant_id: TenantId::new("acme"),
            log_id: "log-1".to_string(),
            text: "héllo".to_string(),
            source: LogSource::TextUpload,
            received_at: datetime!(2024-05-01 12:00:00 UTC),
        }
    }

    #[test]
    fn test_message_wire_shape() {
        let value = serde_json::to_value(sample()).unwrap();

        assert_eq!(value["tenant_id"], "acme");
        assert_eq!(value["log_id"], "log-1");
        assert_eq!(value["source"], "text_upload");
        assert_eq!(value["received_at"], "2024-05-01T12:00:00Z");
    }

    #[test]
    fn test_char_count_counts_scalars() {
        assert_eq!(sample().char_count(), 5);
    }

    #[test]
    fn test_key_display_is_tenant_first() {
        assert_eq!(sample().key().to_string(), "acme/log-1");
    }
}
