//! Push delivery envelope
//!
//! Push subscriptions POST `{"message": {"data": <base64>, ...}, "subscription": ...}`
//! where `data` is the JSON-encoded [`NormalizedMessage`]. Every decode failure is
//! permanent: redelivering the same bytes cannot make them parse.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::message::NormalizedMessage;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Invalid push envelope: {0}")]
    InvalidEnvelope(String),

    #[error("Push envelope has no message")]
    MissingMessage,

    #[error("Push message has no data")]
    MissingData,

    #[error("Message data is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("Message data is not a valid log message: {0}")]
    InvalidMessage(String),

    #[error("Message is missing tenant_id")]
    MissingTenantId,

    #[error("Message is missing log_id")]
    MissingLogId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushEnvelope {
    #[serde(default)]
    pub message: Option<PushMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushMessage {
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(rename = "messageId", default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(rename = "publishTime", default, skip_serializing_if = "Option::is_none")]
    pub publish_time: Option<String>,
}

impl PushEnvelope {
    pub fn from_slice(body: &[u8]) -> Result<Self, DecodeError> {
        serde_json::from_slice(body).map_err(|e| DecodeError::InvalidEnvelope(e.to_string()))
    }

    /// Wrap raw message data the way a push subscription delivers it
    pub fn wrap(
        message_id: impl Into<String>,
        data: &[u8],
        attributes: BTreeMap<String, String>,
    ) -> Self {
        Self {
            message: Some(PushMessage {
                data: Some(STANDARD.encode(data)),
                attributes,
                message_id: Some(message_id.into()),
                publish_time: None,
            }),
            subscription: None,
        }
    }

    pub fn message_id(&self) -> Option<&str> {
        self.message.as_ref()?.message_id.as_deref()
    }

    pub fn decode(&self) -> Result<NormalizedMessage, DecodeError> {
        let message = self.message.as_ref().ok_or(DecodeError::MissingMessage)?;
        let data = message.data.as_deref().ok_or(DecodeError::MissingData)?;
        let bytes = STANDARD.decode(data)?;
        decode_message(&bytes)
    }
}

/// Decode queue message data into a canonical message.
///
/// Missing or empty `tenant_id`/`log_id` get their own errors so the worker
/// can report exactly which key was lost.
pub fn decode_message(data: &[u8]) -> Result<NormalizedMessage, DecodeError> {
    let value: serde_json::Value =
        serde_json::from_slice(data).map_err(|e| DecodeError::InvalidMessage(e.to_string()))?;

    let object = value
        .as_object()
        .ok_or_else(|| DecodeError::InvalidMessage("expected a JSON object".to_string()))?;

    if !has_non_empty_str(object, "tenant_id") {
        return Err(DecodeError::MissingTenantId);
    }
    if !has_non_empty_str(object, "log_id") {
        return Err(DecodeError::MissingLogId);
    }

    serde_json::from_value(value).map_err(|e| DecodeError::InvalidMessage(e.to_string()))
}

fn has_non_empty_str(object: &serde_json::Map<String, serde_json::Value>, field: &str) -> bool {
    object
        .get(field)
        .and_then(|v| v.as_str())
        .is_some_and(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{LogSource, TenantId};
    use time::macros::datetime;

    fn message() -> NormalizedMessage {
        NormalizedMessage {
            tenant_id: TenantId::new("acme"),
            log_id: "log-1".to_string(),
            text: "call 555-1234".to_string(),
            source: LogSource::JsonUpload,
            received_at: datetime!(2024-05-01 12:00:00 UTC),
        }
    }

    #[test]
    fn test_decode_wrapped_message() {
        let data = message().to_json_bytes().unwrap();
        let envelope = PushEnvelope::wrap("42", &data, BTreeMap::new());
        let body = serde_json::to_vec(&envelope).unwrap();

        let parsed = PushEnvelope::from_slice(&body).unwrap();
        assert_eq!(parsed.message_id(), Some("42"));
        assert_eq!(parsed.decode().unwrap(), message());
    }

    #[test]
    fn test_pubsub_field_names() {
        let body = br#"{"message": {"data": "e30=", "messageId": "7", "publishTime": "2024-05-01T12:00:00Z"}, "subscription": "projects/p/subscriptions/s"}"#;
        let envelope = PushEnvelope::from_slice(body).unwrap();

        assert_eq!(envelope.message_id(), Some("7"));
        assert_eq!(
            envelope.subscription.as_deref(),
            Some("projects/p/subscriptions/s")
        );
        // "e30=" is "{}"
        assert!(matches!(envelope.decode(), Err(DecodeError::MissingTenantId)));
    }

    #[test]
    fn test_missing_parts() {
        let no_message = PushEnvelope::from_slice(br#"{}"#).unwrap();
        assert!(matches!(no_message.decode(), Err(DecodeError::MissingMessage)));

        let no_data = PushEnvelope::from_slice(br#"{"message": {}}"#).unwrap();
        assert!(matches!(no_data.decode(), Err(DecodeError::MissingData)));

        let bad_b64 = PushEnvelope::from_slice(br#"{"message": {"data": "%%%"}}"#).unwrap();
        assert!(matches!(bad_b64.decode(), Err(DecodeError::InvalidBase64(_))));

        assert!(matches!(
            PushEnvelope::from_slice(b"not json"),
            Err(DecodeError::InvalidEnvelope(_))
        ));
    }

    #[test]
    fn test_missing_keys_after_decode() {
        let no_log = br#"{"tenant_id": "acme", "text": "x", "source": "json_upload", "received_at": "2024-05-01T12:00:00Z"}"#;
        assert!(matches!(decode_message(no_log), Err(DecodeError::MissingLogId)));

        let empty_tenant = br#"{"tenant_id": "", "log_id": "l"}"#;
        assert!(matches!(
            decode_message(empty_tenant),
            Err(DecodeError::MissingTenantId)
        ));

        let bad_source = br#"{"tenant_id": "acme", "log_id": "l", "text": "x", "source": "ftp", "received_at": "2024-05-01T12:00:00Z"}"#;
        assert!(matches!(
            decode_message(bad_source),
            Err(DecodeError::InvalidMessage(_))
        ));

        assert!(matches!(
            decode_message(&[0xff, 0xfe]),
            Err(DecodeError::InvalidMessage(_))
        ));
    }
}
