//! Wire-format parsing for `POST /ingest`
//!
//! Each parser reports the first violated rule, checked in the order
//! body → tenant presence → tenant format → text → log id.

use logflow_core::{RawLog, TenantId, ValidationError, Validator};
use serde::Serialize;
use serde_json::Value;

use crate::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    Json,
    Text,
}

impl WireFormat {
    /// Match on the media type essence, ignoring case and parameters like `charset`
    pub fn from_content_type(content_type: Option<&str>) -> Result<Self, GatewayError> {
        let raw = content_type.unwrap_or_default();
        let essence = raw
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "application/json" => Ok(WireFormat::Json),
            "text/plain" => Ok(WireFormat::Text),
            "" => Err(GatewayError::UnsupportedMediaType("none".to_string())),
            _ => Err(GatewayError::UnsupportedMediaType(raw.to_string())),
        }
    }
}

/// 202 body. Deliberately carries no transport message id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestAccepted {
    pub status: &'static str,
    pub tenant_id: String,
    pub log_id: String,
}

impl IngestAccepted {
    pub fn new(tenant_id: &TenantId, log_id: &str) -> Self {
        Self {
            status: "accepted",
            tenant_id: tenant_id.to_string(),
            log_id: log_id.to_string(),
        }
    }
}

/// `{"tenant_id": ..., "log_id"?: ..., "text": ...}`
pub fn parse_json(validator: &Validator, body: &[u8]) -> Result<RawLog, ValidationError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ValidationError::InvalidBody(format!("Invalid JSON payload: {e}")))?;

    let Value::Object(fields) = value else {
        return Err(ValidationError::InvalidBody(
            "JSON payload must be an object".to_string(),
        ));
    };

    let tenant_id = match fields.get("tenant_id") {
        None | Some(Value::Null) => return Err(ValidationError::MissingTenantId),
        Some(Value::String(id)) => id,
        Some(_) => return Err(ValidationError::InvalidTenantId),
    };
    if !validator.validate_tenant_id(tenant_id) {
        return Err(ValidationError::InvalidTenantId);
    }

    let text = match fields.get("text") {
        None => "",
        Some(Value::String(text)) => text.as_str(),
        Some(_) => return Err(ValidationError::TextNotString),
    };
    validator.validate_text(text)?;

    let log_id = match fields.get("log_id") {
        None | Some(Value::Null) => None,
        Some(Value::String(id)) => Some(id.as_str()),
        Some(_) => return Err(validator.log_id_error()),
    };
    if !validator.validate_log_id(log_id) {
        return Err(validator.log_id_error());
    }

    Ok(RawLog {
        tenant_id: TenantId::new(tenant_id.as_str()),
        log_id: log_id.map(str::to_string),
        text: text.to_string(),
    })
}

/// Raw UTF-8 body; the tenant comes from the `X-Tenant-ID` header
pub fn parse_text(
    validator: &Validator,
    tenant_header: Option<&str>,
    body: &[u8],
) -> Result<RawLog, ValidationError> {
    let tenant_id = match tenant_header {
        None | Some("") => return Err(ValidationError::MissingTenantHeader),
        Some(id) => id,
    };
    if !validator.validate_tenant_id(tenant_id) {
        return Err(ValidationError::InvalidTenantId);
    }

    let text = std::str::from_utf8(body).map_err(|_| {
        ValidationError::InvalidBody("Request body must be valid UTF-8 text".to_string())
    })?;
    validator.validate_text(text)?;

    Ok(RawLog {
        tenant_id: TenantId::new(tenant_id),
        log_id: None,
        text: text.to_string(),
    })
}
