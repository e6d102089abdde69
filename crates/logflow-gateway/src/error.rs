use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use logflow_core::ValidationError;
use serde_json::json;

/// Everything `POST /ingest` can answer with besides 202
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Unsupported content type: {0}")]
    UnsupportedMediaType(String),

    #[error("Failed to publish message: {0}")]
    Publish(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            GatewayError::Publish(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            GatewayError::Validation(e) => match e {
                ValidationError::InvalidBody(_) => "INVALID_BODY",
                ValidationError::MissingTenantId | ValidationError::MissingTenantHeader => {
                    "MISSING_TENANT_ID"
                }
                ValidationError::InvalidTenantId => "INVALID_TENANT_ID",
                ValidationError::TextNotString
                | ValidationError::TextTooShort { .. }
                | ValidationError::TextTooLong { .. } => "INVALID_TEXT",
                ValidationError::InvalidLogId { .. } => "INVALID_LOG_ID",
            },
            GatewayError::UnsupportedMediaType(_) => "UNSUPPORTED_MEDIA_TYPE",
            GatewayError::Publish(_) => "PUBLISH_FAILED",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}
