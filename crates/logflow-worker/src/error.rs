use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use logflow_storage::StorageError;
use serde_json::json;
use thiserror::Error;

/// Transient processing failures. The delivery must not be acknowledged so
/// the queue hands it out again.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to persist {path}: {source}")]
    Persist {
        path: String,
        #[source]
        source: StorageError,
    },

    #[error("Failed to store dead letter: {0}")]
    DeadLetter(#[source] StorageError),
}

impl WorkerError {
    pub fn error_code(&self) -> &'static str {
        match self {
            WorkerError::Persist { .. } => "PERSIST_FAILED",
            WorkerError::DeadLetter(_) => "DEAD_LETTER_FAILED",
        }
    }
}

impl IntoResponse for WorkerError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
            }
        }));

        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}
