//! Push delivery: `POST /process` receives one envelope per request.
//!
//! Any 2xx acknowledges the message; a 500 asks the sender to redeliver.

use std::future::Future;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    routing::post,
};
use logflow_core::ValidationLimits;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{Outcome, Processor, WorkerError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProcessResponse {
    Processed { log_id: String },
    Discarded { reason: String },
}

impl From<Outcome> for ProcessResponse {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Processed { key, .. } => ProcessResponse::Processed { log_id: key.log_id },
            Outcome::Discarded { reason } => ProcessResponse::Discarded { reason },
        }
    }
}

/// Room for the envelope fields around the base64 `data`
const ENVELOPE_OVERHEAD: usize = 64 * 1024;

/// Largest push body that can carry a message the gateway accepted under `limits`
pub fn body_limit(limits: &ValidationLimits) -> usize {
    limits
        .max_encoded_len()
        .div_ceil(3)
        .saturating_mul(4)
        .saturating_add(ENVELOPE_OVERHEAD)
}

pub fn router(processor: Arc<Processor>, body_limit: usize) -> Router {
    Router::new()
        .route("/process", post(handle_process))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(processor)
}

/// Serve the push endpoint until `shutdown` resolves
pub async fn serve(
    processor: Arc<Processor>,
    body_limit: usize,
    listener: TcpListener,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!("Worker listening on {}", addr);

    axum::serve(listener, router(processor, body_limit))
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

async fn handle_process(
    State(processor): State<Arc<Processor>>,
    body: Bytes,
) -> Result<Json<ProcessResponse>, WorkerError> {
    let outcome = processor.handle_push(&body).await?;
    Ok(Json(outcome.into()))
}
