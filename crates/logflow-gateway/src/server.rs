use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode, header},
    routing::post,
};
use logflow_core::{NormalizedMessage, Normalizer, Validator};
use logflow_queue::{OutboundMessage, Publisher};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::ingest::{self, IngestAccepted, WireFormat};
use crate::{GatewayError, TENANT_HEADER};

/// Validates uploads, normalizes them and hands them to the queue.
/// Holds no mutable state; one instance serves every request.
pub struct Gateway {
    validator: Validator,
    normalizer: Normalizer,
    publisher: Arc<dyn Publisher>,
    publish_timeout: Duration,
}

impl Gateway {
    pub fn new(
        validator: Validator,
        normalizer: Normalizer,
        publisher: Arc<dyn Publisher>,
        publish_timeout: Duration,
    ) -> Self {
        Self {
            validator,
            normalizer,
            publisher,
            publish_timeout,
        }
    }

    /// Accept one upload. Nothing is published unless every rule passes.
    pub async fn ingest(
        &self,
        content_type: Option<&str>,
        tenant_header: Option<&str>,
        body: &[u8],
    ) -> Result<IngestAccepted, GatewayError> {
        let format = WireFormat::from_content_type(content_type)?;
        let (raw, source) = match format {
            WireFormat::Json => (
                ingest::parse_json(&self.validator, body)?,
                logflow_core::LogSource::JsonUpload,
            ),
            WireFormat::Text => (
                ingest::parse_text(&self.validator, tenant_header, body)?,
                logflow_core::LogSource::TextUpload,
            ),
        };

        let message = self.normalizer.normalize(raw, source);
        self.publish(&message).await?;

        Ok(IngestAccepted::new(&message.tenant_id, &message.log_id))
    }

    async fn publish(&self, message: &NormalizedMessage) -> Result<(), GatewayError> {
        let outbound = OutboundMessage::from_normalized(message)
            .map_err(|e| GatewayError::Publish(e.to_string()))?;

        let published =
            tokio::time::timeout(self.publish_timeout, self.publisher.publish(outbound)).await;

        match published {
            Ok(Ok(message_id)) => {
                info!(
                    tenant_id = %message.tenant_id,
                    log_id = %message.log_id,
                    source = message.source.as_str(),
                    message_id = %message_id,
                    topic = self.publisher.destination(),
                    "log accepted"
                );
                Ok(())
            }
            Ok(Err(e)) => {
                error!(
                    tenant_id = %message.tenant_id,
                    log_id = %message.log_id,
                    "publish failed: {}",
                    e
                );
                Err(GatewayError::Publish(e.to_string()))
            }
            Err(_) => {
                error!(
                    tenant_id = %message.tenant_id,
                    log_id = %message.log_id,
                    timeout_ms = self.publish_timeout.as_millis() as u64,
                    "publish timed out"
                );
                Err(GatewayError::Publish(format!(
                    "timed out after {}ms",
                    self.publish_timeout.as_millis()
                )))
            }
        }
    }

    pub fn router(self: Arc<Self>) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        let body_limit = self.validator.limits().max_encoded_len();

        Router::new()
            .route("/ingest", post(handle_ingest))
            .layer(DefaultBodyLimit::max(body_limit))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .with_state(self)
    }

    /// Serve until `shutdown` resolves
    pub async fn serve(
        self: Arc<Self>,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let addr = listener.local_addr()?;
        info!("Gateway listening on {}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}

async fn handle_ingest(
    State(gateway): State<Arc<Gateway>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<IngestAccepted>), GatewayError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());

    let tenant_header = headers.get(TENANT_HEADER).and_then(|v| v.to_str().ok());

    let accepted = gateway.ingest(content_type, tenant_header, &body).await?;
    Ok((StatusCode::ACCEPTED, Json(accepted)))
}
