use anyhow::Result;
use logflow_cli::Pipeline;
use logflow_config::Config;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

use super::stopped;

pub async fn handle(
    mut config: Config,
    gateway_addr: Option<String>,
    worker_addr: Option<String>,
) -> Result<()> {
    if let Some(addr) = gateway_addr {
        config.gateway.addr = addr;
    }
    if let Some(addr) = worker_addr {
        config.worker.addr = addr;
    }

    let pipeline = Pipeline::build(config).await?;
    let gateway_listener = TcpListener::bind(&pipeline.config.gateway.addr).await?;
    let worker_listener = TcpListener::bind(&pipeline.config.worker.addr).await?;

    info!(
        topic = %pipeline.config.queue.topic,
        subscription = %pipeline.config.queue.subscription,
        store = %pipeline.config.store.url,
        concurrency = pipeline.config.worker.concurrency,
        "logflow starting"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let pull = tokio::spawn(pipeline.pull_worker().run(shutdown_rx.clone()));
    let mut gateway = tokio::spawn(
        pipeline
            .gateway
            .clone()
            .serve(gateway_listener, stopped(shutdown_rx.clone())),
    );
    let mut push = tokio::spawn(logflow_worker::push::serve(
        pipeline.processor.clone(),
        logflow_worker::push::body_limit(&pipeline.config.validation_limits()),
        worker_listener,
        stopped(shutdown_rx),
    ));

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Shutdown requested");
        }
        result = &mut gateway => {
            result??;
            warn!("Gateway stopped unexpectedly");
        }
        result = &mut push => {
            result??;
            warn!("Worker endpoint stopped unexpectedly");
        }
    }

    let _ = shutdown_tx.send(true);

    // Servers drain their open requests; pull slots finish their current message
    if !gateway.is_finished() {
        gateway.await??;
    }
    if !push.is_finished() {
        push.await??;
    }
    pull.await?;

    pipeline.queue.close();
    let stats = pipeline.queue.stats();
    if stats.pending > 0 {
        warn!(pending = stats.pending, "Unprocessed messages dropped at shutdown");
    }
    info!(
        published = stats.published,
        acked = stats.acked,
        redelivered = stats.redelivered,
        "logflow stopped"
    );

    Ok(())
}
