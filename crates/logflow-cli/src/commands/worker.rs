use anyhow::Result;
use logflow_cli::pipeline::store_layout;
use logflow_config::Config;
use logflow_worker::Processor;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

pub async fn handle(mut config: Config, worker_addr: Option<String>) -> Result<()> {
    if let Some(addr) = worker_addr {
        config.worker.addr = addr;
    }

    let store = logflow_storage::connect(&config.store.url, store_layout(&config)).await?;
    let processor = Arc::new(Processor::from_config(&config, store));
    let body_limit = logflow_worker::push::body_limit(&config.validation_limits());
    let listener = TcpListener::bind(&config.worker.addr).await?;

    info!(
        subscription = %config.queue.subscription,
        store = %config.store.url,
        "push worker starting"
    );

    logflow_worker::push::serve(processor, body_limit, listener, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutdown requested");
    })
    .await
}
