use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use logflow_config::Config;
use logflow_core::{Normalizer, Validator};
use logflow_gateway::Gateway;
use logflow_queue::MemoryQueue;
use logflow_storage::{LogStore, StoreLayout};
use logflow_worker::{Processor, PullWorker};

/// Every long-lived handle of a process, built once at startup
pub struct Pipeline {
    pub config: Arc<Config>,
    pub store: Arc<dyn LogStore>,
    pub queue: MemoryQueue,
    pub gateway: Arc<Gateway>,
    pub processor: Arc<Processor>,
}

impl Pipeline {
    /// Open the configured store and wire everything around it
    pub async fn build(config: Config) -> Result<Self> {
        let store = logflow_storage::connect(&config.store.url, store_layout(&config)).await?;
        Self::with_store(config, store)
    }

    pub fn with_store(config: Config, store: Arc<dyn LogStore>) -> Result<Self> {
        let queue = MemoryQueue::new(
            config.queue.topic.clone(),
            Duration::from_millis(config.queue.redelivery_delay_ms),
        );

        let validator = Validator::new(config.validation_limits())?;
        let gateway = Arc::new(Gateway::new(
            validator,
            Normalizer::default(),
            Arc::new(queue.clone()),
            Duration::from_millis(config.gateway.publish_timeout_ms),
        ));

        let processor = Arc::new(Processor::from_config(&config, Arc::clone(&store)));

        Ok(Self {
            config: Arc::new(config),
            store,
            queue,
            gateway,
            processor,
        })
    }

    pub fn pull_worker(&self) -> PullWorker {
        PullWorker::new(
            Arc::clone(&self.processor),
            self.queue.clone(),
            self.config.worker.concurrency,
        )
    }
}

pub fn store_layout(config: &Config) -> StoreLayout {
    StoreLayout::new(
        config.store.tenants_collection.clone(),
        config.store.logs_collection.clone(),
    )
}
