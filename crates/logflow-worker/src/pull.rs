//! Pull delivery: a fixed number of slots draining a [`MemoryQueue`]

use std::sync::Arc;

use logflow_queue::{Delivery, MemoryQueue};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::Processor;

pub struct PullWorker {
    processor: Arc<Processor>,
    queue: MemoryQueue,
    concurrency: usize,
}

impl PullWorker {
    pub fn new(processor: Arc<Processor>, queue: MemoryQueue, concurrency: usize) -> Self {
        Self {
            processor,
            queue,
            concurrency: concurrency.max(1),
        }
    }

    /// Run until the queue is closed and drained, or `shutdown` flips to true.
    ///
    /// A slot that is mid-message when shutdown is requested finishes that
    /// message before exiting.
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        info!(concurrency = self.concurrency, "pull worker started");

        let mut slots = JoinSet::new();
        for slot in 0..self.concurrency {
            let processor = Arc::clone(&self.processor);
            let queue = self.queue.clone();
            let shutdown = shutdown.clone();
            slots.spawn(run_slot(slot, processor, queue, shutdown));
        }

        while let Some(joined) = slots.join_next().await {
            if let Err(e) = joined {
                error!("pull slot failed: {}", e);
            }
        }

        info!("pull worker stopped");
    }
}

async fn run_slot(
    slot: usize,
    processor: Arc<Processor>,
    queue: MemoryQueue,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        let delivery = tokio::select! {
            biased;
            changed = shutdown.changed() => {
                // A dropped sender also means stop
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
            delivery = queue.pull() => match delivery {
                Some(delivery) => delivery,
                None => break,
            },
        };

        settle(&processor, delivery).await;
    }

    debug!(slot, "pull slot stopped");
}

async fn settle(processor: &Processor, delivery: Delivery) {
    let message = delivery.message();
    let result = processor.handle_data(Some(&message.id), &message.data).await;

    match result {
        Ok(_) => delivery.ack(),
        Err(e) => {
            warn!(
                message_id = %message.id,
                attempt = message.attempt,
                "processing failed, message will be redelivered: {}",
                e
            );
            delivery.nack();
        }
    }
}
