//! In-process at-least-once queue

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::publisher::{MessageId, OutboundMessage, Publisher};
use crate::{QueueError, Result};

/// A message as handed to a consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub id: MessageId,
    pub data: Vec<u8>,
    pub attributes: BTreeMap<String, String>,
    /// 1 on first delivery, incremented on every redelivery
    pub attempt: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub published: u64,
    pub acked: u64,
    pub redelivered: u64,
    pub pending: usize,
    pub in_flight: usize,
}

struct Inner {
    topic: String,
    redelivery_delay: Duration,
    pending: Mutex<VecDeque<ReceivedMessage>>,
    notify: Notify,
    closed: AtomicBool,
    next_id: AtomicU64,
    published: AtomicU64,
    acked: AtomicU64,
    redelivered: AtomicU64,
    in_flight: AtomicUsize,
}

impl Inner {
    fn pending(&self) -> MutexGuard<'_, VecDeque<ReceivedMessage>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn push(&self, message: ReceivedMessage) {
        self.pending().push_back(message);
        self.notify.notify_one();
    }

    fn redeliver(self: &Arc<Self>, mut message: ReceivedMessage) {
        message.attempt += 1;
        self.redelivered.fetch_add(1, Ordering::SeqCst);

        if self.redelivery_delay.is_zero() {
            self.push(message);
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let inner = Arc::clone(self);
                let delay = self.redelivery_delay;
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    inner.push(message);
                });
            }
            Err(_) => self.push(message),
        }
    }
}

/// Unsettled deliveries are redelivered after the configured delay, whether
/// they were nacked explicitly or simply dropped.
#[derive(Clone)]
pub struct MemoryQueue {
    inner: Arc<Inner>,
}

impl MemoryQueue {
    pub fn new(topic: impl Into<String>, redelivery_delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                topic: topic.into(),
                redelivery_delay,
                pending: Mutex::new(VecDeque::new()),
                notify: Notify::new(),
                closed: AtomicBool::new(false),
                next_id: AtomicU64::new(1),
                published: AtomicU64::new(0),
                acked: AtomicU64::new(0),
                redelivered: AtomicU64::new(0),
                in_flight: AtomicUsize::new(0),
            }),
        }
    }

    /// Wait for the next message. Returns `None` once the queue is closed and drained.
    pub async fn pull(&self) -> Option<Delivery> {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let next = self.inner.pending().pop_front();
            if let Some(message) = next {
                self.inner.in_flight.fetch_add(1, Ordering::SeqCst);
                return Some(Delivery {
                    message,
                    queue: Arc::clone(&self.inner),
                    settled: false,
                });
            }

            if self.inner.closed.load(Ordering::SeqCst) {
                return None;
            }

            notified.await;
        }
    }

    /// Refuse new publishes and wake idle consumers
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            published: self.inner.published.load(Ordering::SeqCst),
            acked: self.inner.acked.load(Ordering::SeqCst),
            redelivered: self.inner.redelivered.load(Ordering::SeqCst),
            pending: self.inner.pending().len(),
            in_flight: self.inner.in_flight.load(Ordering::SeqCst),
        }
    }
}

#[async_trait]
impl Publisher for MemoryQueue {
    async fn publish(&self, message: OutboundMessage) -> Result<MessageId> {
        if self.is_closed() {
            return Err(QueueError::Closed(self.inner.topic.clone()));
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        self.inner.push(ReceivedMessage {
            id: id.clone(),
            data: message.data,
            attributes: message.attributes,
            attempt: 1,
        });
        self.inner.published.fetch_add(1, Ordering::SeqCst);

        debug!(topic = %self.inner.topic, message_id = %id, "message enqueued");
        Ok(id)
    }

    fn destination(&self) -> &str {
        &self.inner.topic
    }
}

/// One in-flight message. Settle with [`Delivery::ack`] or [`Delivery::nack`].
pub struct Delivery {
    message: ReceivedMessage,
    queue: Arc<Inner>,
    settled: bool,
}

impl Delivery {
    pub fn message(&self) -> &ReceivedMessage {
        &self.message
    }

    /// Processing finished; never deliver this message again
    pub fn ack(mut self) {
        self.settled = true;
        self.queue.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.queue.acked.fetch_add(1, Ordering::SeqCst);
    }

    /// Processing failed; deliver again later
    pub fn nack(mut self) {
        self.settled = true;
        self.queue.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.queue.redeliver(self.message.clone());
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        if !self.settled {
            warn!(message_id = %self.message.id, "delivery dropped without ack, scheduling redelivery");
            self.queue.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.queue.redeliver(self.message.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outbound(data: &str) -> OutboundMessage {
        OutboundMessage {
            data: data.as_bytes().to_vec(),
            attributes: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_publish_then_pull_fifo() {
        let queue = MemoryQueue::new("logs", Duration::ZERO);
        let first = queue.publish(outbound("a")).await.unwrap();
        let second = queue.publish(outbound("b")).await.unwrap();
        assert_ne!(first, second);

        let d1 = queue.pull().await.unwrap();
        let d2 = queue.pull().await.unwrap();
        assert_eq!(d1.message().data, b"a");
        assert_eq!(d1.message().id, first);
        assert_eq!(d2.message().data, b"b");
        assert_eq!(d1.message().attempt, 1);

        d1.ack();
        d2.ack();
        let stats = queue.stats();
        assert_eq!(stats.published, 2);
        assert_eq!(stats.acked, 2);
        assert_eq!(stats.in_flight, 0);
    }

    #[tokio::test]
    async fn test_nack_redelivers_same_message() {
        let queue = MemoryQueue::new("logs", Duration::ZERO);
        let id = queue.publish(outbound("a")).await.unwrap();

        queue.pull().await.unwrap().nack();

        let again = queue.pull().await.unwrap();
        assert_eq!(again.message().id, id);
        assert_eq!(again.message().attempt, 2);
        again.ack();
        assert_eq!(queue.stats().redelivered, 1);
    }

    #[tokio::test]
    async fn test_dropped_delivery_is_redelivered() {
        let queue = MemoryQueue::new("logs", Duration::ZERO);
        queue.publish(outbound("a")).await.unwrap();

        drop(queue.pull().await.unwrap());

        let again = queue.pull().await.unwrap();
        assert_eq!(again.message().attempt, 2);
        again.ack();
    }

    #[tokio::test(start_paused = true)]
    async fn test_redelivery_waits_for_delay() {
        let queue = MemoryQueue::new("logs", Duration::from_secs(5));
        queue.publish(outbound("a")).await.unwrap();
        queue.pull().await.unwrap().nack();

        assert_eq!(queue.stats().pending, 0);
        let started = tokio::time::Instant::now();
        let again = queue.pull().await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(5));
        again.ack();
    }

    #[tokio::test]
    async fn test_pull_waits_for_publish() {
        let queue = MemoryQueue::new("logs", Duration::ZERO);
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pull().await.map(|d| d.message().data.clone()) })
        };

        tokio::task::yield_now().await;
        queue.publish(outbound("late")).await.unwrap();

        assert_eq!(consumer.await.unwrap(), Some(b"late".to_vec()));
    }

    #[tokio::test]
    async fn test_close_wakes_consumers_and_rejects_publish() {
        let queue = MemoryQueue::new("logs", Duration::ZERO);
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pull().await.is_none() })
        };

        tokio::task::yield_now().await;
        queue.close();

        assert!(consumer.await.unwrap());
        assert!(matches!(
            queue.publish(outbound("x")).await,
            Err(QueueError::Closed(_))
        ));
    }

    #[tokio::test]
    async fn test_close_drains_pending_first() {
        let queue = MemoryQueue::new("logs", Duration::ZERO);
        queue.publish(outbound("a")).await.unwrap();
        queue.close();

        let delivery = queue.pull().await.unwrap();
        delivery.ack();
        assert!(queue.pull().await.is_none());
    }
}
