//! QueueBroker - named queues and consumer presence
//!
//! Producers look a queue up by name and publish to it; consumers register
//! for a name so producers can skip publishing when nobody listens. The
//! check-then-publish in `publish_if_consumed` is best effort: a consumer
//! registering concurrently with a publish may miss that one item.

use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use tracing::{debug, info};

use crate::queue::MessageQueue;
use crate::{QueueError, Result, DEFAULT_QUEUE_NAME};

pub struct QueueBroker<T> {
    queues: DashMap<String, Arc<MessageQueue<T>>>,
    consumers: DashSet<String>,
}

impl<T> QueueBroker<T> {
    pub fn new() -> Self {
        Self {
            queues: DashMap::new(),
            consumers: DashSet::new(),
        }
    }

    /// Return the named queue, creating it on first access
    pub fn get_queue(&self, name: &str) -> Arc<MessageQueue<T>> {
        if let Some(queue) = self.queues.get(name) {
            return queue.value().clone();
        }

        self.queues
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(queue = %name, "Creating queue");
                Arc::new(MessageQueue::new(name))
            })
            .value()
            .clone()
    }

    pub fn default_queue(&self) -> Arc<MessageQueue<T>> {
        self.get_queue(DEFAULT_QUEUE_NAME)
    }

    /// Mark `name` as consumed. Idempotent.
    pub fn register_consumer(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(QueueError::InvalidQueueName(name.to_string()));
        }
        if self.consumers.insert(name.to_string()) {
            info!(queue = %name, "Consumer registered");
        }
        Ok(())
    }

    pub fn has_consumer(&self, name: &str) -> bool {
        self.consumers.contains(name)
    }

    /// True until the first queue is created
    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    pub fn queue_names(&self) -> Vec<String> {
        self.queues.iter().map(|e| e.key().clone()).collect()
    }

    /// Offer `item` to the named queue only if a consumer is registered for it.
    /// Returns the item back when nobody consumes that queue.
    pub fn publish_if_consumed(&self, name: &str, item: T) -> std::result::Result<(), T> {
        if !self.has_consumer(name) {
            return Err(item);
        }
        self.get_queue(name).offer(item);
        Ok(())
    }
}

impl<T> Default for QueueBroker<T> {
    fn default() -> Self {
        Self::new()
    }
}
