//! HttpSink in-process queue broker
//!
//! - QueueBroker: registry of named FIFO queues plus the set of queue names
//!   with a registered consumer
//! - MessageQueue: multi-producer / multi-consumer FIFO with async wait

pub mod broker;
pub mod queue;

pub use broker::QueueBroker;
pub use queue::MessageQueue;

/// Name used by `QueueBroker::default_queue`
pub const DEFAULT_QUEUE_NAME: &str = "default";

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Cannot register a consumer for an invalid queue name: '{0}'")]
    InvalidQueueName(String),
}

pub type Result<T> = std::result::Result<T, QueueError>;
