//! Image queue abstraction
//!
//! The write path publishes through `JobPublisher`; the worker consumes
//! through `JobSource` and acknowledges explicitly once a job's outcome is
//! recorded.

use crate::models::{DeadLetter, ImageJob};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

mod kafka;
mod memory;

pub use kafka::{KafkaJobPublisher, KafkaJobSource, KafkaQueueConfig};
pub use memory::InMemoryQueue;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Broker call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Broker rejected the request: {0}")]
    Rejected(String),
}

pub type QueueResult<T> = Result<T, QueueError>;

/// One received message and the position needed to settle it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub payload: Vec<u8>,
}

#[async_trait]
pub trait JobPublisher: Send + Sync {
    async fn publish(&self, job: &ImageJob) -> QueueResult<()>;

    async fn dead_letter(&self, letter: &DeadLetter) -> QueueResult<()>;
}

#[async_trait]
pub trait JobSource: Send + Sync {
    /// Next message, or `None` when the source is exhausted
    async fn receive(&self) -> QueueResult<Option<Delivery>>;

    /// Mark the delivery consumed
    async fn ack(&self, delivery: &Delivery) -> QueueResult<()>;

    /// Return the delivery to the queue for redelivery
    async fn nack(&self, delivery: &Delivery) -> QueueResult<()>;
}
