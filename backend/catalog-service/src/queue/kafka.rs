/// Kafka-backed image queue
use super::{Delivery, JobPublisher, JobSource, QueueError, QueueResult};
use crate::models::{DeadLetter, ImageJob};
use async_trait::async_trait;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::{ClientConfig, Offset, TopicPartitionList};
use resilience::timeout::with_timeout;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Clone, Debug)]
pub struct KafkaQueueConfig {
    pub brokers: String,
    pub topic: String,
    pub dead_letter_topic: String,
    pub group_id: String,
    pub call_timeout: Duration,
}

/// Kafka producer for image jobs and dead letters.
#[derive(Clone)]
pub struct KafkaJobPublisher {
    inner: Arc<FutureProducer>,
    topic: String,
    dead_letter_topic: String,
    call_timeout: Duration,
}

impl KafkaJobPublisher {
    pub fn new(config: &KafkaQueueConfig) -> QueueResult<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("enable.idempotence", "true")
            .set("acks", "all")
            .set(
                "message.timeout.ms",
                config.call_timeout.as_millis().to_string(),
            )
            .create()?;

        info!(
            brokers = %config.brokers,
            topic = %config.topic,
            dead_letter_topic = %config.dead_letter_topic,
            "Image job producer initialized"
        );

        Ok(Self {
            inner: Arc::new(producer),
            topic: config.topic.clone(),
            dead_letter_topic: config.dead_letter_topic.clone(),
            call_timeout: config.call_timeout,
        })
    }

    async fn send(&self, topic: &str, key: &str, payload: &[u8]) -> QueueResult<()> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        let delivery = with_timeout(self.call_timeout, self.inner.send(record, self.call_timeout))
            .await
            .map_err(|elapsed| QueueError::Timeout(elapsed.0))?;

        let (partition, offset) = delivery.map_err(|(err, _)| QueueError::Kafka(err))?;
        debug!(topic, partition, offset, "Message delivered");
        Ok(())
    }
}

fn partition_key(product_id: Option<i64>, fallback: &str) -> String {
    product_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| fallback.to_string())
}

#[async_trait]
impl JobPublisher for KafkaJobPublisher {
    async fn publish(&self, job: &ImageJob) -> QueueResult<()> {
        let payload = job.encode()?;
        let key = partition_key(job.product_id, &job.job_id.to_string());
        self.send(&self.topic, &key, &payload).await
    }

    async fn dead_letter(&self, letter: &DeadLetter) -> QueueResult<()> {
        let payload = serde_json::to_vec(letter)?;
        let key = partition_key(letter.product_id, "poison");
        self.send(&self.dead_letter_topic, &key, &payload).await
    }
}

/// Kafka consumer with manual offset commits
///
/// An offset is committed only on `ack`; `nack` seeks the partition back so
/// the same message is delivered again.
pub struct KafkaJobSource {
    consumer: StreamConsumer,
    call_timeout: Duration,
}

impl KafkaJobSource {
    pub fn new(config: &KafkaQueueConfig) -> QueueResult<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "45000")
            .set("max.poll.interval.ms", "300000")
            .create()?;

        consumer.subscribe(&[config.topic.as_str()])?;

        info!(
            brokers = %config.brokers,
            topic = %config.topic,
            group_id = %config.group_id,
            "Image job consumer initialized"
        );

        Ok(Self {
            consumer,
            call_timeout: config.call_timeout,
        })
    }
}

#[async_trait]
impl JobSource for KafkaJobSource {
    async fn receive(&self) -> QueueResult<Option<Delivery>> {
        let message = self.consumer.recv().await?;

        Ok(Some(Delivery {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
        }))
    }

    async fn ack(&self, delivery: &Delivery) -> QueueResult<()> {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(
            &delivery.topic,
            delivery.partition,
            Offset::Offset(delivery.offset + 1),
        )?;
        self.consumer.commit(&tpl, CommitMode::Async)?;
        Ok(())
    }

    async fn nack(&self, delivery: &Delivery) -> QueueResult<()> {
        self.consumer.seek(
            &delivery.topic,
            delivery.partition,
            Offset::Offset(delivery.offset),
            self.call_timeout,
        )?;
        Ok(())
    }
}
