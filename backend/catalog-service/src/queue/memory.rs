/// In-process image queue for local runs and tests
use super::{Delivery, JobPublisher, JobSource, QueueResult};
use crate::models::{DeadLetter, ImageJob};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;

const TOPIC: &str = "image_queue";

#[derive(Default)]
struct QueueState {
    next_offset: i64,
    ready: VecDeque<(i64, Vec<u8>)>,
    in_flight: HashMap<i64, Vec<u8>>,
    published: Vec<ImageJob>,
    dead_letters: Vec<DeadLetter>,
    acked: usize,
}

/// FIFO queue with explicit ack/nack
///
/// `receive` returns `None` once nothing is ready, so a consumer loop over
/// this queue stops when drained.
#[derive(Default)]
pub struct InMemoryQueue {
    state: Mutex<QueueState>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a raw payload, bypassing job encoding
    pub async fn push_raw(&self, payload: Vec<u8>) {
        let mut state = self.state.lock().await;
        let offset = state.next_offset;
        state.next_offset += 1;
        state.ready.push_back((offset, payload));
    }

    /// Every job ever published, in publish order
    pub async fn published(&self) -> Vec<ImageJob> {
        self.state.lock().await.published.clone()
    }

    pub async fn dead_letters(&self) -> Vec<DeadLetter> {
        self.state.lock().await.dead_letters.clone()
    }

    pub async fn ready_len(&self) -> usize {
        self.state.lock().await.ready.len()
    }

    pub async fn in_flight_len(&self) -> usize {
        self.state.lock().await.in_flight.len()
    }

    pub async fn acked(&self) -> usize {
        self.state.lock().await.acked
    }
}

#[async_trait]
impl JobPublisher for InMemoryQueue {
    async fn publish(&self, job: &ImageJob) -> QueueResult<()> {
        let payload = job.encode()?;
        let mut state = self.state.lock().await;
        let offset = state.next_offset;
        state.next_offset += 1;
        state.ready.push_back((offset, payload));
        state.published.push(job.clone());
        Ok(())
    }

    async fn dead_letter(&self, letter: &DeadLetter) -> QueueResult<()> {
        self.state.lock().await.dead_letters.push(letter.clone());
        Ok(())
    }
}

#[async_trait]
impl JobSource for InMemoryQueue {
    async fn receive(&self) -> QueueResult<Option<Delivery>> {
        let mut state = self.state.lock().await;
        let Some((offset, payload)) = state.ready.pop_front() else {
            return Ok(None);
        };
        state.in_flight.insert(offset, payload.clone());

        Ok(Some(Delivery {
            topic: TOPIC.to_string(),
            partition: 0,
            offset,
            payload,
        }))
    }

    async fn ack(&self, delivery: &Delivery) -> QueueResult<()> {
        let mut state = self.state.lock().await;
        if state.in_flight.remove(&delivery.offset).is_some() {
            state.acked += 1;
        }
        Ok(())
    }

    async fn nack(&self, delivery: &Delivery) -> QueueResult<()> {
        let mut state = self.state.lock().await;
        if let Some(payload) = state.in_flight.remove(&delivery.offset) {
            state.ready.push_front((delivery.offset, payload));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_receive_ack() {
        let queue = InMemoryQueue::new();
        let job = ImageJob::new(1, vec!["http://x/a.jpg".into()]);
        queue.publish(&job).await.unwrap();

        let delivery = queue.receive().await.unwrap().unwrap();
        assert_eq!(ImageJob::decode(&delivery.payload).unwrap(), job);
        assert_eq!(queue.in_flight_len().await, 1);

        queue.ack(&delivery).await.unwrap();
        assert_eq!(queue.in_flight_len().await, 0);
        assert_eq!(queue.acked().await, 1);
        assert!(queue.receive().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_nack_redelivers_same_message() {
        let queue = InMemoryQueue::new();
        queue.push_raw(b"first".to_vec()).await;
        queue.push_raw(b"second".to_vec()).await;

        let first = queue.receive().await.unwrap().unwrap();
        queue.nack(&first).await.unwrap();

        let again = queue.receive().await.unwrap().unwrap();
        assert_eq!(again.offset, first.offset);
        assert_eq!(again.payload, b"first".to_vec());
    }
}
