//! The message broker abstraction: publish task envelopes and status
//! updates, consume tasks off the input queue. One real AMQP
//! implementation, one in-memory test double with the same semantics.

use async_trait::async_trait;
use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Connection, ConnectionProperties};
use orchestrator_core::{Error, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

#[async_trait]
pub trait Broker: Send + Sync {
    async fn publish_task(&self, queue: &str, payload: &[u8]) -> Result<()>;
    async fn publish_status(&self, queue: &str, payload: &[u8]) -> Result<()>;
    /// Pop up to one message off `queue`, acking it immediately. Returns
    /// `None` if the queue is currently empty.
    async fn consume_one(&self, queue: &str) -> Result<Option<Vec<u8>>>;
    async fn queue_depth(&self, queue: &str) -> Result<u32>;
}

pub struct LapinBroker {
    connection: Connection,
}

impl LapinBroker {
    pub async fn connect(url: &str) -> Result<Self> {
        let connection = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| Error::internal(format!("amqp connect failed: {e}")))?;
        Ok(Self { connection })
    }

    async fn publish(&self, queue: &str, payload: &[u8]) -> Result<()> {
        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(|e| Error::internal(format!("amqp channel failed: {e}")))?;
        channel
            .queue_declare(queue, QueueDeclareOptions { durable: true, ..Default::default() }, FieldTable::default())
            .await
            .map_err(|e| Error::internal(format!("amqp queue_declare failed: {e}")))?;
        channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default().with_delivery_mode(2),
            )
            .await
            .map_err(|e| Error::internal(format!("amqp publish failed: {e}")))?
            .await
            .map_err(|e| Error::internal(format!("amqp publisher confirm failed: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl Broker for LapinBroker {
    async fn publish_task(&self, queue: &str, payload: &[u8]) -> Result<()> {
        self.publish(queue, payload).await
    }

    async fn publish_status(&self, queue: &str, payload: &[u8]) -> Result<()> {
        self.publish(queue, payload).await
    }

    async fn consume_one(&self, queue: &str) -> Result<Option<Vec<u8>>> {
        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(|e| Error::internal(format!("amqp channel failed: {e}")))?;
        channel
            .queue_declare(queue, QueueDeclareOptions { durable: true, ..Default::default() }, FieldTable::default())
            .await
            .map_err(|e| Error::internal(format!("amqp queue_declare failed: {e}")))?;
        let mut consumer = channel
            .basic_consume(
                queue,
                "orchestrator-worker",
                BasicConsumeOptions { no_ack: false, ..Default::default() },
                FieldTable::default(),
            )
            .await
            .map_err(|e| Error::internal(format!("amqp consume failed: {e}")))?;
        match tokio::time::timeout(std::time::Duration::from_millis(100), consumer.next()).await {
            Ok(Some(Ok(delivery))) => {
                let data = delivery.data.clone();
                delivery
                    .ack(BasicAckOptions::default())
                    .await
                    .map_err(|e| Error::internal(format!("amqp ack failed: {e}")))?;
                Ok(Some(data))
            }
            Ok(Some(Err(e))) => Err(Error::internal(format!("amqp delivery error: {e}"))),
            Ok(None) | Err(_) => Ok(None),
        }
    }

    async fn queue_depth(&self, queue: &str) -> Result<u32> {
        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(|e| Error::internal(format!("amqp channel failed: {e}")))?;
        let declared = channel
            .queue_declare(queue, QueueDeclareOptions { durable: true, passive: true, ..Default::default() }, FieldTable::default())
            .await
            .map_err(|e| Error::internal(format!("amqp queue_declare(passive) failed: {e}")))?;
        Ok(declared.message_count())
    }
}

/// FIFO-per-queue test double with the same publish/consume/depth contract
/// as [`LapinBroker`], minus the network.
#[derive(Default)]
pub struct InMemoryBroker {
    queues: Mutex<HashMap<String, VecDeque<Vec<u8>>>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn publish_task(&self, queue: &str, payload: &[u8]) -> Result<()> {
        self.queues.lock().unwrap().entry(queue.to_string()).or_default().push_back(payload.to_vec());
        Ok(())
    }

    async fn publish_status(&self, queue: &str, payload: &[u8]) -> Result<()> {
        self.publish_task(queue, payload).await
    }

    async fn consume_one(&self, queue: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.queues.lock().unwrap().get_mut(queue).and_then(|q| q.pop_front()))
    }

    async fn queue_depth(&self, queue: &str) -> Result<u32> {
        Ok(self.queues.lock().unwrap().get(queue).map(|q| q.len() as u32).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_broker_is_fifo_per_queue() {
        let broker = InMemoryBroker::new();
        broker.publish_task("q", b"first").await.unwrap();
        broker.publish_task("q", b"second").await.unwrap();
        assert_eq!(broker.queue_depth("q").await.unwrap(), 2);
        assert_eq!(broker.consume_one("q").await.unwrap(), Some(b"first".to_vec()));
        assert_eq!(broker.queue_depth("q").await.unwrap(), 1);
        assert_eq!(broker.consume_one("q").await.unwrap(), Some(b"second".to_vec()));
        assert_eq!(broker.consume_one("q").await.unwrap(), None);
    }
}
