//! Message sources for the ingestion consumers
//!
//! A consumer pulls deliveries from a `MessageSource` and settles each one
//! with a `Disposition` once it knows the outcome. JetStream backs this in
//! production; the channel source below backs tests and local replays.

use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::types::{HealthError, Result};

/// Settlement decision for one delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Processed (or accepted); never redeliver
    Ack,
    /// Failed transiently; redeliver
    Nak,
    /// Unprocessable; never redeliver
    Term,
}

/// One message handed to a consumer
#[async_trait::async_trait]
pub trait Delivery: Send + Sync {
    fn payload(&self) -> &[u8];

    /// Identity of the queue message, unchanged across redeliveries
    fn message_id(&self) -> Option<String> {
        None
    }

    /// Report the outcome back to the queue
    async fn settle(&self, disposition: Disposition) -> Result<()>;
}

/// Stream of deliveries for one subject
#[async_trait::async_trait]
pub trait MessageSource: Send {
    type Delivery: Delivery + 'static;

    /// Next delivery; `None` once the source is exhausted
    async fn next(&mut self) -> Option<Result<Self::Delivery>>;
}

/// Record of settlements made against channel deliveries
pub type Settlements = Arc<Mutex<Vec<(Vec<u8>, Disposition)>>>;

/// In-process delivery that records how it was settled
pub struct ChannelDelivery {
    message_id: Option<String>,
    payload: Vec<u8>,
    settlements: Settlements,
}

#[async_trait::async_trait]
impl Delivery for ChannelDelivery {
    fn payload(&self) -> &[u8] {
        &self.payload
    }

    fn message_id(&self) -> Option<String> {
        self.message_id.clone()
    }

    async fn settle(&self, disposition: Disposition) -> Result<()> {
        self.settlements
            .lock()
            .map_err(|_| HealthError::Internal("settlement log poisoned".into()))?
            .push((self.payload.clone(), disposition));
        Ok(())
    }
}

/// Channel-backed source
pub struct ChannelSource {
    receiver: mpsc::Receiver<(Option<String>, Vec<u8>)>,
    settlements: Settlements,
}

/// Producer half of a channel source
#[derive(Clone)]
pub struct ChannelPublisher {
    sender: mpsc::Sender<(Option<String>, Vec<u8>)>,
}

impl ChannelPublisher {
    /// Publish a message without a stable identity
    pub async fn publish(&self, payload: impl Into<Vec<u8>>) -> Result<()> {
        self.send(None, payload.into()).await
    }

    /// Publish a message under `message_id`; repeat it to simulate a redelivery
    pub async fn publish_with_id(
        &self,
        message_id: &str,
        payload: impl Into<Vec<u8>>,
    ) -> Result<()> {
        self.send(Some(message_id.to_string()), payload.into()).await
    }

    async fn send(&self, message_id: Option<String>, payload: Vec<u8>) -> Result<()> {
        self.sender
            .send((message_id, payload))
            .await
            .map_err(|_| HealthError::Internal("channel source closed".into()))
    }
}

impl ChannelSource {
    /// Create a bounded source; the source ends once every publisher is dropped
    pub fn new(capacity: usize) -> (ChannelPublisher, Self) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (
            ChannelPublisher { sender },
            Self {
                receiver,
                settlements: Arc::new(Mutex::new(Vec::new())),
            },
        )
    }

    /// Shared view of every settlement made so far
    pub fn settlements(&self) -> Settlements {
        Arc::clone(&self.settlements)
    }
}

#[async_trait::async_trait]
impl MessageSource for ChannelSource {
    type Delivery = ChannelDelivery;

    async fn next(&mut self) -> Option<Result<ChannelDelivery>> {
        let (message_id, payload) = self.receiver.recv().await?;
        Some(Ok(ChannelDelivery {
            message_id,
            payload,
            settlements: Arc::clone(&self.settlements),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_source_records_settlements() {
        let (publisher, mut source) = ChannelSource::new(4);
        let settlements = source.settlements();

        publisher.publish("one").await.unwrap();
        publisher.publish_with_id("HEALTH_INGEST:2", "two").await.unwrap();
        drop(publisher);

        let delivery = source.next().await.unwrap().unwrap();
        assert_eq!(delivery.payload(), b"one");
        assert_eq!(delivery.message_id(), None);
        delivery.settle(Disposition::Term).await.unwrap();

        let delivery = source.next().await.unwrap().unwrap();
        assert_eq!(delivery.message_id().as_deref(), Some("HEALTH_INGEST:2"));
        delivery.settle(Disposition::Ack).await.unwrap();

        assert!(source.next().await.is_none());
        let log = settlements.lock().unwrap();
        assert_eq!(
            log.as_slice(),
            &[
                (b"one".to_vec(), Disposition::Term),
                (b"two".to_vec(), Disposition::Ack),
            ]
        );
    }
}
