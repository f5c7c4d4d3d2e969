//! Consumer loop shared by both ingestion queues
//!
//! One loop per queue: pull a delivery, hand its payload to the handler,
//! settle it according to the configured ack mode, count the outcome and move
//! on. A failed message never stops the loop; only the end of the source or a
//! shutdown signal does.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::metrics::ConsumerMetrics;
use super::source::{Delivery, Disposition, MessageSource};
use crate::types::HealthError;

/// Pause after a failed pull before asking the source again
const RECEIVE_BACKOFF: Duration = Duration::from_secs(1);

/// When a delivery is acknowledged relative to its processing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AckMode {
    /// Ack as soon as the message arrives (at-most-once)
    OnDelivery,
    /// Settle once the outcome is known
    #[default]
    AfterProcessing,
}

/// Why one message did not make it all the way through
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("malformed payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid message: {0}")]
    Invalid(String),

    #[error("persist failed: {0}")]
    Persist(HealthError),

    #[error("projection write failed: {0}")]
    Projection(HealthError),
}

impl IngestError {
    /// Settlement for a failed message under `AckMode::AfterProcessing`
    ///
    /// A projection failure is acked: the durable write went through and the
    /// cache can be rebuilt from the store.
    pub fn disposition(&self) -> Disposition {
        match self {
            Self::Decode(_) | Self::Invalid(_) => Disposition::Term,
            Self::Persist(_) => Disposition::Nak,
            Self::Projection(_) => Disposition::Ack,
        }
    }
}

/// Turns one payload into durable state
#[async_trait::async_trait]
pub trait IngestHandler: Send + Sync {
    /// Short name used in logs and status output
    fn name(&self) -> &'static str;

    /// `message_id` identifies the queue message across redeliveries when
    /// the source provides one
    async fn handle(&self, payload: &[u8], message_id: Option<&str>) -> Result<(), IngestError>;
}

/// Drives one handler over one message source
pub struct IngestConsumer<H> {
    handler: H,
    ack_mode: AckMode,
    metrics: Arc<ConsumerMetrics>,
}

impl<H: IngestHandler> IngestConsumer<H> {
    pub fn new(handler: H, ack_mode: AckMode) -> Self {
        Self {
            handler,
            ack_mode,
            metrics: Arc::new(ConsumerMetrics::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.handler.name()
    }

    pub fn ack_mode(&self) -> AckMode {
        self.ack_mode
    }

    pub fn metrics(&self) -> Arc<ConsumerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Consume until the source ends or `shutdown` turns true
    ///
    /// Dropping the shutdown sender also stops the loop.
    pub async fn run<S: MessageSource>(&self, mut source: S, mut shutdown: watch::Receiver<bool>) {
        info!(
            consumer = self.name(),
            ack_mode = ?self.ack_mode,
            "Ingestion consumer started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                next = source.next() => match next {
                    Some(Ok(delivery)) => {
                        // Outcome is already logged and counted
                        let _ = self.process(&delivery).await;
                    }
                    Some(Err(e)) => {
                        self.metrics.record_receive_failure();
                        warn!(consumer = self.name(), "Error receiving message: {}", e);
                        tokio::time::sleep(RECEIVE_BACKOFF).await;
                    }
                    None => {
                        info!(consumer = self.name(), "Message source closed");
                        break;
                    }
                },
            }
        }

        let snapshot = self.metrics.snapshot();
        info!(
            consumer = self.name(),
            received = snapshot.received,
            processed = snapshot.processed,
            failed = snapshot.failed(),
            "Ingestion consumer stopped"
        );
    }

    /// Handle and settle a single delivery
    pub async fn process<D: Delivery>(&self, delivery: &D) -> Result<(), IngestError> {
        self.metrics.record_received();

        if self.ack_mode == AckMode::OnDelivery {
            self.settle(delivery, Disposition::Ack).await;
        }

        let message_id = delivery.message_id();
        let outcome = self
            .handler
            .handle(delivery.payload(), message_id.as_deref())
            .await;

        match &outcome {
            Ok(()) => {
                self.metrics.record_processed();
                debug!(consumer = self.name(), "Message ingested");
            }
            Err(e) => {
                self.metrics.record_failure(e);
                match e {
                    IngestError::Persist(_) => {
                        error!(consumer = self.name(), "Skipping message: {}", e)
                    }
                    _ => warn!(consumer = self.name(), "Skipping message: {}", e),
                }
            }
        }

        if self.ack_mode == AckMode::AfterProcessing {
            let disposition = match &outcome {
                Ok(()) => Disposition::Ack,
                Err(e) => e.disposition(),
            };
            self.settle(delivery, disposition).await;
        }

        outcome
    }

    async fn settle<D: Delivery>(&self, delivery: &D, disposition: Disposition) {
        if let Err(e) = delivery.settle(disposition).await {
            self.metrics.record_settle_failure();
            warn!(
                consumer = self.name(),
                ?disposition,
                "Failed to settle message: {}",
                e
            );
        }
    }
}
