//! JetStream-backed message source for the ingestion consumers
//!
//! Both ingestion subjects live on one file-backed stream. Each consumer gets
//! its own durable pull consumer filtered to its subject, so a restart resumes
//! where the previous process stopped.

use async_nats::jetstream::{
    self,
    consumer::{pull, AckPolicy, PullConsumer},
    stream::{Stream, StorageType},
    AckKind,
};
use futures_util::StreamExt;
use std::time::Duration;
use tracing::info;

use crate::ingest::{Delivery, Disposition, MessageSource};
use crate::types::{HealthError, Result};

/// Wait before JetStream redelivers a negatively acknowledged message
const NAK_DELAY: Duration = Duration::from_secs(5);

/// Stream definition for the ingestion subjects
pub struct StreamSpec<'a> {
    pub name: &'a str,
    pub subjects: Vec<String>,
}

/// Ensure the ingestion stream exists
pub async fn ensure_stream(jetstream: &jetstream::Context, spec: StreamSpec<'_>) -> Result<Stream> {
    let stream = jetstream
        .get_or_create_stream(jetstream::stream::Config {
            name: spec.name.to_string(),
            subjects: spec.subjects.clone(),
            storage: StorageType::File,
            ..Default::default()
        })
        .await
        .map_err(|e| HealthError::Nats(format!("Failed to create stream {}: {}", spec.name, e)))?;

    info!("Using stream {} with subjects {:?}", spec.name, spec.subjects);
    Ok(stream)
}

/// Ensure a durable, explicitly acked pull consumer for one subject
pub async fn ensure_consumer(
    stream: &Stream,
    durable_name: &str,
    subject: &str,
    max_deliver: i64,
) -> Result<PullConsumer> {
    let consumer = stream
        .get_or_create_consumer(
            durable_name,
            pull::Config {
                durable_name: Some(durable_name.to_string()),
                ack_policy: AckPolicy::Explicit,
                filter_subject: subject.to_string(),
                max_deliver,
                ..Default::default()
            },
        )
        .await
        .map_err(|e| {
            HealthError::Nats(format!("Failed to create consumer {}: {}", durable_name, e))
        })?;

    info!("Using consumer {} on {}", durable_name, subject);
    Ok(consumer)
}

/// Continuous pull stream over one durable consumer
pub struct JetStreamSource {
    messages: pull::Stream,
}

impl JetStreamSource {
    pub async fn new(consumer: &PullConsumer) -> Result<Self> {
        let messages = consumer
            .messages()
            .await
            .map_err(|e| HealthError::Nats(format!("Failed to open message stream: {}", e)))?;
        Ok(Self { messages })
    }
}

#[async_trait::async_trait]
impl MessageSource for JetStreamSource {
    type Delivery = JetStreamDelivery;

    async fn next(&mut self) -> Option<Result<JetStreamDelivery>> {
        let next = self.messages.next().await?;
        Some(
            next.map(|message| JetStreamDelivery { message })
                .map_err(|e| HealthError::Nats(format!("Error receiving message: {}", e))),
        )
    }
}

/// One JetStream message awaiting settlement
pub struct JetStreamDelivery {
    message: jetstream::Message,
}

#[async_trait::async_trait]
impl Delivery for JetStreamDelivery {
    fn payload(&self) -> &[u8] {
        &self.message.payload
    }

    /// Stream name, stream sequence and publish time, which redeliveries share
    ///
    /// The publish time keeps ids distinct if the stream is recreated and its
    /// sequence restarts.
    fn message_id(&self) -> Option<String> {
        let info = self.message.info().ok()?;
        Some(format!(
            "{}:{}:{}",
            info.stream,
            info.stream_sequence,
            info.published.unix_timestamp_nanos()
        ))
    }

    async fn settle(&self, disposition: Disposition) -> Result<()> {
        self.message
            .ack_with(ack_kind(disposition))
            .await
            .map_err(|e| HealthError::Nats(format!("Failed to settle message: {}", e)))
    }
}

fn ack_kind(disposition: Disposition) -> AckKind {
    match disposition {
        Disposition::Ack => AckKind::Ack,
        Disposition::Nak => AckKind::Nak(Some(NAK_DELAY)),
        Disposition::Term => AckKind::Term,
    }
}
