//! NATS messaging layer
//!
//! JetStream carries both ingestion queues. `subscription` adapts a durable
//! pull consumer to the `MessageSource` the ingestion loop reads from.

pub mod client;
pub mod subscription;

pub use client::NatsClient;
pub use subscription::{ensure_consumer, ensure_stream, JetStreamDelivery, JetStreamSource, StreamSpec};
