//! NATS client wrapper
//!
//! Connection management with credentials and a JetStream context for the
//! ingestion consumers.

use async_nats::{jetstream, Client, ConnectOptions};
use bytes::Bytes;
use std::time::Duration;
use tracing::info;

use crate::config::NatsArgs;
use crate::types::HealthError;

/// Default ping interval for keep-alive
const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(120);

/// NATS client wrapper with JetStream support
#[derive(Clone)]
pub struct NatsClient {
    client: Client,
    jetstream: jetstream::Context,
}

impl NatsClient {
    /// Create a new NATS client
    pub async fn new(args: &NatsArgs, name: &str) -> Result<Self, HealthError> {
        info!("Connecting to NATS at {}", args.nats_url);

        // No retry_on_initial_connect: fail fast at startup, reconnect afterwards
        let mut options = ConnectOptions::new()
            .name(name)
            .ping_interval(DEFAULT_PING_INTERVAL)
            .connection_timeout(Duration::from_secs(5));

        if let (Some(user), Some(pass)) = (&args.nats_user, &args.nats_password) {
            options = options.user_and_password(user.clone(), pass.clone());
        }

        let client = options
            .connect(&args.nats_url)
            .await
            .map_err(|e| HealthError::Nats(format!("Failed to connect: {}", e)))?;

        info!("Connected to NATS at {} as {}", args.nats_url, name);

        let jetstream = jetstream::new(client.clone());

        Ok(Self {
            client,
            jetstream,
        })
    }

    pub fn jetstream(&self) -> &jetstream::Context {
        &self.jetstream
    }

    /// Publish to a JetStream subject and wait for the stream's ack
    pub async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), HealthError> {
        self.jetstream
            .publish(subject.to_string(), payload)
            .await
            .map_err(|e| HealthError::Nats(format!("Publish failed: {}", e)))?
            .await
            .map_err(|e| HealthError::Nats(format!("Publish not acknowledged: {}", e)))?;
        Ok(())
    }

    /// Flush pending messages
    pub async fn flush(&self) -> Result<(), HealthError> {
        self.client
            .flush()
            .await
            .map_err(|e| HealthError::Nats(format!("Flush failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    // Integration tests would require a running NATS server with JetStream
}
