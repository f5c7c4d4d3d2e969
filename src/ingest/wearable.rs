//! Wearable reading ingestion

use std::sync::Arc;
use tracing::debug;

use super::consumer::{IngestError, IngestHandler};
use super::messages::WearableMessage;
use crate::db::schemas::{Metadata, WearableDoc};
use crate::db::{DocumentStore, TypedCollection};
use crate::types::Clock;

/// Consumer name and durable name on the wearable queue
pub const WEARABLE_CONSUMER: &str = "wearable_ingest";

/// Stores each reading exactly as the producer identified it
pub struct WearableIngest {
    readings: TypedCollection<WearableDoc>,
    clock: Arc<dyn Clock>,
}

impl WearableIngest {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            readings: TypedCollection::new(store),
            clock,
        }
    }
}

#[async_trait::async_trait]
impl IngestHandler for WearableIngest {
    fn name(&self) -> &'static str {
        WEARABLE_CONSUMER
    }

    async fn handle(&self, payload: &[u8], _message_id: Option<&str>) -> Result<(), IngestError> {
        let message: WearableMessage = serde_json::from_slice(payload)?;
        message.validate()?;

        let reading = WearableDoc {
            _id: None,
            metadata: Metadata::stamped(self.clock.now()),
            id: message.id,
            user_id: message.user_id,
            device_type: message.device_type,
            data_type: message.data_type,
            data_value: message.data_value,
            recorded_timestamp: message.recorded_timestamp,
        };

        match self.readings.insert_one(&reading).await {
            Ok(()) => {
                debug!(id = %reading.id, user_id = %reading.user_id, "Stored wearable reading");
                Ok(())
            }
            // Redelivery of a reading whose insert already landed
            Err(e) if e.is_conflict() => {
                debug!(id = %reading.id, user_id = %reading.user_id, "Wearable reading already stored");
                Ok(())
            }
            Err(e) => Err(IngestError::Persist(e)),
        }
    }
}
