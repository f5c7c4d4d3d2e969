//! Queue ingestion
//!
//! Two consumers feed the document store from the queue: wearable readings,
//! and health recommendations (which also refresh the per-user cache entry).

pub mod consumer;
pub mod messages;
pub mod metrics;
pub mod recommendation;
pub mod source;
pub mod wearable;

pub use consumer::{AckMode, IngestConsumer, IngestError, IngestHandler};
pub use messages::{RecommendationMessage, WearableMessage};
pub use metrics::{ConsumerMetrics, MetricsSnapshot};
pub use recommendation::{RecommendationIngest, RECOMMENDATION_CONSUMER};
pub use source::{
    ChannelDelivery, ChannelPublisher, ChannelSource, Delivery, Disposition, MessageSource,
    Settlements,
};
pub use wearable::{WearableIngest, WEARABLE_CONSUMER};
