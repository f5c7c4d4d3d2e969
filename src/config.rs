//! Configuration for the health analytics service
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;

use crate::ingest::AckMode;
use crate::types::HealthError;

/// Health analytics - queue ingestion and recommendation queries
#[derive(Parser, Debug, Clone)]
#[command(name = "health-analytics")]
#[command(about = "Ingests wearable readings and health recommendations from NATS")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:50052")]
    pub listen: SocketAddr,

    /// Enable development mode (in-memory store and cache when backends are down)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// NATS configuration
    #[command(flatten)]
    pub nats: NatsArgs,

    /// Ingestion stream and consumer configuration
    #[command(flatten)]
    pub ingest: IngestArgs,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "health_medicine")]
    pub mongodb_db: String,

    /// Redis URL for the recommendation cache
    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379/0")]
    pub redis_url: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// NATS connection configuration
#[derive(Parser, Debug, Clone)]
pub struct NatsArgs {
    /// NATS server URL
    #[arg(long, env = "NATS_URL", default_value = "nats://127.0.0.1:4222")]
    pub nats_url: String,

    /// NATS username (optional)
    #[arg(long, env = "NATS_USER")]
    pub nats_user: Option<String>,

    /// NATS password (optional)
    #[arg(long, env = "NATS_PASSWORD")]
    pub nats_password: Option<String>,
}

/// JetStream ingestion configuration
#[derive(Parser, Debug, Clone)]
pub struct IngestArgs {
    /// JetStream stream holding both ingestion subjects
    #[arg(long, env = "INGEST_STREAM", default_value = "HEALTH_INGEST")]
    pub stream: String,

    /// Subject carrying wearable readings
    #[arg(long, env = "WEARABLE_SUBJECT", default_value = "wearable_data_queue")]
    pub wearable_subject: String,

    /// Subject carrying health recommendations
    #[arg(
        long,
        env = "RECOMMENDATION_SUBJECT",
        default_value = "health_recommendations_queue"
    )]
    pub recommendation_subject: String,

    /// When messages are acknowledged
    #[arg(long, env = "ACK_MODE", value_enum, default_value_t = AckMode::AfterProcessing)]
    pub ack_mode: AckMode,

    /// Deliveries per message before JetStream gives up on it
    #[arg(long, env = "MAX_DELIVER", default_value = "5")]
    pub max_deliver: i64,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), HealthError> {
        let ingest = &self.ingest;
        let invalid = |message: &str| Err(HealthError::Config(message.to_string()));

        if ingest.stream.trim().is_empty() {
            return invalid("INGEST_STREAM must not be empty");
        }

        if ingest.wearable_subject.trim().is_empty()
            || ingest.recommendation_subject.trim().is_empty()
        {
            return invalid("WEARABLE_SUBJECT and RECOMMENDATION_SUBJECT must not be empty");
        }

        if ingest.wearable_subject == ingest.recommendation_subject {
            return invalid("WEARABLE_SUBJECT and RECOMMENDATION_SUBJECT must differ");
        }

        if ingest.max_deliver == 0 {
            return invalid("MAX_DELIVER must be positive, or negative for unlimited");
        }

        if self.mongodb_db.trim().is_empty() {
            return invalid("MONGODB_DB must not be empty");
        }

        Ok(())
    }
}
