//! Health Publish - push JSON messages onto the ingestion subjects
//!
//! Reads one JSON message per line from stdin (or a single `--data` value)
//! and publishes each to the chosen queue through JetStream.
//!
//! Usage:
//!   echo '{"user_id":"u1","recommendation_type":"exercise","description":"walk 30min","priority":2}' \
//!     | health-publish --queue recommendation
//!
//! Environment variables:
//!   NATS_URL, NATS_USER, NATS_PASSWORD - NATS connection
//!   WEARABLE_SUBJECT, RECOMMENDATION_SUBJECT - target subjects

use bytes::Bytes;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use health_analytics::config::{LogFormat, NatsArgs};
use health_analytics::logging;
use health_analytics::nats::NatsClient;

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum Queue {
    Wearable,
    Recommendation,
}

#[derive(Parser, Debug)]
#[command(name = "health-publish")]
#[command(about = "Publish JSON messages to the health ingestion queues")]
#[command(version)]
struct Args {
    /// Target queue
    #[arg(long, value_enum)]
    queue: Queue,

    /// Single message to publish instead of reading stdin
    #[arg(long)]
    data: Option<String>,

    #[command(flatten)]
    nats: NatsArgs,

    /// Subject carrying wearable readings
    #[arg(long, env = "WEARABLE_SUBJECT", default_value = "wearable_data_queue")]
    wearable_subject: String,

    /// Subject carrying health recommendations
    #[arg(
        long,
        env = "RECOMMENDATION_SUBJECT",
        default_value = "health_recommendations_queue"
    )]
    recommendation_subject: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    logging::init("info", LogFormat::Text);

    let args = Args::parse();
    let subject = match args.queue {
        Queue::Wearable => args.wearable_subject.clone(),
        Queue::Recommendation => args.recommendation_subject.clone(),
    };

    let client = NatsClient::new(&args.nats, "health-publish").await?;

    let mut published = 0usize;
    if let Some(data) = args.data {
        client.publish(&subject, Bytes::from(data)).await?;
        published += 1;
    } else {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if serde_json::from_str::<serde_json::Value>(line).is_err() {
                warn!("Publishing line that is not valid JSON: {}", line);
            }
            if let Err(e) = client.publish(&subject, Bytes::from(line.to_string())).await {
                error!("Publish to {} failed: {}", subject, e);
                continue;
            }
            published += 1;
        }
    }

    client.flush().await?;
    info!("Published {} message(s) to {}", published, subject);
    Ok(())
}
