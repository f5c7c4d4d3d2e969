//! Health analytics - queue ingestion and recommendation queries

use clap::Parser;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use health_analytics::{
    cache::{MemoryCache, ProjectionCache, RedisCache},
    config::Args,
    db::{self, DocumentStore, MemoryDocumentStore, MongoClient, MongoDocumentStore},
    ingest::{
        IngestConsumer, IngestHandler, RecommendationIngest, WearableIngest,
        RECOMMENDATION_CONSUMER, WEARABLE_CONSUMER,
    },
    logging,
    nats::{ensure_consumer, ensure_stream, JetStreamSource, NatsClient, StreamSpec},
    server::{self, AppState, BackendStatus, ConsumerHandle},
    services::RecommendationService,
    types::{Clock, SystemClock},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    logging::init(&args.log_level, args.log_format);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Health Analytics");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("MongoDB: {} (db {})", args.mongodb_uri, args.mongodb_db);
    info!("Redis: {}", args.redis_url);
    info!("NATS: {}", args.nats.nats_url);
    info!(
        "Stream: {} ({}, {})",
        args.ingest.stream, args.ingest.wearable_subject, args.ingest.recommendation_subject
    );
    info!("Ack mode: {:?}", args.ingest.ack_mode);
    info!("======================================");

    let mut backends = BackendStatus::default();

    // MongoDB (in-memory fallback in dev mode)
    let store: Arc<dyn DocumentStore> = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => {
            if let Err(e) = db::apply_all_indexes(&client).await {
                warn!("Failed to apply indexes (continuing): {}", e);
            }
            backends.mongodb = true;
            Arc::new(MongoDocumentStore::new(client))
        }
        Err(e) => {
            if args.dev_mode {
                warn!("MongoDB connection failed (dev mode, using in-memory store): {}", e);
                Arc::new(MemoryDocumentStore::new())
            } else {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    // Redis (in-memory fallback in dev mode)
    let cache: Arc<dyn ProjectionCache> = match RedisCache::new(&args.redis_url).await {
        Ok(cache) => {
            backends.redis = true;
            Arc::new(cache)
        }
        Err(e) => {
            if args.dev_mode {
                warn!("Redis connection failed (dev mode, using in-memory cache): {}", e);
                Arc::new(MemoryCache::new())
            } else {
                error!("Redis connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    // NATS (no consumers in dev mode when unreachable)
    let nats = match NatsClient::new(&args.nats, "health-analytics").await {
        Ok(client) => {
            backends.nats = true;
            Some(client)
        }
        Err(e) => {
            if args.dev_mode {
                warn!("NATS connection failed (dev mode, ingestion disabled): {}", e);
                None
            } else {
                error!("NATS connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut consumers = Vec::new();
    let mut tasks = Vec::new();

    if let Some(ref nats) = nats {
        let ingest = &args.ingest;
        let stream = ensure_stream(
            nats.jetstream(),
            StreamSpec {
                name: &ingest.stream,
                subjects: vec![
                    ingest.wearable_subject.clone(),
                    ingest.recommendation_subject.clone(),
                ],
            },
        )
        .await?;

        let (handle, task) = start_consumer(
            &stream,
            &args,
            &ingest.wearable_subject,
            WearableIngest::new(Arc::clone(&store), Arc::clone(&clock)),
            shutdown_rx.clone(),
        )
        .await?;
        consumers.push(handle);
        tasks.push(task);

        let (handle, task) = start_consumer(
            &stream,
            &args,
            &ingest.recommendation_subject,
            RecommendationIngest::new(Arc::clone(&store), Arc::clone(&cache), Arc::clone(&clock)),
            shutdown_rx.clone(),
        )
        .await?;
        consumers.push(handle);
        tasks.push(task);

        info!(
            "Ingestion consumers started: {}, {}",
            WEARABLE_CONSUMER, RECOMMENDATION_CONSUMER
        );
    }

    let recommendations = RecommendationService::new(store, cache, clock);
    let state = Arc::new(
        AppState::new(args.clone(), recommendations, backends).with_consumers(consumers),
    );

    let server_task = tokio::spawn(server::run(Arc::clone(&state), shutdown_rx));

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    match server_task.await {
        Ok(Err(e)) => error!("Server error: {}", e),
        Err(e) => error!("Server task error: {}", e),
        Ok(Ok(())) => {}
    }

    for task in tasks {
        if let Err(e) = task.await {
            error!("Consumer task error: {}", e);
        }
    }

    if let Some(nats) = nats {
        if let Err(e) = nats.flush().await {
            warn!("NATS flush on shutdown failed: {}", e);
        }
    }

    info!("Health analytics stopped");
    Ok(())
}

/// Bind a durable consumer for `subject` and spawn its ingestion loop
async fn start_consumer<H: IngestHandler + 'static>(
    stream: &async_nats::jetstream::stream::Stream,
    args: &Args,
    subject: &str,
    handler: H,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<(ConsumerHandle, JoinHandle<()>)> {
    let name = handler.name();
    let consumer = ensure_consumer(stream, name, subject, args.ingest.max_deliver).await?;
    let source = JetStreamSource::new(&consumer).await?;

    let ingest = IngestConsumer::new(handler, args.ingest.ack_mode);
    let handle = ConsumerHandle {
        name,
        subject: subject.to_string(),
        ack_mode: ingest.ack_mode(),
        metrics: ingest.metrics(),
    };

    let task = tokio::spawn(async move { ingest.run(source, shutdown).await });
    Ok((handle, task))
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
