//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. Every route answers
//! with a JSON body.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::Args;
use crate::ingest::{AckMode, ConsumerMetrics};
use crate::routes;
use crate::services::RecommendationService;
use crate::types::HealthError;

/// Which backing services were reachable at startup
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct BackendStatus {
    pub mongodb: bool,
    pub redis: bool,
    pub nats: bool,
}

/// A running ingestion consumer as seen by the status endpoint
#[derive(Clone)]
pub struct ConsumerHandle {
    pub name: &'static str,
    pub subject: String,
    pub ack_mode: AckMode,
    pub metrics: Arc<ConsumerMetrics>,
}

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub recommendations: RecommendationService,
    pub backends: BackendStatus,
    pub consumers: Vec<ConsumerHandle>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(args: Args, recommendations: RecommendationService, backends: BackendStatus) -> Self {
        Self {
            args,
            recommendations,
            backends,
            consumers: Vec::new(),
            started_at: Instant::now(),
        }
    }

    pub fn with_consumers(mut self, consumers: Vec<ConsumerHandle>) -> Self {
        self.consumers = consumers;
        self
    }

    /// Seconds since the state was created
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

/// Serve HTTP until `shutdown` turns true
pub async fn run(state: Arc<AppState>, mut shutdown: watch::Receiver<bool>) -> Result<(), HealthError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!("Health analytics listening on {}", state.args.listen);

    if state.args.dev_mode {
        warn!("Development mode enabled - in-memory backends may be in use");
    }

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    let state = Arc::clone(&state);
                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);

                        let service = service_fn(move |req| {
                            let state = Arc::clone(&state);
                            async move { handle_request(state, addr, req).await }
                        });

                        if let Err(err) = http1::Builder::new()
                            .serve_connection(io, service)
                            .await
                        {
                            error!("Error serving connection from {}: {:?}", addr, err);
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {:?}", e);
                }
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("HTTP server shutting down");
                    return Ok(());
                }
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or("").to_string();

    debug!("[{}] {} {}", addr, method, path);

    let response = match (&method, path.as_str()) {
        // Liveness probe
        (&Method::GET, "/health") | (&Method::GET, "/healthz") => routes::health_check(&state),

        // Readiness probe - requires the store and cache unless in dev mode
        (&Method::GET, "/ready") | (&Method::GET, "/readyz") => routes::readiness_check(&state),

        (&Method::GET, "/version") => routes::version_info(),

        // Consumer counters
        (&Method::GET, "/status") => routes::status_check(&state),

        (_, p) if p.starts_with(routes::RECOMMENDATIONS_PREFIX)
            || p.starts_with(routes::RECOMMENDATION_PREFIX) =>
        {
            routes::handle_recommendations_request(&state, &method, p, &query).await
        }

        _ => routes::not_found_response(&path),
    };

    Ok(response)
}
