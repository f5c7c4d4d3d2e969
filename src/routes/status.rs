//! Status endpoint: ingestion consumer counters

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;

use super::json_response;
use crate::ingest::{AckMode, MetricsSnapshot};
use crate::server::{AppState, BackendStatus};

#[derive(Debug, Serialize)]
pub struct ConsumerStatus {
    pub name: &'static str,
    pub subject: String,
    pub ack_mode: AckMode,
    pub metrics: MetricsSnapshot,
}

/// Status response payload
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub dev_mode: bool,
    pub uptime: u64,
    pub stream: String,
    pub backends: BackendStatus,
    pub consumers: Vec<ConsumerStatus>,
}

/// Handle status endpoint (/status)
pub fn status_check(state: &AppState) -> Response<Full<Bytes>> {
    let consumers = state
        .consumers
        .iter()
        .map(|consumer| ConsumerStatus {
            name: consumer.name,
            subject: consumer.subject.clone(),
            ack_mode: consumer.ack_mode,
            metrics: consumer.metrics.snapshot(),
        })
        .collect();

    let response = StatusResponse {
        service: "health-analytics",
        version: env!("CARGO_PKG_VERSION"),
        dev_mode: state.args.dev_mode,
        uptime: state.uptime_secs(),
        stream: state.args.ingest.stream.clone(),
        backends: state.backends,
        consumers,
    };

    json_response(StatusCode::OK, &response)
}
