//! Per-consumer counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use super::consumer::IngestError;

/// Lock-free counters updated by one consumer loop
#[derive(Debug, Default)]
pub struct ConsumerMetrics {
    received: AtomicU64,
    processed: AtomicU64,
    decode_failures: AtomicU64,
    invalid: AtomicU64,
    persist_failures: AtomicU64,
    projection_failures: AtomicU64,
    receive_failures: AtomicU64,
    settle_failures: AtomicU64,
}

/// Point-in-time copy of `ConsumerMetrics`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub received: u64,
    pub processed: u64,
    pub decode_failures: u64,
    pub invalid: u64,
    pub persist_failures: u64,
    pub projection_failures: u64,
    pub receive_failures: u64,
    pub settle_failures: u64,
}

impl ConsumerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_receive_failure(&self) {
        self.receive_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_settle_failure(&self) {
        self.settle_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self, error: &IngestError) {
        let counter = match error {
            IngestError::Decode(_) => &self.decode_failures,
            IngestError::Invalid(_) => &self.invalid,
            IngestError::Persist(_) => &self.persist_failures,
            IngestError::Projection(_) => &self.projection_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            invalid: self.invalid.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
            projection_failures: self.projection_failures.load(Ordering::Relaxed),
            receive_failures: self.receive_failures.load(Ordering::Relaxed),
            settle_failures: self.settle_failures.load(Ordering::Relaxed),
        }
    }
}

impl MetricsSnapshot {
    /// Messages that did not complete every write
    pub fn failed(&self) -> u64 {
        self.decode_failures + self.invalid + self.persist_failures + self.projection_failures
    }
}
