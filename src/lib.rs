//! Health analytics - queue ingestion for wearable readings and recommendations
//!
//! Two JetStream consumers write incoming wearable readings and health
//! recommendations to MongoDB. Each recommendation also replaces its user's
//! entry in the Redis cache, which backs the realtime query.
//!
//! ## Services
//!
//! - **Ingestion**: durable JetStream consumers with configurable ack mode
//! - **Store**: MongoDB document store (in-memory stand-in for tests and dev mode)
//! - **Cache**: per-user recommendation projection in Redis
//! - **Queries**: realtime, daily, weekly and by-id reads over HTTP
//! - **Repair**: retraction and store-derived projection rebuild

pub mod cache;
pub mod config;
pub mod db;
pub mod ingest;
pub mod logging;
pub mod nats;
pub mod routes;
pub mod server;
pub mod services;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{HealthError, Result};
