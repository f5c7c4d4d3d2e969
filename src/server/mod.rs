//! HTTP server
//!
//! Health probes, consumer status and the recommendation query surface.

pub mod http;

pub use http::{run, AppState, BackendStatus, ConsumerHandle};
