//! reqmon axum integration.
//!
//! This crate wires the core registry and bloom filter into an HTTP service:
//! the `Monitor` (config + registry + visitor filter), the per-request
//! interceptor, its axum middleware adapter, the scrape endpoint, and the
//! layers and sample routes used by the demo binary (`main.rs`) and by
//! integration tests.

pub mod api;
pub mod config;
pub mod interceptor;
pub mod layers;
pub mod middleware;
pub mod monitor;
pub mod ops;
pub mod router;

pub use interceptor::{RequestContext, RequestSummary};
pub use monitor::Monitor;
