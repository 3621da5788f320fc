//! reqmon core: bloom filter, typed metrics, and the metric registry.
//!
//! This crate holds everything the request monitor needs that does not depend
//! on an HTTP framework or async runtime: the visitor bloom filter, the
//! kind-checked `Metric` handle, the `MetricRegistry`, and the pluggable
//! `MetricsBackend` with its in-process implementation.
//!
//! # No panics
//! Metric updates run on the request path. Every fallible step returns
//! `ReqmonError`, and clippy denies `unwrap`, `expect`, and `panic!` here.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod bloom;
pub mod error;
pub mod metrics;

pub use error::{ErrorCode, ReqmonError, Result};
