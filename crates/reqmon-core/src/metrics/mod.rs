//! Typed metrics: kinds, handles, registry, and backends.
//!
//! A [`MetricRegistry`] owns one [`MetricsBackend`] and a name → [`Metric`]
//! map. Registration happens with `&mut` access during bootstrap; afterwards
//! the registry is shared read-only and every update goes through the
//! collector handles, which are safe to use from many threads.

pub mod backend;
pub mod local;
pub mod metric;
pub mod registry;

pub use backend::{CounterHandle, GaugeHandle, MetricsBackend, ObserverHandle, Observations};
pub use local::LocalBackend;
pub use metric::{Metric, MetricKind, MetricOpts};
pub use registry::MetricRegistry;
