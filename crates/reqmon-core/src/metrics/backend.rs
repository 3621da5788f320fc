//! Backend seam: the collectors a registry builds metrics on.
//!
//! A backend constructs one collector per registered metric and keeps it for
//! exposition. Handles must be `Send + Sync`; every update may race with any
//! other update on the same label combination and must not be lost.

use std::sync::Arc;

use crate::error::Result;
use crate::metrics::metric::MetricOpts;

/// Count and sum of the samples observed on one series.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Observations {
    pub count: u64,
    pub sum: f64,
}

/// Monotonic counter vector.
pub trait CounterHandle: Send + Sync {
    /// Add `value` (must not be negative) to the series.
    fn add(&self, label_values: &[&str], value: f64) -> Result<()>;
    /// Current value of the series; `0` if it was never touched.
    fn get(&self, label_values: &[&str]) -> Result<f64>;
}

/// Gauge vector (set or move in both directions).
pub trait GaugeHandle: Send + Sync {
    fn set(&self, label_values: &[&str], value: f64) -> Result<()>;
    fn add(&self, label_values: &[&str], value: f64) -> Result<()>;
    fn get(&self, label_values: &[&str]) -> Result<f64>;
}

/// Sample recorder shared by histograms and summaries.
pub trait ObserverHandle: Send + Sync {
    fn observe(&self, label_values: &[&str], value: f64) -> Result<()>;
    fn observations(&self, label_values: &[&str]) -> Result<Observations>;
}

/// Constructs and registers collectors, and renders them for scraping.
///
/// Kind-specific parameters (buckets, objectives) are read from `opts`; the
/// registry has already checked that they are present.
pub trait MetricsBackend: Send + Sync {
    fn counter(&self, opts: &MetricOpts) -> Result<Arc<dyn CounterHandle>>;
    fn gauge(&self, opts: &MetricOpts) -> Result<Arc<dyn GaugeHandle>>;
    fn histogram(&self, opts: &MetricOpts) -> Result<Arc<dyn ObserverHandle>>;
    fn summary(&self, opts: &MetricOpts) -> Result<Arc<dyn ObserverHandle>>;

    /// Text exposition of every registered collector.
    fn render(&self) -> String;
}
