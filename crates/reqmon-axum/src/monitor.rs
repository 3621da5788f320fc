//! Request monitor: config, metric registry, and the visitor bloom filter.
//!
//! Build it once at startup, register metrics (built-in and custom) while you
//! still own it, then wrap it in an `Arc` and hand it to the router.

use std::borrow::Cow;
use std::sync::Arc;

use reqmon_core::bloom::BloomFilter;
use reqmon_core::error::Result;
use reqmon_core::metrics::{LocalBackend, Metric, MetricOpts, MetricRegistry, MetricsBackend};

use crate::config::MonitorConfig;

pub const METRIC_REQUEST_TOTAL: &str = "gin_request_total";
pub const METRIC_REQUEST_UV: &str = "gin_request_uv";
pub const METRIC_URI_REQUEST_TOTAL: &str = "gin_uri_request_total";
pub const METRIC_REQUEST_BODY: &str = "gin_request_body_total";
pub const METRIC_RESPONSE_BODY: &str = "gin_response_body_total";
pub const METRIC_REQUEST_DURATION: &str = "gin_request_duration";
pub const METRIC_SLOW_REQUEST: &str = "gin_slow_request_total";

#[derive(Debug)]
pub struct Monitor {
    cfg: MonitorConfig,
    registry: MetricRegistry,
    visitors: BloomFilter,
}

impl Monitor {
    /// Monitor on a fresh in-process backend. Zero-valued config fields are
    /// replaced by their defaults.
    pub fn new(cfg: MonitorConfig) -> Self {
        Self::with_backend(cfg, Arc::new(LocalBackend::new()))
    }

    pub fn with_backend(cfg: MonitorConfig, backend: Arc<dyn MetricsBackend>) -> Self {
        Self {
            cfg: cfg.normalized(),
            registry: MetricRegistry::new(backend),
            visitors: BloomFilter::new(),
        }
    }

    /// `new` + `register_builtin_metrics`.
    pub fn with_builtin_metrics(cfg: MonitorConfig) -> Result<Self> {
        let mut m = Self::new(cfg);
        m.register_builtin_metrics()?;
        Ok(m)
    }

    /// Register the seven request metrics. Returns the first failure; treat
    /// it as fatal before serving traffic.
    pub fn register_builtin_metrics(&mut self) -> Result<()> {
        let route_labels = ["uri", "method", "code"];
        let builtins = [
            MetricOpts::counter(METRIC_REQUEST_TOTAL, "all the server received request num."),
            MetricOpts::counter(METRIC_REQUEST_UV, "all the server received ip num."),
            MetricOpts::counter(
                METRIC_URI_REQUEST_TOTAL,
                "all the server received request num with every uri.",
            )
            .labels(&route_labels),
            MetricOpts::counter(
                METRIC_REQUEST_BODY,
                "the server received request body size, unit byte",
            ),
            MetricOpts::counter(
                METRIC_RESPONSE_BODY,
                "the server send response body size, unit byte",
            ),
            MetricOpts::histogram(
                METRIC_REQUEST_DURATION,
                "the time server took to handle the request.",
                &self.cfg.duration_buckets,
            )
            .labels(&["uri"]),
            MetricOpts::counter(
                METRIC_SLOW_REQUEST,
                format!(
                    "the server handled slow requests counter, t={}.",
                    self.cfg.slow_time_secs
                ),
            )
            .labels(&route_labels),
        ];

        for opts in builtins {
            self.registry.add_metric(opts)?;
        }
        tracing::info!(
            metric_path = %self.cfg.metric_path,
            slow_time_secs = self.cfg.slow_time_secs,
            "request metrics registered"
        );
        Ok(())
    }

    /// Register a custom metric.
    pub fn add_metric(&mut self, opts: MetricOpts) -> Result<()> {
        self.registry.add_metric(opts)
    }

    pub fn get_metric(&self, name: &str) -> Cow<'_, Metric> {
        self.registry.get_metric(name)
    }

    pub fn metric_path(&self) -> &str {
        &self.cfg.metric_path
    }

    pub fn slow_time_secs(&self) -> u32 {
        self.cfg.slow_time_secs
    }

    pub fn duration_buckets(&self) -> &[f64] {
        &self.cfg.duration_buckets
    }

    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    pub fn visitors(&self) -> &BloomFilter {
        &self.visitors
    }

    /// Scrape body for the metric path.
    pub fn render(&self) -> String {
        self.registry.render()
    }
}
