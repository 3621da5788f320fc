//! MetricRegistry: name-unique registration and lookup.
//!
//! Construct once at startup, register every metric, then share via `Arc`.
//! Registration needs `&mut self`, so the map cannot change while traffic is
//! being served.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{ReqmonError, Result};
use crate::metrics::backend::MetricsBackend;
use crate::metrics::local::LocalBackend;
use crate::metrics::metric::{Collector, Metric, MetricKind, MetricOpts};

pub struct MetricRegistry {
    backend: Arc<dyn MetricsBackend>,
    metrics: HashMap<String, Metric>,
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new(Arc::new(LocalBackend::new()))
    }
}

impl fmt::Debug for MetricRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricRegistry")
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

impl MetricRegistry {
    pub fn new(backend: Arc<dyn MetricsBackend>) -> Self {
        Self {
            backend,
            metrics: HashMap::new(),
        }
    }

    /// Register a metric.
    ///
    /// All-or-nothing: on error the registry is unchanged.
    pub fn add_metric(&mut self, opts: MetricOpts) -> Result<()> {
        if opts.name.is_empty() {
            return Err(ReqmonError::EmptyMetricName);
        }
        if self.metrics.contains_key(&opts.name) {
            return Err(ReqmonError::DuplicateMetricName(opts.name));
        }

        let collector = match opts.kind {
            MetricKind::Counter => Collector::Counter(self.backend.counter(&opts)?),
            MetricKind::Gauge => Collector::Gauge(self.backend.gauge(&opts)?),
            MetricKind::Histogram => {
                if opts.buckets.is_empty() {
                    return Err(ReqmonError::MissingHistogramBuckets(opts.name));
                }
                Collector::Histogram(self.backend.histogram(&opts)?)
            }
            MetricKind::Summary => {
                if opts.objectives.is_empty() {
                    return Err(ReqmonError::MissingSummaryObjectives(opts.name));
                }
                Collector::Summary(self.backend.summary(&opts)?)
            }
            MetricKind::None => return Err(ReqmonError::UnsupportedMetricKind(opts.kind)),
        };

        tracing::debug!(metric = %opts.name, kind = %opts.kind, labels = ?opts.labels, "metric registered");
        self.metrics
            .insert(opts.name.clone(), Metric::registered(opts, collector));
        Ok(())
    }

    /// Look up a metric by name.
    ///
    /// Never fails: an unknown name yields a placeholder whose kind is
    /// `MetricKind::None`, and the error surfaces on the first update.
    pub fn get_metric(&self, name: &str) -> Cow<'_, Metric> {
        match self.metrics.get(name) {
            Some(m) => Cow::Borrowed(m),
            None => Cow::Owned(Metric::unregistered(name)),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.metrics.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.metrics.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn backend(&self) -> &Arc<dyn MetricsBackend> {
        &self.backend
    }

    /// Text exposition of everything the backend holds.
    pub fn render(&self) -> String {
        self.backend.render()
    }
}
