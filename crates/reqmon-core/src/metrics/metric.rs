use std::fmt;
use std::sync::Arc;

use crate::error::{ReqmonError, Result};
use crate::metrics::backend::{CounterHandle, GaugeHandle, ObserverHandle, Observations};

/// Metric kind. `None` marks a metric that was never registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MetricKind {
    #[default]
    None,
    Counter,
    Gauge,
    Histogram,
    Summary,
}

impl MetricKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::None => "none",
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
            MetricKind::Summary => "summary",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Definition of a metric to register.
///
/// `labels` is positional: values passed to the update methods must follow
/// the same order. `buckets` is required for histograms, `objectives`
/// (`(quantile, allowed error)` pairs) for summaries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricOpts {
    pub kind: MetricKind,
    pub name: String,
    pub description: String,
    pub labels: Vec<String>,
    pub buckets: Vec<f64>,
    pub objectives: Vec<(f64, f64)>,
}

impl MetricOpts {
    pub fn new(kind: MetricKind, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn counter(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(MetricKind::Counter, name, description)
    }

    pub fn gauge(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(MetricKind::Gauge, name, description)
    }

    pub fn histogram(
        name: impl Into<String>,
        description: impl Into<String>,
        buckets: &[f64],
    ) -> Self {
        Self {
            buckets: buckets.to_vec(),
            ..Self::new(MetricKind::Histogram, name, description)
        }
    }

    pub fn summary(
        name: impl Into<String>,
        description: impl Into<String>,
        objectives: &[(f64, f64)],
    ) -> Self {
        Self {
            objectives: objectives.to_vec(),
            ..Self::new(MetricKind::Summary, name, description)
        }
    }

    /// Set the label names.
    pub fn labels(mut self, labels: &[&str]) -> Self {
        self.labels = labels.iter().map(|s| s.to_string()).collect();
        self
    }
}

/// Backend collector, one variant per registrable kind.
#[derive(Clone)]
pub(crate) enum Collector {
    Counter(Arc<dyn CounterHandle>),
    Gauge(Arc<dyn GaugeHandle>),
    Histogram(Arc<dyn ObserverHandle>),
    Summary(Arc<dyn ObserverHandle>),
}

impl Collector {
    fn kind(&self) -> MetricKind {
        match self {
            Collector::Counter(_) => MetricKind::Counter,
            Collector::Gauge(_) => MetricKind::Gauge,
            Collector::Histogram(_) => MetricKind::Histogram,
            Collector::Summary(_) => MetricKind::Summary,
        }
    }
}

impl fmt::Debug for Collector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Collector::{}", self.kind())
    }
}

/// A named metric handle.
///
/// Obtained from [`MetricRegistry::get_metric`](crate::metrics::MetricRegistry::get_metric).
/// A handle for an unknown name has kind [`MetricKind::None`]; every update
/// on it fails with `MetricNotRegistered`.
#[derive(Debug, Clone)]
pub struct Metric {
    name: String,
    description: String,
    labels: Vec<String>,
    collector: Option<Collector>,
}

impl Metric {
    pub(crate) fn registered(opts: MetricOpts, collector: Collector) -> Self {
        Self {
            name: opts.name,
            description: opts.description,
            labels: opts.labels,
            collector: Some(collector),
        }
    }

    /// Placeholder for a name with no registration.
    pub fn unregistered(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            labels: Vec::new(),
            collector: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn kind(&self) -> MetricKind {
        self.collector
            .as_ref()
            .map(Collector::kind)
            .unwrap_or(MetricKind::None)
    }

    pub fn is_registered(&self) -> bool {
        self.collector.is_some()
    }

    /// Set a gauge to `value`.
    pub fn set_gauge_value(&self, label_values: &[&str], value: f64) -> Result<()> {
        match self.collector()? {
            Collector::Gauge(g) => g.set(label_values, value),
            _ => Err(self.mismatch("set a gauge value")),
        }
    }

    /// Increment a counter or gauge by one.
    pub fn inc(&self, label_values: &[&str]) -> Result<()> {
        match self.collector()? {
            Collector::Counter(c) => c.add(label_values, 1.0),
            Collector::Gauge(g) => g.add(label_values, 1.0),
            _ => Err(self.mismatch("increment")),
        }
    }

    /// Add `value` to a counter or gauge.
    pub fn add(&self, label_values: &[&str], value: f64) -> Result<()> {
        match self.collector()? {
            Collector::Counter(c) => c.add(label_values, value),
            Collector::Gauge(g) => g.add(label_values, value),
            _ => Err(self.mismatch("add")),
        }
    }

    /// Record a sample on a histogram or summary.
    pub fn observe(&self, label_values: &[&str], value: f64) -> Result<()> {
        match self.collector()? {
            Collector::Histogram(h) | Collector::Summary(h) => h.observe(label_values, value),
            _ => Err(self.mismatch("observe")),
        }
    }

    /// Current value of a counter or gauge series.
    pub fn value(&self, label_values: &[&str]) -> Result<f64> {
        match self.collector()? {
            Collector::Counter(c) => c.get(label_values),
            Collector::Gauge(g) => g.get(label_values),
            _ => Err(self.mismatch("read a value")),
        }
    }

    /// Sample count and sum of a histogram or summary series.
    pub fn observations(&self, label_values: &[&str]) -> Result<Observations> {
        match self.collector()? {
            Collector::Histogram(h) | Collector::Summary(h) => h.observations(label_values),
            _ => Err(self.mismatch("read observations")),
        }
    }

    fn collector(&self) -> Result<&Collector> {
        self.collector
            .as_ref()
            .ok_or_else(|| ReqmonError::MetricNotRegistered(self.name.clone()))
    }

    fn mismatch(&self, op: &'static str) -> ReqmonError {
        ReqmonError::MetricKindMismatch {
            name: self.name.clone(),
            kind: self.kind(),
            op,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::metrics::local::LocalBackend;
    use crate::metrics::MetricsBackend;

    fn counter(backend: &LocalBackend, name: &str, labels: &[&str]) -> Metric {
        let opts = MetricOpts::counter(name, "test counter").labels(labels);
        let c = backend.counter(&opts).unwrap();
        Metric::registered(opts, Collector::Counter(c))
    }

    #[test]
    fn unregistered_metric_rejects_every_operation() {
        let m = Metric::unregistered("ghost");
        assert_eq!(m.kind(), MetricKind::None);
        assert!(!m.is_registered());

        let errs = [
            m.inc(&[]).unwrap_err(),
            m.add(&[], 2.0).unwrap_err(),
            m.observe(&[], 0.5).unwrap_err(),
            m.set_gauge_value(&[], 1.0).unwrap_err(),
        ];
        for e in errs {
            assert_eq!(e.code().as_str(), "METRIC_NOT_REGISTERED");
            assert!(e.to_string().contains("ghost"));
        }
    }

    #[test]
    fn counter_rejects_observe_and_set() {
        let backend = LocalBackend::new();
        let m = counter(&backend, "jobs_total", &["status"]);

        m.inc(&["ok"]).unwrap();
        let e = m.observe(&["ok"], 3.0).unwrap_err();
        assert_eq!(e.code().as_str(), "METRIC_KIND_MISMATCH");
        let e = m.set_gauge_value(&["ok"], 3.0).unwrap_err();
        assert_eq!(e.code().as_str(), "METRIC_KIND_MISMATCH");

        assert_eq!(m.value(&["ok"]).unwrap(), 1.0);
    }

    #[test]
    fn gauge_accepts_set_inc_and_add() {
        let backend = LocalBackend::new();
        let opts = MetricOpts::gauge("queue_depth", "depth").labels(&["queue"]);
        let g = backend.gauge(&opts).unwrap();
        let m = Metric::registered(opts, Collector::Gauge(g));

        m.set_gauge_value(&["jobs"], 10.0).unwrap();
        m.inc(&["jobs"]).unwrap();
        m.add(&["jobs"], -4.0).unwrap();
        assert_eq!(m.value(&["jobs"]).unwrap(), 7.0);
        assert_eq!(m.kind(), MetricKind::Gauge);
        assert!(m.observe(&["jobs"], 1.0).is_err());
    }

    #[test]
    fn histogram_rejects_counter_operations() {
        let backend = LocalBackend::new();
        let opts = MetricOpts::histogram("latency", "latency", &[0.1, 1.0]);
        let h = backend.histogram(&opts).unwrap();
        let m = Metric::registered(opts, Collector::Histogram(h));

        m.observe(&[], 0.05).unwrap();
        assert_eq!(
            m.inc(&[]).unwrap_err().code().as_str(),
            "METRIC_KIND_MISMATCH"
        );
        assert_eq!(m.observations(&[]).unwrap().count, 1);
    }
}
