//! In-process metrics backend.
//!
//! Counter, gauge, histogram, and summary vectors keyed by positional label
//! values and backed by `DashMap`. Values are `f64` stored in atomics so
//! concurrent updates on one series never get lost. `render` produces
//! Prometheus text exposition with series sorted by metric name, then by
//! label set, so scrapes are deterministic.

use std::collections::VecDeque;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::{ReqmonError, Result};
use crate::metrics::backend::{
    CounterHandle, GaugeHandle, MetricsBackend, ObserverHandle, Observations,
};
use crate::metrics::metric::MetricOpts;

/// Observations kept per summary series for quantile estimation.
///
/// Count-based: quantiles cover the last `SUMMARY_WINDOW` samples no matter
/// how old they are. A Prometheus client summary instead ages samples out of
/// a time window (10 minutes by default) and estimates within the declared
/// error; here the quantiles are exact, so the objectives' error bounds are
/// only validated.
pub const SUMMARY_WINDOW: usize = 500;

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn escape_help(v: &str) -> String {
    v.replace('\\', "\\\\").replace('\n', "\\n")
}

fn fmt_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v == f64::INFINITY {
        "+Inf".to_string()
    } else if v == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        v.to_string()
    }
}

fn braces(labels: &str, extra: &str) -> String {
    match (labels.is_empty(), extra.is_empty()) {
        (true, true) => String::new(),
        (false, true) => format!("{{{labels}}}"),
        (true, false) => format!("{{{extra}}}"),
        (false, false) => format!("{{{labels},{extra}}}"),
    }
}

/// `f64` cell updated with compare-and-swap on its bit pattern.
#[derive(Debug, Default)]
struct AtomicF64 {
    bits: AtomicU64,
}

impl AtomicF64 {
    fn load(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }

    fn store(&self, v: f64) {
        self.bits.store(v.to_bits(), Ordering::Relaxed);
    }

    fn add(&self, v: f64) {
        let mut current = self.bits.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + v).to_bits();
            match self
                .bits
                .compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}

/// Run `f` on the series for `key`, creating it with `init` on first use.
///
/// Existing series only take a shard read lock.
fn with_series<V, R>(
    map: &DashMap<Vec<String>, V>,
    key: Vec<String>,
    init: impl FnOnce() -> V,
    f: impl FnOnce(&V) -> R,
) -> R {
    if let Some(series) = map.get(&key) {
        return f(series.value());
    }
    let series = map.entry(key).or_insert_with(init);
    f(series.value())
}

fn valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

fn valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    !name.starts_with("__") && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Name, help, and label schema shared by every vector type.
#[derive(Debug)]
struct Desc {
    name: String,
    help: String,
    labels: Vec<String>,
}

impl Desc {
    fn from_opts(opts: &MetricOpts, reserved: Option<&str>) -> Result<Self> {
        if !valid_metric_name(&opts.name) {
            return Err(ReqmonError::InvalidMetric(format!(
                "'{}' is not a valid metric name",
                opts.name
            )));
        }
        for (i, l) in opts.labels.iter().enumerate() {
            if !valid_label_name(l) || Some(l.as_str()) == reserved {
                return Err(ReqmonError::InvalidMetric(format!(
                    "metric '{}' has invalid label name '{l}'",
                    opts.name
                )));
            }
            if opts.labels[..i].contains(l) {
                return Err(ReqmonError::InvalidMetric(format!(
                    "metric '{}' repeats label name '{l}'",
                    opts.name
                )));
            }
        }
        Ok(Self {
            name: opts.name.clone(),
            help: opts.description.clone(),
            labels: opts.labels.clone(),
        })
    }

    /// Positional label values -> series key.
    fn key(&self, label_values: &[&str]) -> Result<Vec<String>> {
        if label_values.len() != self.labels.len() {
            return Err(ReqmonError::InvalidMetric(format!(
                "metric '{}' expects {} label values, got {}",
                self.name,
                self.labels.len(),
                label_values.len()
            )));
        }
        Ok(label_values.iter().map(|v| v.to_string()).collect())
    }

    fn label_str(&self, key: &[String]) -> String {
        self.labels
            .iter()
            .zip(key)
            .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn header(&self, kind: &str, out: &mut String) {
        let _ = writeln!(out, "# HELP {} {}", self.name, escape_help(&self.help));
        let _ = writeln!(out, "# TYPE {} {}", self.name, kind);
    }
}

pub struct CounterVec {
    desc: Desc,
    map: DashMap<Vec<String>, AtomicF64>,
}

impl CounterVec {
    fn new(desc: Desc) -> Self {
        Self {
            desc,
            map: DashMap::new(),
        }
    }

    /// Render in Prometheus text exposition format.
    fn render(&self, out: &mut String) {
        self.desc.header("counter", out);
        let mut rows: Vec<(String, f64)> = self
            .map
            .iter()
            .map(|r| (self.desc.label_str(r.key()), r.value().load()))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        for (labels, v) in rows {
            let _ = writeln!(out, "{}{} {}", self.desc.name, braces(&labels, ""), fmt_value(v));
        }
    }
}

impl CounterHandle for CounterVec {
    fn add(&self, label_values: &[&str], value: f64) -> Result<()> {
        if value.is_nan() || value < 0.0 {
            return Err(ReqmonError::InvalidMetric(format!(
                "counter '{}' cannot decrease (got {value})",
                self.desc.name
            )));
        }
        let key = self.desc.key(label_values)?;
        with_series(&self.map, key, AtomicF64::default, |c| c.add(value));
        Ok(())
    }

    fn get(&self, label_values: &[&str]) -> Result<f64> {
        let key = self.desc.key(label_values)?;
        Ok(self.map.get(&key).map(|v| v.load()).unwrap_or(0.0))
    }
}

pub struct GaugeVec {
    desc: Desc,
    map: DashMap<Vec<String>, AtomicF64>,
}

impl GaugeVec {
    fn new(desc: Desc) -> Self {
        Self {
            desc,
            map: DashMap::new(),
        }
    }

    /// Render in Prometheus text exposition format.
    fn render(&self, out: &mut String) {
        self.desc.header("gauge", out);
        let mut rows: Vec<(String, f64)> = self
            .map
            .iter()
            .map(|r| (self.desc.label_str(r.key()), r.value().load()))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        for (labels, v) in rows {
            let _ = writeln!(out, "{}{} {}", self.desc.name, braces(&labels, ""), fmt_value(v));
        }
    }
}

impl GaugeHandle for GaugeVec {
    fn set(&self, label_values: &[&str], value: f64) -> Result<()> {
        let key = self.desc.key(label_values)?;
        with_series(&self.map, key, AtomicF64::default, |g| g.store(value));
        Ok(())
    }

    fn add(&self, label_values: &[&str], value: f64) -> Result<()> {
        let key = self.desc.key(label_values)?;
        with_series(&self.map, key, AtomicF64::default, |g| g.add(value));
        Ok(())
    }

    fn get(&self, label_values: &[&str]) -> Result<f64> {
        let key = self.desc.key(label_values)?;
        Ok(self.map.get(&key).map(|v| v.load()).unwrap_or(0.0))
    }
}

struct AtomicHistogram {
    count: AtomicU64,
    sum: AtomicF64,
    buckets: Box<[AtomicU64]>,
}

impl AtomicHistogram {
    fn new(bucket_count: usize) -> Self {
        Self {
            count: AtomicU64::new(0),
            sum: AtomicF64::default(),
            buckets: (0..bucket_count).map(|_| AtomicU64::new(0)).collect(),
        }
    }
}

pub struct HistogramVec {
    desc: Desc,
    bounds: Vec<f64>,
    map: DashMap<Vec<String>, AtomicHistogram>,
}

impl HistogramVec {
    fn new(desc: Desc, buckets: &[f64]) -> Result<Self> {
        // +Inf is always rendered; an explicit one is redundant.
        let bounds: Vec<f64> = buckets
            .iter()
            .copied()
            .filter(|b| *b != f64::INFINITY)
            .collect();
        if buckets.is_empty() {
            return Err(ReqmonError::MissingHistogramBuckets(desc.name));
        }
        if bounds.iter().any(|b| b.is_nan()) || bounds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ReqmonError::InvalidMetric(format!(
                "histogram '{}' buckets must be strictly increasing",
                desc.name
            )));
        }
        Ok(Self {
            desc,
            bounds,
            map: DashMap::new(),
        })
    }

    /// Render in Prometheus text exposition format.
    fn render(&self, out: &mut String) {
        self.desc.header("histogram", out);
        let mut rows: Vec<(String, Vec<u64>, u64, f64)> = self
            .map
            .iter()
            .map(|r| {
                let h = r.value();
                (
                    self.desc.label_str(r.key()),
                    h.buckets.iter().map(|b| b.load(Ordering::Relaxed)).collect(),
                    h.count.load(Ordering::Relaxed),
                    h.sum.load(),
                )
            })
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));

        let name = &self.desc.name;
        for (labels, counts, count, sum) in rows {
            for (le, c) in self.bounds.iter().zip(&counts) {
                let le = format!("le=\"{}\"", fmt_value(*le));
                let _ = writeln!(out, "{}_bucket{} {}", name, braces(&labels, &le), c);
            }
            let _ = writeln!(out, "{}_bucket{} {}", name, braces(&labels, "le=\"+Inf\""), count);
            let _ = writeln!(out, "{}_sum{} {}", name, braces(&labels, ""), fmt_value(sum));
            let _ = writeln!(out, "{}_count{} {}", name, braces(&labels, ""), count);
        }
    }
}

impl ObserverHandle for HistogramVec {
    fn observe(&self, label_values: &[&str], value: f64) -> Result<()> {
        let key = self.desc.key(label_values)?;
        let init = || AtomicHistogram::new(self.bounds.len());
        with_series(&self.map, key, init, |hist| {
            hist.count.fetch_add(1, Ordering::Relaxed);
            hist.sum.add(value);

            // Cumulative buckets: every bound at or above the value.
            for (i, &b) in self.bounds.iter().enumerate() {
                if value <= b {
                    hist.buckets[i].fetch_add(1, Ordering::Relaxed);
                }
            }
        });
        Ok(())
    }

    fn observations(&self, label_values: &[&str]) -> Result<Observations> {
        let key = self.desc.key(label_values)?;
        Ok(self
            .map
            .get(&key)
            .map(|h| Observations {
                count: h.count.load(Ordering::Relaxed),
                sum: h.sum.load(),
            })
            .unwrap_or_default())
    }
}

#[derive(Default)]
struct SummaryWindow {
    samples: VecDeque<f64>,
    count: u64,
    sum: f64,
}

impl SummaryWindow {
    fn push(&mut self, v: f64) {
        if self.samples.len() == SUMMARY_WINDOW {
            self.samples.pop_front();
        }
        self.samples.push_back(v);
        self.count += 1;
        self.sum += v;
    }

    /// Exact quantiles over the window, in the order of `qs`.
    fn quantiles(&self, qs: &[f64]) -> Vec<f64> {
        let mut sorted: Vec<f64> = self.samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        qs.iter()
            .map(|q| {
                if sorted.is_empty() {
                    return f64::NAN;
                }
                let rank = (q * sorted.len() as f64).ceil() as usize;
                sorted[rank.saturating_sub(1).min(sorted.len() - 1)]
            })
            .collect()
    }
}

pub struct SummaryVec {
    desc: Desc,
    objectives: Vec<(f64, f64)>,
    map: DashMap<Vec<String>, Mutex<SummaryWindow>>,
}

impl SummaryVec {
    fn new(desc: Desc, objectives: &[(f64, f64)]) -> Result<Self> {
        if objectives.is_empty() {
            return Err(ReqmonError::MissingSummaryObjectives(desc.name));
        }
        for &(q, e) in objectives {
            if !(0.0..=1.0).contains(&q) || !(0.0..=1.0).contains(&e) {
                return Err(ReqmonError::InvalidMetric(format!(
                    "summary '{}' has invalid objective ({q}, {e})",
                    desc.name
                )));
            }
        }
        let mut objectives = objectives.to_vec();
        objectives.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(Self {
            desc,
            objectives,
            map: DashMap::new(),
        })
    }

    /// Render in Prometheus text exposition format.
    fn render(&self, out: &mut String) {
        self.desc.header("summary", out);
        let qs: Vec<f64> = self.objectives.iter().map(|(q, _)| *q).collect();
        let mut rows: Vec<(String, Vec<f64>, u64, f64)> = self
            .map
            .iter()
            .filter_map(|r| {
                // A poisoned window is skipped rather than failing the scrape.
                let w = r.value().lock().ok()?;
                Some((self.desc.label_str(r.key()), w.quantiles(&qs), w.count, w.sum))
            })
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));

        let name = &self.desc.name;
        for (labels, values, count, sum) in rows {
            for (q, v) in qs.iter().zip(values) {
                let extra = format!("quantile=\"{}\"", fmt_value(*q));
                let _ = writeln!(out, "{}{} {}", name, braces(&labels, &extra), fmt_value(v));
            }
            let _ = writeln!(out, "{}_sum{} {}", name, braces(&labels, ""), fmt_value(sum));
            let _ = writeln!(out, "{}_count{} {}", name, braces(&labels, ""), count);
        }
    }
}

impl ObserverHandle for SummaryVec {
    fn observe(&self, label_values: &[&str], value: f64) -> Result<()> {
        let key = self.desc.key(label_values)?;
        with_series(&self.map, key, Mutex::default, |window| {
            let mut w = window.lock().map_err(|_| {
                ReqmonError::Internal(format!("summary '{}' lock poisoned", self.desc.name))
            })?;
            w.push(value);
            Ok(())
        })
    }

    fn observations(&self, label_values: &[&str]) -> Result<Observations> {
        let key = self.desc.key(label_values)?;
        let Some(window) = self.map.get(&key) else {
            return Ok(Observations::default());
        };
        let w = window
            .lock()
            .map_err(|_| ReqmonError::Internal(format!("summary '{}' lock poisoned", self.desc.name)))?;
        Ok(Observations {
            count: w.count,
            sum: w.sum,
        })
    }
}

enum Family {
    Counter(Arc<CounterVec>),
    Gauge(Arc<GaugeVec>),
    Histogram(Arc<HistogramVec>),
    Summary(Arc<SummaryVec>),
}

impl Family {
    fn render(&self, out: &mut String) {
        match self {
            Family::Counter(v) => v.render(out),
            Family::Gauge(v) => v.render(out),
            Family::Histogram(v) => v.render(out),
            Family::Summary(v) => v.render(out),
        }
    }
}

/// Default backend: everything lives in this process and is rendered as
/// Prometheus text. Each instance is independent, so tests can build as
/// many as they like.
#[derive(Default)]
pub struct LocalBackend {
    families: DashMap<String, Family>,
}

impl LocalBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered collectors.
    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    fn register(&self, name: &str, family: Family) -> Result<()> {
        match self.families.entry(name.to_string()) {
            Entry::Occupied(_) => Err(ReqmonError::DuplicateMetricName(name.to_string())),
            Entry::Vacant(v) => {
                v.insert(family);
                Ok(())
            }
        }
    }
}

impl MetricsBackend for LocalBackend {
    fn counter(&self, opts: &MetricOpts) -> Result<Arc<dyn CounterHandle>> {
        let v = Arc::new(CounterVec::new(Desc::from_opts(opts, None)?));
        self.register(&opts.name, Family::Counter(Arc::clone(&v)))?;
        Ok(v)
    }

    fn gauge(&self, opts: &MetricOpts) -> Result<Arc<dyn GaugeHandle>> {
        let v = Arc::new(GaugeVec::new(Desc::from_opts(opts, None)?));
        self.register(&opts.name, Family::Gauge(Arc::clone(&v)))?;
        Ok(v)
    }

    fn histogram(&self, opts: &MetricOpts) -> Result<Arc<dyn ObserverHandle>> {
        let desc = Desc::from_opts(opts, Some("le"))?;
        let v = Arc::new(HistogramVec::new(desc, &opts.buckets)?);
        self.register(&opts.name, Family::Histogram(Arc::clone(&v)))?;
        Ok(v)
    }

    fn summary(&self, opts: &MetricOpts) -> Result<Arc<dyn ObserverHandle>> {
        let desc = Desc::from_opts(opts, Some("quantile"))?;
        let v = Arc::new(SummaryVec::new(desc, &opts.objectives)?);
        self.register(&opts.name, Family::Summary(Arc::clone(&v)))?;
        Ok(v)
    }

    fn render(&self) -> String {
        let mut names: Vec<String> = self.families.iter().map(|r| r.key().clone()).collect();
        names.sort();

        let mut out = String::new();
        for name in names {
            if let Some(family) = self.families.get(&name) {
                family.render(&mut out);
            }
        }
        out
    }
}
