//! Registry, metric, and bloom filter contract tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;

use reqmon_core::bloom::BloomFilter;
use reqmon_core::metrics::{LocalBackend, MetricKind, MetricOpts, MetricRegistry};

fn registry() -> (Arc<LocalBackend>, MetricRegistry) {
    let backend = Arc::new(LocalBackend::new());
    let reg = MetricRegistry::new(backend.clone());
    (backend, reg)
}

#[test]
fn every_operation_on_unknown_metric_fails_not_registered() {
    let (_, reg) = registry();
    let m = reg.get_metric("does_not_exist");
    assert_eq!(m.kind(), MetricKind::None);

    let results = [
        m.inc(&[]),
        m.add(&[], 1.0),
        m.observe(&[], 1.0),
        m.set_gauge_value(&[], 1.0),
    ];
    for r in results {
        let e = r.expect_err("must fail");
        assert_eq!(e.code().as_str(), "METRIC_NOT_REGISTERED");
    }
}

#[test]
fn observe_on_counter_leaves_value_unchanged() {
    let (_, mut reg) = registry();
    reg.add_metric(MetricOpts::counter("gin_request_total", "all requests"))
        .unwrap();
    let m = reg.get_metric("gin_request_total");
    m.add(&[], 3.0).unwrap();

    let e = m.observe(&[], 10.0).expect_err("counter cannot observe");
    assert_eq!(e.code().as_str(), "METRIC_KIND_MISMATCH");
    assert_eq!(m.value(&[]).unwrap(), 3.0);
}

#[test]
fn failed_registration_is_atomic() {
    let (backend, mut reg) = registry();
    reg.add_metric(MetricOpts::counter("a_total", "a")).unwrap();

    assert!(reg.add_metric(MetricOpts::counter("a_total", "a")).is_err());
    assert!(reg
        .add_metric(MetricOpts::histogram("h", "h", &[]))
        .is_err());
    assert!(reg
        .add_metric(MetricOpts::summary("s", "s", &[]))
        .is_err());

    assert_eq!(reg.len(), 1);
    assert_eq!(backend.len(), 1);
    assert_eq!(reg.get_metric("h").kind(), MetricKind::None);
    assert_eq!(reg.get_metric("s").kind(), MetricKind::None);
}

#[test]
fn registered_metrics_show_up_in_exposition() {
    let (_, mut reg) = registry();
    reg.add_metric(
        MetricOpts::counter("gin_uri_request_total", "per uri").labels(&["uri", "method", "code"]),
    )
    .unwrap();
    reg.add_metric(MetricOpts::gauge("workers", "busy workers"))
        .unwrap();

    reg.get_metric("gin_uri_request_total")
        .inc(&["/foo", "GET", "200"])
        .unwrap();
    reg.get_metric("workers").set_gauge_value(&[], 4.0).unwrap();

    let text = reg.render();
    assert!(text.contains("gin_uri_request_total{uri=\"/foo\",method=\"GET\",code=\"200\"} 1"));
    assert!(text.contains("workers 4"));
}

#[test]
fn bloom_filter_has_no_false_negatives() {
    let bf = BloomFilter::new();
    let values: Vec<String> = (0..5000).map(|i| format!("visitor-{i}")).collect();
    for v in &values {
        bf.add(v);
    }
    for v in &values {
        assert!(bf.contains(v), "false negative for {v}");
    }
    assert!(!bf.contains(""));
}

#[test]
fn bloom_filter_shared_across_threads() {
    let bf = Arc::new(BloomFilter::new());
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let bf = Arc::clone(&bf);
            std::thread::spawn(move || {
                for i in 0..250 {
                    let ip = format!("172.16.{t}.{i}");
                    if !bf.contains(&ip) {
                        bf.add(&ip);
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    for t in 0..4 {
        for i in 0..250 {
            assert!(bf.contains(&format!("172.16.{t}.{i}")));
        }
    }
}
