//! End-to-end checks through the axum router.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    routing::get,
    Router,
};
use tower::ServiceExt;

use reqmon_axum::config::MonitorConfig;
use reqmon_axum::monitor::{METRIC_REQUEST_TOTAL, METRIC_REQUEST_UV, METRIC_URI_REQUEST_TOTAL};
use reqmon_axum::{layers, router, Monitor};

fn monitor(cfg: MonitorConfig) -> Arc<Monitor> {
    Arc::new(Monitor::with_builtin_metrics(cfg).unwrap())
}

async fn body_string(resp: axum::response::Response) -> String {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn ping_is_recorded_with_forwarded_client() {
    let m = monitor(MonitorConfig::default());
    let app = router::build_router(Arc::clone(&m));

    for ip in ["203.0.113.7", "203.0.113.7", "198.51.100.2"] {
        let req = Request::builder()
            .uri("/preset/api/v1.10/ping")
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_string(resp).await;
        assert!(body.contains("\"code\":0"), "{body}");
    }

    assert_eq!(m.get_metric(METRIC_REQUEST_TOTAL).value(&[]).unwrap(), 3.0);
    assert_eq!(m.get_metric(METRIC_REQUEST_UV).value(&[]).unwrap(), 2.0);
    assert_eq!(
        m.get_metric(METRIC_URI_REQUEST_TOTAL)
            .value(&["/preset/api/v1.10/ping", "GET", "200"])
            .unwrap(),
        3.0
    );
    assert!(m.get_metric("gin_response_body_total").value(&[]).unwrap() > 0.0);
}

#[tokio::test]
async fn echo_counts_request_body() {
    let m = monitor(MonitorConfig::default());
    let app = router::build_router(Arc::clone(&m));

    let payload = r#"{"hello":"world"}"#;
    let req = Request::builder()
        .method("POST")
        .uri("/preset/api/v1.10/echo")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, payload.len())
        .body(Body::from(payload))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_string(resp).await.contains("\"hello\":\"world\""));

    assert_eq!(
        m.get_metric("gin_request_body_total").value(&[]).unwrap(),
        payload.len() as f64
    );
}

#[tokio::test]
async fn scrape_endpoint_serves_text_and_is_not_counted() {
    let m = monitor(MonitorConfig::default());
    let app = router::build_router(Arc::clone(&m));

    let req = Request::builder().uri("/healthz").body(Body::empty()).unwrap();
    app.clone().oneshot(req).await.unwrap();

    let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let content_type = resp.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"));

    let text = body_string(resp).await;
    assert!(text.contains("# TYPE gin_request_total counter\n"));
    assert!(text.contains("gin_request_total 1\n"));
    assert!(text.contains("gin_uri_request_total{uri=\"/healthz\",method=\"GET\",code=\"200\"} 1\n"));
    assert_eq!(m.get_metric(METRIC_REQUEST_TOTAL).value(&[]).unwrap(), 1.0);
}

#[tokio::test]
async fn instrument_wraps_a_custom_router() {
    let m = monitor(MonitorConfig {
        metric_path: "/prom".into(),
        ..MonitorConfig::default()
    });
    let app = router::instrument(
        Router::new().route("/hello", get(|| async { "hi" })),
        Arc::clone(&m),
    );

    let req = Request::builder().uri("/hello").body(Body::empty()).unwrap();
    assert_eq!(app.clone().oneshot(req).await.unwrap().status(), StatusCode::OK);

    let req = Request::builder().uri("/prom").body(Body::empty()).unwrap();
    let text = body_string(app.oneshot(req).await.unwrap()).await;
    assert!(text.contains("gin_uri_request_total{uri=\"/hello\",method=\"GET\",code=\"200\"} 1\n"));
    // no peer address and no proxy headers
    assert_eq!(m.get_metric(METRIC_REQUEST_UV).value(&[]).unwrap(), 1.0);
    assert!(!m.visitors().contains(""));
}

async fn boom() -> &'static str {
    panic!("boom")
}

#[tokio::test]
async fn panicking_handler_answers_500() {
    let m = monitor(MonitorConfig::default());
    let app = layers::enhance(router::instrument(
        Router::new().route("/boom", get(boom)),
        m,
    ));

    let req = Request::builder().uri("/boom").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn cors_preflight_allows_any_origin() {
    let app = router::build_router(monitor(MonitorConfig::default()));

    let req = Request::builder()
        .method("OPTIONS")
        .uri("/preset/api/v1.10/echo")
        .header(header::ORIGIN, "https://example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();

    let headers = resp.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "43200");
}
