//! Operational HTTP endpoints.
//!
//! - `/healthz`      : liveness
//! - `<metric_path>` : Prometheus text format (default `/metrics`)

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::monitor::Monitor;

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn metrics(State(monitor): State<Arc<Monitor>>) -> Response {
    let body = monitor.render();

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
        .into_response()
}
