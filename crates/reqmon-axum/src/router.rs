//! Axum router wiring.
//!
//! `instrument` attaches a monitor to any router: the interceptor layer plus
//! the scrape endpoint. `build_router` is the demo application.

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{api, layers, middleware::monitor_middleware, monitor::Monitor, ops};

/// Add request instrumentation and `GET <metric_path>` to `router`.
pub fn instrument(router: Router, monitor: Arc<Monitor>) -> Router {
    let metric_path = monitor.metric_path().to_string();
    router
        .route(&metric_path, get(ops::metrics).with_state(Arc::clone(&monitor)))
        .layer(middleware::from_fn_with_state(monitor, monitor_middleware))
}

pub fn build_router(monitor: Arc<Monitor>) -> Router {
    let api = Router::new()
        .route("/ping", get(api::ping))
        .route("/echo", post(api::echo));

    let app = Router::new()
        .route("/healthz", get(ops::healthz))
        .nest(api::PRESET_PATH.trim_end_matches('/'), api);

    layers::enhance(instrument(app, monitor))
}
