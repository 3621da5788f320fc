//! Cross-cutting layers for the served router.
//!
//! Applied outermost first:
//! 1. TraceLayer (request/response logging through `tracing`)
//! 2. CatchPanicLayer (a panicking handler answers 500, the server keeps going)
//! 3. CorsLayer (any origin, no credentials)

use std::time::Duration;

use axum::http::{header, Method};
use axum::Router;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

const CORS_MAX_AGE: Duration = Duration::from_secs(12 * 60 * 60);

pub fn enhance(router: Router) -> Router {
    router
        .layer(cors_layer())
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::HEAD,
        ])
        .allow_headers([header::ORIGIN, header::CONTENT_LENGTH, header::CONTENT_TYPE])
        .max_age(CORS_MAX_AGE)
}
