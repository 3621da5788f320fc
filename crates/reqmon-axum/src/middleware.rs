//! Axum adapter for the request interceptor.
//!
//! ```ignore
//! let monitor = Arc::new(Monitor::with_builtin_metrics(cfg)?);
//! let app = Router::new()
//!     .route("/", get(handler))
//!     .layer(axum::middleware::from_fn_with_state(monitor, monitor_middleware));
//! ```
//!
//! Serve the app with `into_make_service_with_connect_info::<SocketAddr>()`
//! so the peer address is available when no proxy header is present.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::HttpBody,
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::interceptor::RequestContext;
use crate::monitor::Monitor;

/// Middleware entry: wraps the rest of the stack with `Monitor::intercept`.
pub async fn monitor_middleware(
    State(monitor): State<Arc<Monitor>>,
    request: Request,
    next: Next,
) -> Response {
    let mut ctx = AxumContext::new(request, next);
    monitor.intercept(&mut ctx).await;
    ctx.into_response()
}

/// `RequestContext` over an axum request and the remaining middleware stack.
pub struct AxumContext {
    path: String,
    method: String,
    client_ip: String,
    request_length: i64,
    pending: Option<(Request, Next)>,
    response: Option<Response>,
}

impl AxumContext {
    pub fn new(request: Request, next: Next) -> Self {
        Self {
            path: request.uri().path().to_string(),
            method: request.method().to_string(),
            client_ip: client_ip(&request),
            request_length: request_length(&request),
            pending: Some((request, next)),
            response: None,
        }
    }

    /// The handler's response. A context whose handler never ran answers 500.
    pub fn into_response(self) -> Response {
        self.response
            .unwrap_or_else(|| StatusCode::INTERNAL_SERVER_ERROR.into_response())
    }
}

#[async_trait]
impl RequestContext for AxumContext {
    fn path(&self) -> &str {
        &self.path
    }

    fn method(&self) -> &str {
        &self.method
    }

    fn client_ip(&self) -> &str {
        &self.client_ip
    }

    fn request_length(&self) -> i64 {
        self.request_length
    }

    async fn next(&mut self) {
        if let Some((request, next)) = self.pending.take() {
            self.response = Some(next.run(request).await);
        }
    }

    fn status(&self) -> u16 {
        self.response
            .as_ref()
            .map(|r| r.status().as_u16())
            .unwrap_or(0)
    }

    fn response_size(&self) -> i64 {
        let Some(response) = self.response.as_ref() else {
            return -1;
        };
        response
            .body()
            .size_hint()
            .exact()
            .and_then(|n| i64::try_from(n).ok())
            .or_else(|| content_length(response.headers()))
            .unwrap_or(-1)
    }
}

/// Client address: first `X-Forwarded-For` hop, then `X-Real-IP`, then the
/// socket peer. Empty when none is available.
pub fn client_ip(request: &Request) -> String {
    let headers = request.headers();
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = real_ip {
        return ip.to_string();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default()
}

/// `Content-Length`, else the exact body size, else `-1`.
fn request_length(request: &Request) -> i64 {
    content_length(request.headers())
        .or_else(|| {
            request
                .body()
                .size_hint()
                .exact()
                .and_then(|n| i64::try_from(n).ok())
        })
        .unwrap_or(-1)
}

fn content_length(headers: &HeaderMap) -> Option<i64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok())
}
