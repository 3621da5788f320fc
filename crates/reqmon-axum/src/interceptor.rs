//! Per-request interception.
//!
//! `Monitor::intercept` drives one request through
//! `START -> BYPASS` or `START -> TIMING -> DELEGATED -> DERIVING -> DONE`.
//! The downstream handler runs inside `RequestContext::next`, the only await
//! point. DERIVING runs from a drop guard, so a cancelled request still
//! reaches it. Metric updates in the deriving phase are independent of each
//! other: a failing update is logged and skipped, and never reaches the
//! response.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use reqmon_core::error::ReqmonError;

use crate::monitor::{
    Monitor, METRIC_REQUEST_BODY, METRIC_REQUEST_DURATION, METRIC_REQUEST_TOTAL,
    METRIC_REQUEST_UV, METRIC_RESPONSE_BODY, METRIC_SLOW_REQUEST, METRIC_URI_REQUEST_TOTAL,
};

/// What the interceptor needs from the HTTP framework for one request.
#[async_trait]
pub trait RequestContext: Send {
    /// Raw request path (not the route template).
    fn path(&self) -> &str;
    fn method(&self) -> &str;
    /// Client address; empty when unknown.
    fn client_ip(&self) -> &str;
    /// Request body length in bytes, `-1` when unknown.
    fn request_length(&self) -> i64;

    /// Run the downstream handler to completion.
    async fn next(&mut self);

    /// Response status; meaningful after `next`.
    fn status(&self) -> u16;
    /// Response body size in bytes, `-1` when unknown; meaningful after `next`.
    fn response_size(&self) -> i64;
}

/// Everything the deriving phase reads about a finished request.
#[derive(Debug, Clone, Copy)]
pub struct RequestSummary<'a> {
    pub client_ip: &'a str,
    pub path: &'a str,
    pub method: &'a str,
    pub status: u16,
    pub request_length: i64,
    pub response_size: i64,
    pub latency: Duration,
}

impl Monitor {
    /// Run the downstream handler and record the request metrics.
    ///
    /// Requests to the metric path are forwarded untouched. If this future is
    /// dropped while the handler runs (client gone, outer timeout), the
    /// metrics are still recorded with whatever status and size the context
    /// reports at that point.
    pub async fn intercept<C>(&self, ctx: &mut C)
    where
        C: RequestContext + ?Sized,
    {
        if ctx.path() == self.metric_path() {
            ctx.next().await;
            return;
        }

        let mut flight = InFlight {
            monitor: self,
            ctx,
            start: Instant::now(),
            completed: false,
        };
        flight.ctx.next().await;
        flight.completed = true;
    }

    /// Derive the built-in metrics from a finished request.
    pub fn record(&self, req: &RequestSummary<'_>) {
        let code = req.status.to_string();
        let route = [req.path, req.method, code.as_str()];

        report(
            METRIC_REQUEST_TOTAL,
            self.get_metric(METRIC_REQUEST_TOTAL).inc(&[]),
        );

        // contains + add is not atomic: two first requests from one address
        // can both count. UV is an approximation either way.
        if !self.visitors().contains(req.client_ip) {
            self.visitors().add(req.client_ip);
            report(METRIC_REQUEST_UV, self.get_metric(METRIC_REQUEST_UV).inc(&[]));
        }

        report(
            METRIC_URI_REQUEST_TOTAL,
            self.get_metric(METRIC_URI_REQUEST_TOTAL).inc(&route),
        );

        report(
            METRIC_REQUEST_BODY,
            self.get_metric(METRIC_REQUEST_BODY)
                .add(&[], req.request_length as f64),
        );

        if req.latency.as_secs() > u64::from(self.slow_time_secs()) {
            report(
                METRIC_SLOW_REQUEST,
                self.get_metric(METRIC_SLOW_REQUEST).inc(&route),
            );
        }

        report(
            METRIC_REQUEST_DURATION,
            self.get_metric(METRIC_REQUEST_DURATION)
                .observe(&[req.path], req.latency.as_secs_f64()),
        );

        if req.response_size > 0 {
            report(
                METRIC_RESPONSE_BODY,
                self.get_metric(METRIC_RESPONSE_BODY)
                    .add(&[], req.response_size as f64),
            );
        }
    }
}

/// Records the request when dropped, whether or not the handler finished.
struct InFlight<'a, C: RequestContext + ?Sized> {
    monitor: &'a Monitor,
    ctx: &'a mut C,
    start: Instant,
    completed: bool,
}

impl<C: RequestContext + ?Sized> Drop for InFlight<'_, C> {
    fn drop(&mut self) {
        // A panicking handler records nothing; recovery happens further out.
        if std::thread::panicking() {
            return;
        }
        let ctx = &*self.ctx;
        if !self.completed {
            tracing::debug!(path = ctx.path(), method = ctx.method(), "request dropped before the handler finished");
        }
        self.monitor.record(&RequestSummary {
            client_ip: ctx.client_ip(),
            path: ctx.path(),
            method: ctx.method(),
            status: ctx.status(),
            request_length: ctx.request_length(),
            response_size: ctx.response_size(),
            latency: self.start.elapsed(),
        });
    }
}

fn report(metric: &'static str, res: Result<(), ReqmonError>) {
    if let Err(e) = res {
        tracing::debug!(metric, code = e.code().as_str(), error = %e, "request metric skipped");
    }
}
