//! reqmon demo server
//!
//! - Config: `$REQMON_CONFIG` (default `reqmon.yaml`, defaults if absent)
//! - Request metrics on every route, scrape endpoint at `monitor.metric_path`
//! - Trace logging, panic recovery, permissive CORS

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{fmt, EnvFilter};

use reqmon_axum::{config, router, Monitor};

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::var("REQMON_CONFIG").unwrap_or_else(|_| "reqmon.yaml".to_string());
    let cfg = match config::load_or_default(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(%path, error = %e, "config load failed");
            std::process::exit(1);
        }
    };
    let listen: SocketAddr = cfg
        .server
        .listen
        .parse()
        .expect("server.listen already validated");

    // Registration errors are configuration errors: fail before serving.
    let monitor = match Monitor::with_builtin_metrics(cfg.monitor) {
        Ok(m) => Arc::new(m),
        Err(e) => {
            tracing::error!(code = e.code().as_str(), error = %e, "metric registration failed");
            std::process::exit(1);
        }
    };
    let metric_path = monitor.metric_path().to_string();
    let app = router::build_router(monitor);

    tracing::info!(%listen, %metric_path, "reqmon-demo starting");
    let listener = tokio::net::TcpListener::bind(listen).await.expect("failed to bind");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("server failed");
}
