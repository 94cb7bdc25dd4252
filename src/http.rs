//! HTTP server for the Prometheus metrics endpoint.

use axum::{Router, routing::get};
use std::net::{IpAddr, SocketAddr};

/// Handler for GET /metrics.
async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

/// Serve `/metrics` on `bind:port` until the process exits.
pub async fn run_http_server(bind: IpAddr, port: u16) {
    let app = Router::new().route("/metrics", get(metrics_handler));

    let addr = SocketAddr::new(bind, port);
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind metrics server");
            return;
        }
    };
    tracing::info!(%addr, "Metrics server listening");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "Metrics server error");
    }
}
