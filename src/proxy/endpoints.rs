//! Built-in endpoints served ahead of derivative routing:
//! - `/health` - liveness with uptime and version
//! - `/metrics` - Prometheus metrics export

use std::time::Instant;

use super::response::ProxyResponse;
use crate::metrics::Metrics;

pub const HEALTH_PATH: &str = "/health";
pub const METRICS_PATH: &str = "/metrics";

/// Generate response for /health endpoint.
pub fn handle_health(start_time: Instant) -> ProxyResponse {
    let body = serde_json::json!({
        "status": "healthy",
        "uptime_seconds": start_time.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
    })
    .to_string();

    ProxyResponse::json(200, body)
}

pub fn handle_metrics(metrics: &Metrics) -> ProxyResponse {
    ProxyResponse::prometheus(metrics.export_prometheus())
}

/// Response for a built-in endpoint path, if it is one
pub fn special_endpoint(
    path: &str,
    start_time: Instant,
    metrics: &Metrics,
) -> Option<ProxyResponse> {
    match path {
        HEALTH_PATH => Some(handle_health(start_time)),
        METRICS_PATH => Some(handle_metrics(metrics)),
        _ => None,
    }
}
