//! Built-in endpoints served by the proxy itself:
//! - `/health` - Liveness with uptime and version
//! - `/metrics` - Prometheus metrics export
//!
//! Functions return `EndpointResponse` instead of writing directly to session,
//! so response generation stays testable without a live connection.

use std::time::Instant;

use crate::metrics::Metrics;

/// Response from a special endpoint handler.
#[derive(Debug, Clone)]
pub struct EndpointResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl EndpointResponse {
    pub fn json(status: u16, body: String) -> Self {
        Self {
            status,
            content_type: "application/json",
            body,
        }
    }

    pub fn prometheus(body: String) -> Self {
        Self {
            status: 200,
            content_type: "text/plain; version=0.0.4",
            body,
        }
    }
}

/// Special endpoint a request path maps to, if any
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialEndpoint {
    Health,
    Metrics,
}

impl SpecialEndpoint {
    pub fn from_request(method: &str, path: &str) -> Option<Self> {
        if !method.eq_ignore_ascii_case("GET") {
            return None;
        }
        match path {
            "/health" => Some(Self::Health),
            "/metrics" => Some(Self::Metrics),
            _ => None,
        }
    }
}

/// Generate response for /health endpoint.
pub fn handle_health(start_time: Instant) -> EndpointResponse {
    let body = serde_json::json!({
        "status": "healthy",
        "uptime_seconds": start_time.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION")
    })
    .to_string();

    EndpointResponse::json(200, body)
}

/// Generate response for /metrics endpoint.
pub fn handle_metrics(metrics: &Metrics) -> EndpointResponse {
    EndpointResponse::prometheus(metrics.export_prometheus())
}
