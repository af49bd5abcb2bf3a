//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): calls by transport, method, status
//! - `gateway_request_duration_seconds` (histogram): latency by transport, method
//! - `gateway_active_connections` (gauge): open connections by transport
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The Prometheus exporter is only installed by the binary

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::context::Transport;

pub const REQUESTS_TOTAL: &str = "gateway_requests_total";
pub const REQUEST_DURATION: &str = "gateway_request_duration_seconds";
pub const ACTIVE_CONNECTIONS: &str = "gateway_active_connections";

/// Install the Prometheus recorder and its scrape endpoint on `address`.
pub fn init_metrics(address: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(address).install()?;

    ::metrics::describe_counter!(REQUESTS_TOTAL, "Completed calls by transport, method and status");
    ::metrics::describe_histogram!(REQUEST_DURATION, "Call latency in seconds");
    ::metrics::describe_gauge!(ACTIVE_CONNECTIONS, "Open client connections");

    tracing::info!(address = %address, "Metrics endpoint listening");
    Ok(())
}

/// Record one finished call. `status` is the HTTP status or RPC code name.
pub fn record_request(transport: Transport, method: &str, status: &str, start: Instant) {
    ::metrics::counter!(
        REQUESTS_TOTAL,
        "transport" => transport.as_str(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    ::metrics::histogram!(
        REQUEST_DURATION,
        "transport" => transport.as_str(),
        "method" => method.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn connection_opened(transport: Transport) {
    ::metrics::gauge!(ACTIVE_CONNECTIONS, "transport" => transport.as_str()).increment(1.0);
}

pub fn connection_closed(transport: Transport) {
    ::metrics::gauge!(ACTIVE_CONNECTIONS, "transport" => transport.as_str()).decrement(1.0);
}
