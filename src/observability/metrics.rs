//! Metrics collection and exposition.
//!
//! # Metrics
//! - `supervisor_restarts_total` (counter): restart sequences by outcome
//! - `supervisor_debounce_rejected_total` (counter): change events dropped by the debouncer
//! - `supervisor_shutdown_timeouts_total` (counter): stops that missed their deadline
//! - `supervisor_server_up` (gauge): 1 while a server instance is bound
//! - `http_requests_total` (counter): served requests by path, status
//!
//! Recording is a no-op until a recorder is installed, so the lifecycle code
//! and tests call these freely.

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and serve it on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    describe();
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

fn describe() {
    metrics::describe_counter!("supervisor_restarts_total", "Restart sequences by outcome");
    metrics::describe_counter!(
        "supervisor_debounce_rejected_total",
        "Configuration change events suppressed by the debouncer"
    );
    metrics::describe_counter!(
        "supervisor_shutdown_timeouts_total",
        "Server stops that exceeded their drain deadline"
    );
    metrics::describe_gauge!("supervisor_server_up", "1 while a server instance is bound");
    metrics::describe_counter!("http_requests_total", "Requests served by path and status");
}

pub fn record_restart(outcome: &'static str) {
    metrics::counter!("supervisor_restarts_total", "outcome" => outcome).increment(1);
}

pub fn record_debounce_rejected() {
    metrics::counter!("supervisor_debounce_rejected_total").increment(1);
}

pub fn record_shutdown_timeout() {
    metrics::counter!("supervisor_shutdown_timeouts_total").increment(1);
}

pub fn set_server_up(up: bool) {
    metrics::gauge!("supervisor_server_up").set(if up { 1.0 } else { 0.0 });
}

pub fn record_request(path: &str, status: u16) {
    metrics::counter!(
        "http_requests_total",
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}
