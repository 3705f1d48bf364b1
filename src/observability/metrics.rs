//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by app, method, status
//! - `gateway_request_duration_seconds` (histogram): latency by app
//! - `gateway_errors_total` (counter): 5xx errors seen by the error hook
//! - `gateway_mail_send_duration_seconds` (histogram): provider call latency
//!
//! Recording is a no-op until an exporter is installed.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter listening on `addr`. Must run inside
/// the Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(app: &'static str, method: &str, status: u16, start: Instant) {
    counter!(
        "gateway_requests_total",
        "app" => app,
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "app" => app)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_error(app: &'static str, status: u16) {
    counter!("gateway_errors_total", "app" => app, "status" => status.to_string()).increment(1);
}

pub fn record_mail_send(provider: &'static str, start: Instant) {
    histogram!("gateway_mail_send_duration_seconds", "provider" => provider)
        .record(start.elapsed().as_secs_f64());
}
