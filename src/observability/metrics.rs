//! Metrics collection and exposition.
//!
//! # Metrics
//! - `registry_heartbeats_total` (counter): accepted heartbeat reports
//! - `registry_malformed_reports_total` (counter): dropped payloads
//! - `registry_transitions_total` (counter): state/readiness changes by from, to
//! - `registry_purged_total` (counter): entries removed by the sweep
//! - `registry_services` (gauge): tracked entries after each sweep

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus exporter with an HTTP listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_heartbeat() {
    counter!("registry_heartbeats_total").increment(1);
}

pub fn record_malformed_report() {
    counter!("registry_malformed_reports_total").increment(1);
}

pub fn record_transition(from: &'static str, to: &'static str) {
    counter!("registry_transitions_total", "from" => from, "to" => to).increment(1);
}

pub fn record_purge() {
    counter!("registry_purged_total").increment(1);
}

pub fn record_registry_size(size: usize) {
    gauge!("registry_services").set(size as f64);
}
