//! Metrics collection and exposition.
//!
//! # Metrics
//! - `confman_operations_total` (counter): engine operations by `operation`, `outcome`
//! - `confman_backups` (gauge): backups currently on disk
//! - `confman_restarts_total` (counter): daemon restarts by `outcome`

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::daemon::EngineResult;

/// Install the Prometheus exporter with its own HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Count one engine operation, labelled by its outcome.
pub fn record_operation<T>(operation: &'static str, result: &EngineResult<T>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    };
    counter!("confman_operations_total", "operation" => operation, "outcome" => outcome).increment(1);
}

pub fn record_backup_count(count: usize) {
    gauge!("confman_backups").set(count as f64);
}

pub fn record_restart(outcome: &'static str) {
    counter!("confman_restarts_total", "outcome" => outcome).increment(1);
}
