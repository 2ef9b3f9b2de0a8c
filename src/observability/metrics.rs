//! Metrics collection and exposition.
//!
//! # Metrics
//! - `masq_reconcile_passes_total` (counter): passes by outcome
//! - `masq_map_operations_total` (counter): map calls by op and result
//! - `masq_desired_cidrs` (gauge): size of the last decoded desired set
//! - `masq_config_decode_errors_total` (counter): rejected config contents
//! - `masq_watch_triggers_total` (counter): watcher wake-ups by trigger
//!
//! Recording is a no-op until a recorder is installed, so library users and
//! tests pay nothing.

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::maps::MapOp;
use crate::reconcile::PassOutcome;

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_pass(outcome: PassOutcome) {
    ::metrics::counter!("masq_reconcile_passes_total", "outcome" => outcome.as_str()).increment(1);
}

pub fn record_map_op(op: MapOp, ok: bool) {
    let result = if ok { "ok" } else { "error" };
    ::metrics::counter!("masq_map_operations_total", "op" => op.as_str(), "result" => result)
        .increment(1);
}

pub fn record_desired(count: usize) {
    ::metrics::gauge!("masq_desired_cidrs").set(count as f64);
}

pub fn record_decode_error() {
    ::metrics::counter!("masq_config_decode_errors_total").increment(1);
}

pub fn record_trigger(trigger: &'static str) {
    ::metrics::counter!("masq_watch_triggers_total", "trigger" => trigger).increment(1);
}
