//! Prometheus metrics
//!
//! The recorder is installed once per process; `/metrics` renders whatever
//! it has collected.

use std::time::Duration;

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

use cold_call_core::CallState;

use crate::state::AppState;

static PROMETHEUS: OnceCell<Option<PrometheusHandle>> = OnceCell::new();

/// Install the Prometheus recorder. Safe to call more than once.
pub fn init_metrics() -> Option<PrometheusHandle> {
    PROMETHEUS
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!("Failed to install Prometheus recorder: {}", e);
                None
            }
        })
        .clone()
}

/// Prometheus text exposition
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    set_active_sessions(state.calls.active_sessions());

    match PROMETHEUS.get().and_then(|h| h.as_ref()) {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Metrics are disabled".to_string(),
        ),
    }
}

pub fn record_request(path: &str, method: &str, status: u16, latency: Duration) {
    let labels = [
        ("path", path.to_string()),
        ("method", method.to_string()),
        ("status", status.to_string()),
    ];
    metrics::counter!("cold_call_requests_total", &labels).increment(1);
    metrics::histogram!("cold_call_request_latency_ms", &labels[..2])
        .record(latency.as_secs_f64() * 1000.0);
}

/// One processed prospect turn, labelled with the state it landed in
pub fn record_turn(state: CallState, latency: Duration) {
    metrics::counter!("cold_call_turns_total", "state" => state.as_str()).increment(1);
    metrics::histogram!("cold_call_turn_latency_ms").record(latency.as_secs_f64() * 1000.0);
}

pub fn record_call_started() {
    metrics::counter!("cold_call_calls_started_total").increment(1);
}

pub fn record_call_ended() {
    metrics::counter!("cold_call_calls_ended_total").increment(1);
}

pub fn record_error(code: &'static str) {
    metrics::counter!("cold_call_errors_total", "code" => code).increment(1);
}

pub fn set_active_sessions(count: usize) {
    metrics::gauge!("cold_call_active_sessions").set(count as f64);
}
