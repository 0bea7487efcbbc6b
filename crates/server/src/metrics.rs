//! Observability Metrics
//!
//! Prometheus exposition for stream and request counters.

use std::sync::OnceLock;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::state::AppState;
use crate::ServerError;

/// Global Prometheus handle
static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder.
///
/// Call once at startup; later calls return the existing handle.
pub fn init_metrics() -> Result<PrometheusHandle, ServerError> {
    if let Some(handle) = METRICS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ServerError::Internal(format!("Failed to install Prometheus recorder: {}", e)))?;

    register_default_metrics();

    Ok(METRICS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the global metrics handle
pub fn get_metrics_handle() -> Option<&'static PrometheusHandle> {
    METRICS_HANDLE.get()
}

fn register_default_metrics() {
    for outcome in ["started", "completed", "cancelled", "failed"] {
        counter!("packet_tts_streams_total", "outcome" => outcome).absolute(0);
    }
    for endpoint in ["tts", "ws", "health", "metrics"] {
        counter!("packet_tts_requests_total", "endpoint" => endpoint).absolute(0);
    }
    for code in ["validation_error", "generation_error", "internal_error"] {
        counter!("packet_tts_errors_total", "code" => code).absolute(0);
    }
    counter!("packet_tts_frames_sent_total").absolute(0);
    counter!("packet_tts_packet_shortfall_total").absolute(0);
    gauge!("packet_tts_latency_history_size").set(0.0);
}

/// Record request to endpoint
pub fn record_request(endpoint: &'static str) {
    counter!("packet_tts_requests_total", "endpoint" => endpoint).increment(1);
}

/// Record a stream lifecycle event
pub fn record_stream(outcome: &'static str) {
    counter!("packet_tts_streams_total", "outcome" => outcome).increment(1);
}

pub fn record_frame_sent() {
    counter!("packet_tts_frames_sent_total").increment(1);
}

/// Record spans that produced no audio
pub fn record_shortfall(missing: usize) {
    if missing > 0 {
        counter!("packet_tts_packet_shortfall_total").increment(missing as u64);
    }
}

pub fn record_first_frame_latency(duration_secs: f64) {
    histogram!("packet_tts_first_frame_seconds").record(duration_secs);
}

pub fn record_total_latency(duration_secs: f64) {
    histogram!("packet_tts_total_latency_seconds").record(duration_secs);
}

/// Record error by code
pub fn record_error(code: &'static str) {
    counter!("packet_tts_errors_total", "code" => code).increment(1);
}

/// Metrics endpoint handler
///
/// Returns Prometheus-formatted metrics.
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    record_request("metrics");
    gauge!("packet_tts_latency_history_size").set(state.latency.len() as f64);

    match get_metrics_handle() {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            handle.render(),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain")],
            "Metrics not initialized".to_string(),
        ),
    }
}
