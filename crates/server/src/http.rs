//! HTTP Endpoints
//!
//! REST API for packet streaming TTS.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderValue,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use packet_tts_core::ModelChoice;
use packet_tts_pipeline::{LatencyMetrics, StreamCoordinator};
use serde::Serialize;
use tokio::time::Instant;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::metrics::{self, metrics_handler};
use crate::request::TtsRequest;
use crate::state::AppState;
use crate::websocket::ws_handler;
use crate::ServerError;

/// Requests listed in `/api/metrics`
const RECENT_REQUESTS: usize = 10;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);

    Router::new()
        .route("/", get(root))
        // Synthesis
        .route("/api/tts", post(synthesize))
        .route("/api/ws/stream_tts", get(ws_handler))
        // Monitoring
        .route("/api/health", get(health_check))
        .route("/api/metrics", get(latency_metrics))
        .route("/metrics", get(metrics_handler))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// Service banner
async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "packet-tts",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "tts": "POST /api/tts",
            "stream": "GET /api/ws/stream_tts (WebSocket)",
            "health": "GET /api/health",
            "metrics": "GET /api/metrics",
            "prometheus": "GET /metrics",
        },
    }))
}

/// Non-streaming synthesis response
#[derive(Debug, Serialize)]
pub struct TtsResponse {
    pub audio_base64: String,
    pub sample_rate: u32,
    pub model: String,
    pub device: String,
    pub duration_ms: f64,
    pub text_length: usize,
    pub inference_time_ms: f64,
    pub total_time_ms: f64,
    pub real_time_factor: f64,
}

/// Synthesize the whole text and return one WAV file
async fn synthesize(
    State(state): State<AppState>,
    payload: Result<Json<TtsRequest>, JsonRejection>,
) -> Result<Json<TtsResponse>, ServerError> {
    metrics::record_request("tts");
    let started = Instant::now();

    let Json(request) =
        payload.map_err(|e| ServerError::Validation(format!("Invalid request: {}", e.body_text())))?;
    let request = request.validate(&state.config.streaming)?;
    let engine = state
        .registry
        .get(request.model)
        .map_err(|e| ServerError::Generation(e.to_string()))?;

    let coordinator = StreamCoordinator::new(Arc::clone(&engine), state.config.streaming.clone());
    let audio = coordinator
        .synthesize_all(&request.text, request.language)
        .await?;
    if audio.is_empty() {
        return Err(ServerError::Generation(
            "Synthesis produced no audio for any span".into(),
        ));
    }
    let wav = audio.to_wav()?;

    let latency = LatencyMetrics {
        total_time_ms: started.elapsed().as_secs_f64() * 1000.0,
        inference_time_ms: audio.synthesis_ms,
        first_frame_ms: None,
        text_length: request.text.chars().count(),
        audio_duration_ms: audio.duration_ms(),
        model: request.model.as_str().to_string(),
        device: engine.device().to_string(),
        language: request.language.code().to_string(),
        frames: 0,
        shortfall: audio.shortfall(),
    };
    state.latency.record(latency.clone());
    metrics::record_shortfall(latency.shortfall);
    metrics::record_total_latency(latency.total_time_ms / 1000.0);

    Ok(Json(TtsResponse {
        audio_base64: BASE64.encode(wav),
        sample_rate: audio.sample_rate,
        model: latency.model.clone(),
        device: latency.device.clone(),
        duration_ms: latency.audio_duration_ms,
        text_length: latency.text_length,
        inference_time_ms: latency.inference_time_ms,
        total_time_ms: latency.total_time_ms,
        real_time_factor: latency.real_time_factor(),
    }))
}

/// Health check
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    metrics::record_request("health");
    let models: Vec<&'static str> = state
        .registry
        .models()
        .into_iter()
        .map(|m| m.as_str())
        .collect();
    let status = if models.is_empty() { "degraded" } else { "healthy" };

    Json(serde_json::json!({
        "status": status,
        "version": env!("CARGO_PKG_VERSION"),
        "device": state.device(),
        "models": models,
    }))
}

/// Latency summary from the rolling history
async fn latency_metrics(State(state): State<AppState>) -> impl IntoResponse {
    let by_model: serde_json::Map<String, serde_json::Value> = ModelChoice::ALL
        .iter()
        .filter_map(|model| {
            state.latency.model_stats(model.as_str()).map(|stats| {
                (
                    model.as_str().to_string(),
                    serde_json::to_value(stats).unwrap_or_default(),
                )
            })
        })
        .collect();

    let recent: Vec<serde_json::Value> = state
        .latency
        .recent(RECENT_REQUESTS)
        .iter()
        .map(|m| {
            serde_json::json!({
                "model": m.model,
                "language": m.language,
                "text_length": m.text_length,
                "total_time_ms": m.total_time_ms,
                "inference_time_ms": m.inference_time_ms,
                "first_frame_ms": m.first_frame_ms,
                "audio_duration_ms": m.audio_duration_ms,
                "real_time_factor": m.real_time_factor(),
                "throughput_chars_per_sec": m.throughput_chars_per_sec(),
                "shortfall": m.shortfall,
            })
        })
        .collect();

    Json(serde_json::json!({
        "overall": state.latency.stats(),
        "by_model": by_model,
        "recent_requests": recent,
    }))
}
