//! Integration tests for the REST surface
//!
//! Requests go through the full router (CORS, tracing, JSON extraction)
//! without binding a socket.

use std::io::Cursor;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use packet_tts_config::Settings;
use packet_tts_server::{create_router, AppState};
use serde_json::Value;
use tower::ServiceExt;

fn app() -> (Router, AppState) {
    let state = AppState::new(Settings::default());
    (create_router(state.clone()), state)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn post_tts(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/tts")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Full synthesis returns a decodable WAV and records latency
#[tokio::test]
async fn test_tts_returns_wav() {
    let (app, state) = app();
    let (status, body) = send(
        app,
        post_tts(r#"{"text": "હું ઘરે ગયો અને પછી મેં ખાધું અને સૂઈ ગયો", "lang": "gu"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sample_rate"], 16000);
    assert_eq!(body["model"], "mms");
    assert_eq!(body["text_length"], "હું ઘરે ગયો અને પછી મેં ખાધું અને સૂઈ ગયો".chars().count());
    assert!(body["duration_ms"].as_f64().unwrap() > 0.0);

    let wav = BASE64.decode(body["audio_base64"].as_str().unwrap()).unwrap();
    let header = wav_header(&wav);
    assert_eq!(header.0, 16000);
    assert!(header.1 > 0);

    assert_eq!(state.latency.len(), 1);
}

/// Returns (sample rate, sample count) parsed from the RIFF header
fn wav_header(wav: &[u8]) -> (u32, usize) {
    let mut cursor = Cursor::new(wav);
    let mut header = [0u8; 44];
    std::io::Read::read_exact(&mut cursor, &mut header).unwrap();
    assert_eq!(&header[0..4], b"RIFF");
    assert_eq!(&header[8..12], b"WAVE");
    let sample_rate = u32::from_le_bytes([header[24], header[25], header[26], header[27]]);
    let data_len = u32::from_le_bytes([header[40], header[41], header[42], header[43]]);
    (sample_rate, data_len as usize / 2)
}

/// Invalid language is a 400 validation error
#[tokio::test]
async fn test_tts_rejects_bad_language() {
    let (app, state) = app();
    let (status, body) = send(app, post_tts(r#"{"text": "hello", "lang": "en"}"#)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
    assert!(body["error"].as_str().unwrap().contains("en"));
    assert!(state.latency.is_empty());
}

/// Malformed JSON is a validation error too
#[tokio::test]
async fn test_tts_rejects_malformed_json() {
    let (app, _) = app();
    let (status, body) = send(app, post_tts(r#"{"text": "#)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
}

/// Empty text never reaches the engine
#[tokio::test]
async fn test_tts_rejects_empty_text() {
    let (app, _) = app();
    let (status, body) = send(app, post_tts(r#"{"text": "  ", "lang": "mr"}"#)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
}

/// Health lists the registered models
#[tokio::test]
async fn test_health() {
    let (app, _) = app();
    let (status, body) = send(app, get("/api/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["models"], serde_json::json!(["indic", "mms"]));
    assert_eq!(body["device"], "cpu");
}

/// Latency summary reflects recorded requests
#[tokio::test]
async fn test_latency_metrics() {
    let (app, _) = app();
    let (status, _) = send(
        app.clone(),
        post_tts(r#"{"text": "नमस्कार मित्रांनो", "lang": "mr", "model": "indic"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(app, get("/api/metrics")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["overall"]["total_requests"], 1);
    assert_eq!(body["by_model"]["indic"]["count"], 1);
    assert!(body["by_model"].get("mms").is_none());
    assert_eq!(body["recent_requests"].as_array().unwrap().len(), 1);
    assert_eq!(body["recent_requests"][0]["language"], "mr");
}

/// Banner lists the endpoints
#[tokio::test]
async fn test_root_banner() {
    let (app, _) = app();
    let (status, body) = send(app, get("/")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "packet-tts");
    assert!(body["endpoints"]["stream"].is_string());
}
