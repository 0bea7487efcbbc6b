//! WebSocket Handler
//!
//! One JSON control message in; `chunk_meta` + binary WAV frame pairs out,
//! finished by an `end` message, or by an `{error, code}` message when the
//! stream cannot complete.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{Sink, SinkExt, StreamExt};
use packet_tts_pipeline::{LatencyMetrics, StreamCoordinator};
use serde::Serialize;
use tokio::time::Instant;
use tracing::Instrument;

use crate::metrics;
use crate::request::TtsRequest;
use crate::state::AppState;
use crate::ServerError;

/// Sent immediately before each binary frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkMeta {
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Request receipt, ms since the Unix epoch (sub-ms precision)
    pub server_received_ts: f64,
    pub chunk_index: usize,
    /// Frame generation, ms since the Unix epoch (sub-ms precision)
    pub server_chunk_gen_ts: f64,
    pub is_first_chunk: bool,
}

impl ChunkMeta {
    fn new(server_received_ts: f64, chunk_index: usize, is_first_chunk: bool) -> Self {
        Self {
            kind: "chunk_meta",
            server_received_ts,
            chunk_index,
            server_chunk_gen_ts: epoch_ms(),
            is_first_chunk,
        }
    }
}

/// Wall-clock milliseconds since the Unix epoch, fractional
fn epoch_ms() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1000.0
}

/// Terminal message of a successful stream
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndMessage {
    pub event: &'static str,
    pub duration_ms: f64,
    pub chunks_sent: usize,
    pub model: String,
    pub device: String,
    pub inference_time_ms: f64,
    pub total_time_ms: f64,
    pub real_time_factor: f64,
    pub first_chunk_time_ms: Option<f64>,
}

/// How a stream ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed { chunks_sent: usize },
    /// Invalid control message, nothing synthesized
    Rejected,
    /// Generation error sent in place of the end message
    Failed { chunks_sent: usize },
    /// Client went away mid-stream
    Disconnected { chunks_sent: usize },
}

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    metrics::record_request("ws");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let raw = loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => break text,
            Some(Ok(Message::Close(_))) | None => {
                tracing::debug!("Client closed before sending a request");
                return;
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                tracing::debug!(error = %e, "WebSocket receive failed");
                return;
            }
        }
    };

    let outcome = stream_tts(&mut sender, &raw, &state).await;
    tracing::debug!(?outcome, "WebSocket stream finished");

    let _ = sender.close().await;
}

/// Serve one streaming request over any message sink
pub async fn stream_tts<S>(sender: &mut S, raw: &str, state: &AppState) -> StreamOutcome
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("stream_tts", %request_id);
    run_stream(sender, raw, state).instrument(span).await
}

async fn run_stream<S>(sender: &mut S, raw: &str, state: &AppState) -> StreamOutcome
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let received_at = Instant::now();
    let received_ts = epoch_ms();
    let streaming = &state.config.streaming;

    let request = match TtsRequest::from_json(raw).and_then(|r| r.validate(streaming)) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected stream request");
            send_error(sender, &e).await;
            return StreamOutcome::Rejected;
        }
    };

    let engine = match state.registry.get(request.model) {
        Ok(engine) => engine,
        Err(e) => {
            let err = ServerError::Generation(e.to_string());
            tracing::error!(model = %request.model, error = %err, "No engine for model");
            send_error(sender, &err).await;
            return StreamOutcome::Failed { chunks_sent: 0 };
        }
    };

    tracing::info!(
        text_length = request.text.chars().count(),
        lang = %request.language,
        model = %request.model,
        chunk_ms = request.chunk_ms,
        "Streaming request"
    );

    let coordinator = StreamCoordinator::new(Arc::clone(&engine), streaming.clone());
    let mut frames = coordinator.stream(&request.text, request.language, Some(request.chunk_ms));
    let stats = frames.stats();
    metrics::record_stream("started");

    let mut chunks_sent = 0usize;
    let mut failure: Option<ServerError> = None;
    let mut disconnected = false;

    while let Some(item) = frames.next().await {
        let frame = match item {
            Ok(frame) => frame,
            Err(e) => {
                failure = Some(ServerError::from(e));
                break;
            }
        };

        if streaming.chunk_metadata {
            let meta = ChunkMeta::new(received_ts, chunks_sent, frame.is_first_of_stream);
            if let Err(e) = send_json(sender, &meta).await {
                tracing::info!(error = %e, "Client disconnected");
                disconnected = true;
                break;
            }
        }

        if let Err(e) = sender.send(Message::Binary(frame.bytes)).await {
            tracing::info!(error = %e, "Client disconnected");
            disconnected = true;
            break;
        }

        if chunks_sent == 0 {
            tracing::info!(
                elapsed_ms = received_at.elapsed().as_secs_f64() * 1000.0,
                "First frame sent"
            );
        }
        chunks_sent += 1;
        metrics::record_frame_sent();
    }
    drop(frames);

    let snapshot = stats.snapshot();
    let mut latency = LatencyMetrics::from_stream(
        &snapshot,
        request.text.chars().count(),
        request.model.as_str(),
        engine.device(),
        request.language.code(),
    );
    latency.total_time_ms = received_at.elapsed().as_secs_f64() * 1000.0;
    state.latency.record(latency.clone());

    metrics::record_shortfall(snapshot.shortfall());
    metrics::record_total_latency(latency.total_time_ms / 1000.0);
    if let Some(ms) = snapshot.first_frame_ms {
        metrics::record_first_frame_latency(ms / 1000.0);
    }

    if disconnected {
        metrics::record_stream("cancelled");
        return StreamOutcome::Disconnected { chunks_sent };
    }

    if let Some(err) = failure {
        tracing::error!(chunks_sent, error = %err, "Stream failed");
        metrics::record_stream("failed");
        send_error(sender, &err).await;
        return StreamOutcome::Failed { chunks_sent };
    }

    let end = EndMessage {
        event: "end",
        duration_ms: latency.audio_duration_ms,
        chunks_sent,
        model: request.model.as_str().to_string(),
        device: engine.device().to_string(),
        inference_time_ms: latency.inference_time_ms,
        total_time_ms: latency.total_time_ms,
        real_time_factor: latency.real_time_factor(),
        first_chunk_time_ms: latency.first_frame_ms,
    };
    if let Err(e) = send_json(sender, &end).await {
        tracing::info!(error = %e, "Client disconnected before end message");
        metrics::record_stream("cancelled");
        return StreamOutcome::Disconnected { chunks_sent };
    }

    metrics::record_stream("completed");
    tracing::info!(
        chunks_sent,
        packets = snapshot.spans_yielded,
        missing = snapshot.shortfall(),
        total_ms = latency.total_time_ms,
        "Stream complete"
    );
    StreamOutcome::Completed { chunks_sent }
}

async fn send_json<S, T>(sender: &mut S, value: &T) -> Result<(), String>
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
    T: Serialize,
{
    let text = serde_json::to_string(value).map_err(|e| e.to_string())?;
    sender
        .send(Message::Text(text))
        .await
        .map_err(|e| e.to_string())
}

async fn send_error<S>(sender: &mut S, err: &ServerError)
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    metrics::record_error(err.error_code());
    if let Err(e) = send_json(sender, &err.to_json()).await {
        tracing::debug!(error = %e, "Could not deliver error message");
    }
}
