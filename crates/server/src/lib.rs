//! Packet TTS Server
//!
//! REST and WebSocket endpoints over the packet streaming pipeline.

pub mod http;
pub mod metrics;
pub mod request;
pub mod state;
pub mod websocket;

pub use http::create_router;
pub use self::metrics::init_metrics;
pub use request::{TtsRequest, ValidatedRequest};
pub use state::AppState;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use packet_tts_pipeline::PipelineError;
use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    /// Bad client input, rejected before any synthesis
    #[error("{0}")]
    Validation(String),

    /// Synthesis failed or produced nothing
    #[error("{0}")]
    Generation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Error code reported to clients
    pub fn error_code(&self) -> &'static str {
        match self {
            ServerError::Validation(_) => "validation_error",
            ServerError::Generation(_) => "generation_error",
            ServerError::Internal(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Validation(_) => StatusCode::BAD_REQUEST,
            ServerError::Generation(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// `{error, code}` body shared by REST and WebSocket
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": self.to_string(),
            "code": self.error_code(),
        })
    }
}

impl From<packet_tts_core::Error> for ServerError {
    fn from(err: packet_tts_core::Error) -> Self {
        match err {
            packet_tts_core::Error::Validation(msg) => ServerError::Validation(msg),
            packet_tts_core::Error::Synthesis(e) => ServerError::Generation(e.to_string()),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl From<PipelineError> for ServerError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Synthesis(e) => ServerError::Generation(e.to_string()),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl From<ServerError> for StatusCode {
    fn from(err: ServerError) -> Self {
        err.status_code()
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        tracing::warn!(code = self.error_code(), error = %self, "Request failed");
        self::metrics::record_error(self.error_code());
        (self.status_code(), Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use packet_tts_core::SynthesisError;

    #[test]
    fn test_error_codes() {
        let err = ServerError::Validation("text must not be empty".into());
        assert_eq!(err.error_code(), "validation_error");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_json()["error"], "text must not be empty");

        let err = ServerError::from(PipelineError::Synthesis(SynthesisError::Unavailable(
            "offline".into(),
        )));
        assert_eq!(err.error_code(), "generation_error");
        assert_eq!(StatusCode::from(err), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_core_validation_maps_to_validation() {
        let err = ServerError::from(packet_tts_core::Error::validation("bad lang"));
        assert!(matches!(err, ServerError::Validation(_)));
    }
}
