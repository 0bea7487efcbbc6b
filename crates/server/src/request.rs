//! Client request parsing and validation

use packet_tts_config::streaming::CLIENT_CHUNK_MS_RANGE;
use packet_tts_config::StreamingConfig;
use packet_tts_core::{Language, ModelChoice};
use serde::Deserialize;

use crate::ServerError;

/// Synthesis request, as sent by REST and WebSocket clients
#[derive(Debug, Clone, Deserialize)]
pub struct TtsRequest {
    pub text: String,
    pub lang: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Fractional values are truncated
    #[serde(default)]
    pub chunk_ms: Option<f64>,
}

/// Request after validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub text: String,
    pub language: Language,
    pub model: ModelChoice,
    pub chunk_ms: u32,
}

impl TtsRequest {
    /// Parse a raw JSON control message
    pub fn from_json(raw: &str) -> Result<Self, ServerError> {
        serde_json::from_str(raw)
            .map_err(|e| ServerError::Validation(format!("Invalid request: {}", e)))
    }

    /// Check every field; nothing is synthesized for an invalid request
    pub fn validate(self, config: &StreamingConfig) -> Result<ValidatedRequest, ServerError> {
        if self.text.trim().is_empty() {
            return Err(ServerError::Validation("text must not be empty".into()));
        }

        let language: Language = self.lang.parse()?;
        let model = match self.model.as_deref() {
            Some(model) => model.parse()?,
            None => ModelChoice::default(),
        };

        let chunk_ms = match self.chunk_ms {
            Some(ms) if !ms.is_finite() => {
                return Err(ServerError::Validation("chunk_ms must be a number".into()));
            }
            Some(ms) => ms.trunc() as i64,
            None => config.default_chunk_ms as i64,
        };
        let (min, max) = (
            *CLIENT_CHUNK_MS_RANGE.start() as i64,
            *CLIENT_CHUNK_MS_RANGE.end() as i64,
        );
        if !(min..=max).contains(&chunk_ms) {
            return Err(ServerError::Validation(format!(
                "chunk_ms must be between {} and {}, got {}",
                min, max, chunk_ms
            )));
        }

        Ok(ValidatedRequest {
            text: self.text,
            language,
            model,
            chunk_ms: chunk_ms as u32,
        })
    }
}
