//! Application State
//!
//! Shared state across all handlers.

use std::sync::Arc;

use packet_tts_config::Settings;
use packet_tts_pipeline::{LatencyRecorder, SynthesizerRegistry};

/// Application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration
    pub config: Arc<Settings>,
    /// Synthesis capability per model
    pub registry: Arc<SynthesizerRegistry>,
    /// Request latency history
    pub latency: Arc<LatencyRecorder>,
}

impl AppState {
    /// State backed by the built-in tone engines
    pub fn new(config: Settings) -> Self {
        let registry = SynthesizerRegistry::with_tone_engines(config.streaming.sample_rate);
        Self::with_registry(config, registry)
    }

    /// State with caller-supplied engines
    pub fn with_registry(config: Settings, registry: SynthesizerRegistry) -> Self {
        let latency = LatencyRecorder::new(config.latency.max_history);
        Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            latency: Arc::new(latency),
        }
    }

    /// Device reported by the first registered engine
    pub fn device(&self) -> String {
        self.registry
            .models()
            .into_iter()
            .find_map(|model| self.registry.get(model).ok())
            .map(|engine| engine.device().to_string())
            .unwrap_or_else(|| "cpu".to_string())
    }
}
