//! Synthesis capability adapters
//!
//! - [`ToneSynthesizer`]: deterministic stand-in engine (no model weights)
//! - [`BlockingSynthesizer`]: runs a CPU-bound engine off the async runtime
//! - [`SynthesizerRegistry`]: model choice to capability lookup

use std::collections::HashMap;
use std::sync::Arc;

use packet_tts_core::{
    ModelChoice, SpeechSynthesizer, SynthesisError, SynthesisRequest, SynthesizedAudio,
};
use tokio::sync::Semaphore;

/// Deterministic tone engine.
///
/// Renders a short sine burst per non-whitespace character, so output
/// length tracks text length the way a real model's does. Used when no
/// model is configured and throughout the tests.
#[derive(Debug, Clone)]
pub struct ToneSynthesizer {
    name: String,
    sample_rate: u32,
    ms_per_char: u32,
    amplitude: f32,
}

impl ToneSynthesizer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            name: "tone".to_string(),
            sample_rate,
            ms_per_char: 60,
            amplitude: 0.3,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_ms_per_char(mut self, ms_per_char: u32) -> Self {
        self.ms_per_char = ms_per_char;
        self
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Render a request synchronously
    pub fn render(&self, request: &SynthesisRequest) -> SynthesizedAudio {
        let per_char = (self.sample_rate as u64 * self.ms_per_char as u64 / 1000) as usize;
        let rate = self.sample_rate as f32;
        let mut samples = Vec::new();

        for c in request.text.chars().filter(|c| !c.is_whitespace()) {
            let freq = 180.0 + (c as u32 % 12) as f32 * 20.0;
            samples.extend((0..per_char).map(|i| {
                let t = i as f32 / rate;
                (2.0 * std::f32::consts::PI * freq * t).sin() * self.amplitude
            }));
        }

        SynthesizedAudio::new(samples, self.sample_rate)
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for ToneSynthesizer {
    async fn synthesize(
        &self,
        request: &SynthesisRequest,
    ) -> Result<SynthesizedAudio, SynthesisError> {
        Ok(self.render(request))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

type BlockingFn =
    dyn Fn(&SynthesisRequest) -> Result<SynthesizedAudio, SynthesisError> + Send + Sync;

/// Adapts a blocking synthesis function to the async capability.
///
/// Each call runs on tokio's blocking pool so model inference never stalls
/// the runtime's worker threads. Calls are serialized: the permit moves into
/// the blocking task and is only released when the engine returns, so a call
/// abandoned by a timeout still holds the engine until it finishes.
pub struct BlockingSynthesizer {
    name: String,
    device: String,
    func: Arc<BlockingFn>,
    gate: Arc<Semaphore>,
}

impl BlockingSynthesizer {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&SynthesisRequest) -> Result<SynthesizedAudio, SynthesisError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            device: "cpu".to_string(),
            func: Arc::new(func),
            gate: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = device.into();
        self
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for BlockingSynthesizer {
    async fn synthesize(
        &self,
        request: &SynthesisRequest,
    ) -> Result<SynthesizedAudio, SynthesisError> {
        let func = Arc::clone(&self.func);
        let request = request.clone();
        let permit = Arc::clone(&self.gate)
            .acquire_owned()
            .await
            .map_err(|e| SynthesisError::Failed(format!("synthesizer closed: {}", e)))?;

        tokio::task::spawn_blocking(move || {
            let result = (*func)(&request);
            drop(permit);
            result
        })
        .await
        .map_err(|e| SynthesisError::Failed(format!("synthesis task aborted: {}", e)))?
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn device(&self) -> &str {
        &self.device
    }
}

impl std::fmt::Debug for BlockingSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingSynthesizer")
            .field("name", &self.name)
            .field("device", &self.device)
            .finish()
    }
}

/// Capabilities keyed by model choice
#[derive(Clone, Default)]
pub struct SynthesizerRegistry {
    engines: HashMap<ModelChoice, Arc<dyn SpeechSynthesizer>>,
}

impl SynthesizerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tone engines for every model, each run on the blocking pool
    pub fn with_tone_engines(sample_rate: u32) -> Self {
        let mut registry = Self::new();
        for model in ModelChoice::ALL {
            let tone = ToneSynthesizer::new(sample_rate).with_name(model.engine_type());
            registry.register(
                model,
                Arc::new(BlockingSynthesizer::new(model.engine_type(), move |request| {
                    Ok(tone.render(request))
                })),
            );
        }
        registry
    }

    pub fn register(&mut self, model: ModelChoice, engine: Arc<dyn SpeechSynthesizer>) {
        tracing::info!(model = %model, engine = engine.name(), "Registered synthesizer");
        self.engines.insert(model, engine);
    }

    /// Capability for `model`; a missing one is unavailable
    pub fn get(&self, model: ModelChoice) -> Result<Arc<dyn SpeechSynthesizer>, SynthesisError> {
        self.engines.get(&model).cloned().ok_or_else(|| {
            SynthesisError::Unavailable(format!("no synthesizer registered for model '{}'", model))
        })
    }

    pub fn models(&self) -> Vec<ModelChoice> {
        let mut models: Vec<ModelChoice> = self.engines.keys().copied().collect();
        models.sort_by_key(|m| m.as_str());
        models
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}

impl std::fmt::Debug for SynthesizerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesizerRegistry")
            .field("models", &self.models())
            .finish()
    }
}
