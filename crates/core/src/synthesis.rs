//! Speech synthesis capability
//!
//! The pipeline never talks to a model directly. It is handed a
//! [`SpeechSynthesizer`] and calls it once per text span.

use serde::{Deserialize, Serialize};

use crate::{Language, SynthesisError};

/// Continuity context supplied alongside a span.
///
/// Carries the tail of the previous span and the head of the current one so
/// an engine can keep prosody stable across the packet seam. It never changes
/// what gets synthesized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextWindow {
    pub previous_tail_words: Vec<String>,
    pub current_head_words: Vec<String>,
}

impl ContextWindow {
    /// No previous words and no current words
    pub fn is_empty(&self) -> bool {
        self.previous_tail_words.is_empty() && self.current_head_words.is_empty()
    }

    /// Context rendered as a single line of text
    pub fn text(&self) -> String {
        self.previous_tail_words
            .iter()
            .chain(self.current_head_words.iter())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// One synthesis call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    /// Text to speak
    pub text: String,
    /// Requested language
    pub language: Language,
    /// Optional continuity context
    pub context: Option<ContextWindow>,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>, language: Language) -> Self {
        Self {
            text: text.into(),
            language,
            context: None,
        }
    }

    pub fn with_context(mut self, context: ContextWindow) -> Self {
        if !context.is_empty() {
            self.context = Some(context);
        }
        self
    }
}

/// Raw audio returned by a capability
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedAudio {
    /// Mono samples, nominally in -1.0..=1.0
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl SynthesizedAudio {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Audio duration in milliseconds
    pub fn duration_ms(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 * 1000.0 / self.sample_rate as f64
    }
}

/// Speech synthesis capability
///
/// Implementations may serialize requests internally; the pipeline issues
/// calls for one stream strictly in order and never overlaps them.
#[async_trait::async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize one span of text
    async fn synthesize(
        &self,
        request: &SynthesisRequest,
    ) -> Result<SynthesizedAudio, SynthesisError>;

    /// Engine name reported to clients
    fn name(&self) -> &str;

    /// Device the engine runs on (cpu, cuda, ...)
    fn device(&self) -> &str {
        "cpu"
    }
}
