//! Streaming pipeline configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ConfigError;

/// Allowed range for client-selected frame durations (ms)
pub const CLIENT_CHUNK_MS_RANGE: std::ops::RangeInclusive<u32> = 20..=100;

const FRAME_MS_RANGE: std::ops::RangeInclusive<u32> = 10..=1000;
const SAMPLE_RATE_RANGE: std::ops::RangeInclusive<u32> = 8000..=48000;

/// Segmentation, synthesis and framing parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// Target sample rate of every emitted frame
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Maximum words per text span (smaller = faster first packet)
    #[serde(default = "default_words_per_packet")]
    pub words_per_packet: usize,

    /// Minimum words for a boundary split to be accepted
    #[serde(default = "default_min_words")]
    pub min_words: usize,

    /// Largest span a boundary split may produce; defaults to twice `words_per_packet`
    #[serde(default)]
    pub max_span_words: Option<usize>,

    /// Trailing/leading words passed to the engine as continuity context (0 disables)
    #[serde(default = "default_context_words")]
    pub context_words: usize,

    /// Duration of the very first frame of a stream
    #[serde(default = "default_first_frame_ms")]
    pub first_frame_ms: u32,

    /// Duration of every later frame
    #[serde(default = "default_subsequent_frame_ms")]
    pub subsequent_frame_ms: u32,

    /// Frame duration used when the client does not pick one
    #[serde(default = "default_chunk_ms")]
    pub default_chunk_ms: u32,

    /// Per-span synthesis timeout
    #[serde(default = "default_synthesis_timeout_ms")]
    pub synthesis_timeout_ms: u64,

    /// Send a `chunk_meta` message before each binary frame
    #[serde(default = "default_true")]
    pub chunk_metadata: bool,
}

fn default_sample_rate() -> u32 {
    16000
}
fn default_words_per_packet() -> usize {
    5
}
fn default_min_words() -> usize {
    2
}
fn default_context_words() -> usize {
    3
}
fn default_first_frame_ms() -> u32 {
    20
}
fn default_subsequent_frame_ms() -> u32 {
    60
}
fn default_chunk_ms() -> u32 {
    40
}
fn default_synthesis_timeout_ms() -> u64 {
    10_000
}
fn default_true() -> bool {
    true
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            words_per_packet: default_words_per_packet(),
            min_words: default_min_words(),
            max_span_words: None,
            context_words: default_context_words(),
            first_frame_ms: default_first_frame_ms(),
            subsequent_frame_ms: default_subsequent_frame_ms(),
            default_chunk_ms: default_chunk_ms(),
            synthesis_timeout_ms: default_synthesis_timeout_ms(),
            chunk_metadata: true,
        }
    }
}

impl StreamingConfig {
    /// Upper bound on words in a span produced by a boundary split
    pub fn effective_max_span_words(&self) -> usize {
        self.max_span_words
            .unwrap_or(self.words_per_packet.saturating_mul(2))
            .max(self.words_per_packet)
    }

    pub fn synthesis_timeout(&self) -> Duration {
        Duration::from_millis(self.synthesis_timeout_ms)
    }

    /// Validate streaming parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.words_per_packet == 0 {
            return Err(ConfigError::invalid(
                "streaming.words_per_packet",
                "must be at least 1",
            ));
        }
        if self.min_words > self.words_per_packet {
            return Err(ConfigError::invalid(
                "streaming.min_words",
                format!(
                    "{} exceeds words_per_packet ({})",
                    self.min_words, self.words_per_packet
                ),
            ));
        }
        if !SAMPLE_RATE_RANGE.contains(&self.sample_rate) {
            return Err(ConfigError::invalid(
                "streaming.sample_rate",
                format!("{} Hz outside 8000..=48000", self.sample_rate),
            ));
        }
        for (field, value) in [
            ("streaming.first_frame_ms", self.first_frame_ms),
            ("streaming.subsequent_frame_ms", self.subsequent_frame_ms),
        ] {
            if !FRAME_MS_RANGE.contains(&value) {
                return Err(ConfigError::invalid(
                    field,
                    format!("{}ms outside 10..=1000", value),
                ));
            }
        }
        if !CLIENT_CHUNK_MS_RANGE.contains(&self.default_chunk_ms) {
            return Err(ConfigError::invalid(
                "streaming.default_chunk_ms",
                format!("{}ms outside 20..=100", self.default_chunk_ms),
            ));
        }
        if self.synthesis_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "streaming.synthesis_timeout_ms",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}
