//! Packetized streaming speech synthesis
//!
//! Text is segmented into breath-group spans, each span is synthesized as
//! an independent audio packet with a little neighbouring context, and
//! packets are sliced into self-contained WAV frames as soon as they exist.
//!
//! - [`Segmenter`] splits text into spans
//! - [`ContextCarrier`] supplies the context window for each span
//! - [`PacketSynthesizer`] turns spans into normalized, resampled packets
//! - [`FrameEmitter`] slices packets into WAV frames
//! - [`StreamCoordinator`] drives the whole thing as a lazy frame stream
//! - [`LatencyRecorder`] keeps per-request timing history

pub mod audio;
pub mod latency;
pub mod tts;

pub use latency::{LatencyMetrics, LatencyRecorder, LatencyStats, ModelStats};
pub use tts::{
    AudioPacket, BlockingSynthesizer, ChunkerConfig, CompleteAudio, ContextCarrier, Frame,
    FrameEmitter, FrameStream, FrameTiming, PacketSynthesizer, SegmentStats, Segmenter,
    StatsHandle, StreamCoordinator, StreamStats, SynthesizerRegistry, TextSpan,
    ToneSynthesizer,
};

use packet_tts_core::SynthesisError;

/// Pipeline errors
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Synthesis error: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("Frame encoding error: {0}")]
    Encoding(String),
}

impl From<hound::Error> for PipelineError {
    fn from(err: hound::Error) -> Self {
        PipelineError::Encoding(err.to_string())
    }
}

impl From<PipelineError> for packet_tts_core::Error {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Synthesis(e) => packet_tts_core::Error::Synthesis(e),
            PipelineError::Encoding(msg) => packet_tts_core::Error::Other(msg),
        }
    }
}
