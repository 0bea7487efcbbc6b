//! Packetized streaming text-to-speech
//!
//! Stages, in stream order:
//! - Breath-group segmentation into spans
//! - Per-span synthesis with carried context
//! - Slicing packets into self-contained WAV frames

pub mod backends;
pub mod chunker;
pub mod context;
pub mod framing;
pub mod packetizer;
pub mod streaming;

pub use backends::{BlockingSynthesizer, SynthesizerRegistry, ToneSynthesizer};
pub use chunker::{ChunkerConfig, SegmentStats, Segmenter, TextSpan};
pub use context::ContextCarrier;
pub use framing::{Frame, FrameEmitter, FrameTiming};
pub use packetizer::{AudioPacket, PacketSynthesizer};
pub use streaming::{CompleteAudio, FrameStream, StatsHandle, StreamCoordinator, StreamStats};
