//! Packet-to-frame slicing
//!
//! Every frame is a complete mono 16-bit WAV file that a client can decode
//! on its own. The very first frame of a stream may use a shorter duration
//! than the rest to get audio out sooner.

use std::io::Cursor;

use packet_tts_config::StreamingConfig;

use super::packetizer::AudioPacket;
use crate::audio::to_pcm16;
use crate::PipelineError;

/// One self-contained WAV frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Complete WAV file bytes
    pub bytes: Vec<u8>,
    /// Span index of the packet this frame came from
    pub packet_index: usize,
    pub is_first_of_stream: bool,
    pub is_last_of_stream: bool,
    /// PCM samples inside the WAV payload
    pub sample_count: usize,
    pub sample_rate: u32,
}

impl Frame {
    pub fn duration_ms(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.sample_count as f64 * 1000.0 / self.sample_rate as f64
    }
}

/// Frame durations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTiming {
    /// Duration of the first frame of a stream
    pub first_frame_ms: u32,
    /// Duration of every later frame
    pub subsequent_frame_ms: u32,
}

impl FrameTiming {
    pub fn from_config(config: &StreamingConfig, chunk_ms: Option<u32>) -> Self {
        Self {
            first_frame_ms: config.first_frame_ms,
            subsequent_frame_ms: chunk_ms.unwrap_or(config.subsequent_frame_ms),
        }
    }
}

/// Samples in `ms` milliseconds at `sample_rate` (at least one)
pub fn samples_for(sample_rate: u32, ms: u32) -> usize {
    ((sample_rate as u64 * ms as u64) / 1000).max(1) as usize
}

/// Encode PCM samples as a mono 16-bit WAV file
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>, PipelineError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}

/// Slice a packet into frames.
///
/// `has_sent_first_frame` decides whether the opening slice uses the first
/// frame duration and is flipped once any frame is produced. The same
/// packet and flag value always produce the same frames.
pub fn emit_frames(
    packet: &AudioPacket,
    timing: FrameTiming,
    has_sent_first_frame: &mut bool,
) -> Result<Vec<Frame>, PipelineError> {
    let pcm = to_pcm16(&packet.samples);
    let mut frames = Vec::new();
    let mut offset = 0;

    while offset < pcm.len() {
        let ms = if *has_sent_first_frame {
            timing.subsequent_frame_ms
        } else {
            timing.first_frame_ms
        };
        let end = (offset + samples_for(packet.sample_rate, ms)).min(pcm.len());

        frames.push(Frame {
            bytes: encode_wav(&pcm[offset..end], packet.sample_rate)?,
            packet_index: packet.span_index,
            is_first_of_stream: !*has_sent_first_frame,
            is_last_of_stream: false,
            sample_count: end - offset,
            sample_rate: packet.sample_rate,
        });

        *has_sent_first_frame = true;
        offset = end;
    }

    if packet.is_last {
        if let Some(last) = frames.last_mut() {
            last.is_last_of_stream = true;
        }
    }

    Ok(frames)
}

/// Stream-scoped frame emitter
#[derive(Debug, Clone)]
pub struct FrameEmitter {
    timing: FrameTiming,
    has_sent_first_frame: bool,
}

impl FrameEmitter {
    pub fn new(timing: FrameTiming) -> Self {
        Self {
            timing,
            has_sent_first_frame: false,
        }
    }

    pub fn timing(&self) -> FrameTiming {
        self.timing
    }

    pub fn has_sent_first_frame(&self) -> bool {
        self.has_sent_first_frame
    }

    /// Slice the next packet of the stream
    pub fn emit(&mut self, packet: &AudioPacket) -> Result<Vec<Frame>, PipelineError> {
        emit_frames(packet, self.timing, &mut self.has_sent_first_frame)
    }
}
