//! Stream coordination
//!
//! Wires segmentation, packet synthesis and framing into one lazy frame
//! stream. Nothing is synthesized until the consumer pulls, and only the
//! frames of the current packet are ever buffered. Dropping the stream
//! stops it: no further spans are synthesized.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use packet_tts_config::StreamingConfig;
use packet_tts_core::{Language, SpeechSynthesizer};
use parking_lot::Mutex;
use tokio::time::Instant;

use super::chunker::{ChunkerConfig, Segmenter, TextSpan};
use super::framing::{encode_wav, Frame, FrameEmitter, FrameTiming};
use super::packetizer::PacketSynthesizer;
use crate::audio::to_pcm16;
use crate::PipelineError;

/// Per-stream counters
#[derive(Debug, Clone)]
pub struct StreamStats {
    pub spans_total: usize,
    /// Spans that produced a packet
    pub spans_yielded: usize,
    pub packets_skipped: usize,
    pub frames_yielded: usize,
    pub audio_samples: usize,
    pub sample_rate: u32,
    /// Total time spent inside synthesis calls
    pub synthesis_ms: f64,
    /// Time from stream creation to the first yielded frame
    pub first_frame_ms: Option<f64>,
    pub started_at: Instant,
    pub finished: bool,
    /// Dropped before completion
    pub cancelled: bool,
    /// Ended by a fatal error
    pub failed: bool,
}

impl StreamStats {
    fn new(spans_total: usize, sample_rate: u32, started_at: Instant) -> Self {
        Self {
            spans_total,
            spans_yielded: 0,
            packets_skipped: 0,
            frames_yielded: 0,
            audio_samples: 0,
            sample_rate,
            synthesis_ms: 0.0,
            first_frame_ms: None,
            started_at,
            finished: false,
            cancelled: false,
            failed: false,
        }
    }

    /// Spans that did not produce audio
    pub fn shortfall(&self) -> usize {
        self.spans_total.saturating_sub(self.spans_yielded)
    }

    pub fn audio_duration_ms(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.audio_samples as f64 * 1000.0 / self.sample_rate as f64
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64() * 1000.0
    }
}

/// Shared view of a stream's counters
#[derive(Debug, Clone)]
pub struct StatsHandle(Arc<Mutex<StreamStats>>);

impl StatsHandle {
    fn new(stats: StreamStats) -> Self {
        Self(Arc::new(Mutex::new(stats)))
    }

    /// Copy of the current counters
    pub fn snapshot(&self) -> StreamStats {
        self.0.lock().clone()
    }

    fn update<R>(&self, f: impl FnOnce(&mut StreamStats) -> R) -> R {
        f(&mut self.0.lock())
    }
}

/// Lazy sequence of frames for one request
pub struct FrameStream {
    inner: Pin<Box<dyn Stream<Item = Result<Frame, PipelineError>> + Send>>,
    stats: StatsHandle,
}

impl FrameStream {
    pub fn stats(&self) -> StatsHandle {
        self.stats.clone()
    }
}

impl Stream for FrameStream {
    type Item = Result<Frame, PipelineError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl std::fmt::Debug for FrameStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameStream")
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

struct StreamState {
    spans: std::vec::IntoIter<TextSpan>,
    language: Language,
    packetizer: PacketSynthesizer,
    emitter: FrameEmitter,
    pending: VecDeque<Frame>,
    stats: StatsHandle,
    done: bool,
}

impl StreamState {
    async fn next_frame(mut self) -> Option<(Result<Frame, PipelineError>, Self)> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                self.stats.update(|s| {
                    s.frames_yielded += 1;
                    if s.first_frame_ms.is_none() {
                        s.first_frame_ms = Some(s.elapsed_ms());
                    }
                });
                return Some((Ok(frame), self));
            }

            if self.done {
                self.finish();
                return None;
            }

            let Some(span) = self.spans.next() else {
                self.done = true;
                continue;
            };

            match self.packetizer.synthesize_span(&span, self.language).await {
                Ok(Some(packet)) => {
                    self.stats.update(|s| {
                        s.spans_yielded += 1;
                        s.audio_samples += packet.samples.len();
                        s.synthesis_ms += packet.synthesis_ms;
                    });
                    match self.emitter.emit(&packet) {
                        Ok(frames) => self.pending.extend(frames),
                        Err(e) => {
                            tracing::error!(span = span.index, error = %e, "Frame encoding failed");
                            self.fail();
                            return Some((Err(e), self));
                        }
                    }
                }
                Ok(None) => self.stats.update(|s| s.packets_skipped += 1),
                Err(e) => {
                    self.fail();
                    return Some((Err(PipelineError::from(e)), self));
                }
            }
        }
    }

    fn fail(&mut self) {
        self.done = true;
        self.pending.clear();
        self.stats.update(|s| s.failed = true);
        self.finish();
    }

    fn finish(&mut self) {
        let stats = self.stats.update(|s| {
            if s.finished {
                return None;
            }
            s.finished = true;
            Some(s.clone())
        });
        let Some(stats) = stats else {
            return;
        };

        if stats.shortfall() > 0 {
            tracing::error!(
                yielded = stats.spans_yielded,
                total = stats.spans_total,
                missing = stats.shortfall(),
                "Stream ended short of its spans"
            );
        }
        tracing::info!(
            spans = stats.spans_total,
            packets = stats.spans_yielded,
            frames = stats.frames_yielded,
            audio_ms = stats.audio_duration_ms(),
            elapsed_ms = stats.elapsed_ms(),
            "Frame stream complete"
        );
    }
}

impl Drop for StreamState {
    fn drop(&mut self) {
        let mut stats = self.stats.0.lock();
        if !stats.finished {
            stats.finished = true;
            stats.cancelled = true;
            tracing::info!(
                frames = stats.frames_yielded,
                remaining_spans = self.spans.len(),
                "Frame stream cancelled"
            );
        }
    }
}

/// Whole-utterance result of non-streaming synthesis
#[derive(Debug, Clone, PartialEq)]
pub struct CompleteAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub spans_total: usize,
    /// Spans that produced audio
    pub packets: usize,
    pub synthesis_ms: f64,
}

impl CompleteAudio {
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_ms(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 * 1000.0 / self.sample_rate as f64
    }

    pub fn shortfall(&self) -> usize {
        self.spans_total.saturating_sub(self.packets)
    }

    /// Encode the whole utterance as one WAV file
    pub fn to_wav(&self) -> Result<Vec<u8>, PipelineError> {
        encode_wav(&to_pcm16(&self.samples), self.sample_rate)
    }
}

/// Streaming front door of the pipeline
pub struct StreamCoordinator {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    config: StreamingConfig,
    segmenter: Segmenter,
}

impl StreamCoordinator {
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>, config: StreamingConfig) -> Self {
        let segmenter = Segmenter::new(ChunkerConfig::from(&config));
        Self {
            synthesizer,
            config,
            segmenter,
        }
    }

    pub fn synthesizer(&self) -> &Arc<dyn SpeechSynthesizer> {
        &self.synthesizer
    }

    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    pub fn segmenter(&self) -> &Segmenter {
        &self.segmenter
    }

    fn packet_synthesizer(&self) -> PacketSynthesizer {
        PacketSynthesizer::new(
            Arc::clone(&self.synthesizer),
            self.config.sample_rate,
            self.config.synthesis_timeout(),
            self.config.context_words,
        )
    }

    /// Start a frame stream.
    ///
    /// `chunk_ms` overrides the duration of every frame after the first.
    pub fn stream(&self, text: &str, language: Language, chunk_ms: Option<u32>) -> FrameStream {
        let started_at = Instant::now();
        let (spans, segment_stats) = self.segmenter.split_with_stats(text);
        if segment_stats.recovered_chars > 0 {
            tracing::warn!(
                recovered = segment_stats.recovered_chars,
                "Segmentation needed reconciliation"
            );
        }

        tracing::info!(
            spans = spans.len(),
            language = %language,
            engine = self.synthesizer.name(),
            "Starting frame stream"
        );

        let stats = StatsHandle::new(StreamStats::new(
            spans.len(),
            self.config.sample_rate,
            started_at,
        ));
        let state = StreamState {
            spans: spans.into_iter(),
            language,
            packetizer: self.packet_synthesizer(),
            emitter: FrameEmitter::new(FrameTiming::from_config(&self.config, chunk_ms)),
            pending: VecDeque::new(),
            stats: stats.clone(),
            done: false,
        };

        FrameStream {
            inner: Box::pin(futures::stream::unfold(state, StreamState::next_frame)),
            stats,
        }
    }

    /// Synthesize the whole text and concatenate the packets
    pub async fn synthesize_all(
        &self,
        text: &str,
        language: Language,
    ) -> Result<CompleteAudio, PipelineError> {
        let spans = self.segmenter.split(text);
        let mut audio = CompleteAudio {
            samples: Vec::new(),
            sample_rate: self.config.sample_rate,
            spans_total: spans.len(),
            packets: 0,
            synthesis_ms: 0.0,
        };

        let packets = self.packet_synthesizer().packets(spans, language);
        futures::pin_mut!(packets);
        while let Some(packet) = packets.next().await {
            let packet = packet?;
            audio.samples.extend_from_slice(&packet.samples);
            audio.packets += 1;
            audio.synthesis_ms += packet.synthesis_ms;
        }

        Ok(audio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tts::backends::ToneSynthesizer;

    fn coordinator() -> StreamCoordinator {
        StreamCoordinator::new(
            Arc::new(ToneSynthesizer::new(22050)),
            StreamingConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_stream_yields_ordered_frames() {
        let coordinator = coordinator();
        let stream = coordinator.stream(
            "The sun rose. It was warm, calm, and quiet.",
            Language::Gujarati,
            Some(40),
        );
        let stats = stream.stats();
        let frames: Vec<Frame> = stream.map(|f| f.unwrap()).collect().await;

        assert!(frames.len() > 2);
        assert!(frames[0].is_first_of_stream);
        assert_eq!(frames.iter().filter(|f| f.is_first_of_stream).count(), 1);
        assert!(frames.last().unwrap().is_last_of_stream);
        assert!(frames.windows(2).all(|w| w[0].packet_index <= w[1].packet_index));
        assert!(frames.iter().all(|f| f.sample_rate == 16000));

        let stats = stats.snapshot();
        assert!(stats.finished);
        assert!(!stats.cancelled);
        assert_eq!(stats.spans_total, 2);
        assert_eq!(stats.spans_yielded, 2);
        assert_eq!(stats.shortfall(), 0);
        assert_eq!(stats.frames_yielded, frames.len());
        assert!(stats.first_frame_ms.is_some());
    }

    #[tokio::test]
    async fn test_frame_durations() {
        let coordinator = coordinator();
        let frames: Vec<Frame> = coordinator
            .stream("one two three four five six seven", Language::Marathi, Some(40))
            .map(|f| f.unwrap())
            .collect()
            .await;

        // 20ms first frame, 40ms after, 16kHz output
        assert_eq!(frames[0].sample_count, 320);
        assert_eq!(frames[1].sample_count, 640);
        assert!(frames.iter().all(|f| f.sample_count <= 640));
    }

    #[tokio::test]
    async fn test_empty_text_yields_nothing() {
        let coordinator = coordinator();
        let stream = coordinator.stream("   ", Language::Gujarati, None);
        let stats = stream.stats();
        let frames: Vec<_> = stream.collect().await;

        assert!(frames.is_empty());
        let stats = stats.snapshot();
        assert!(stats.finished);
        assert_eq!(stats.spans_total, 0);
    }

    #[tokio::test]
    async fn test_dropped_stream_is_cancelled() {
        let coordinator = coordinator();
        let mut stream = coordinator.stream(
            "a b c d e f g h i j k l m n o p",
            Language::Gujarati,
            None,
        );
        let stats = stream.stats();
        assert!(stream.next().await.unwrap().is_ok());
        drop(stream);

        let stats = stats.snapshot();
        assert!(stats.cancelled);
        assert_eq!(stats.spans_yielded, 1);
    }

    #[tokio::test]
    async fn test_synthesize_all_matches_stream_audio() {
        let coordinator = coordinator();
        let text = "The sun rose. It was warm, calm, and quiet.";

        let audio = coordinator
            .synthesize_all(text, Language::Gujarati)
            .await
            .unwrap();
        let streamed: usize = coordinator
            .stream(text, Language::Gujarati, None)
            .map(|f| f.unwrap().sample_count)
            .fold(0, |acc, n| async move { acc + n })
            .await;

        assert_eq!(audio.samples.len(), streamed);
        assert_eq!(audio.packets, 2);
        assert_eq!(audio.sample_rate, 16000);

        let wav = audio.to_wav().unwrap();
        assert_eq!(wav.len(), 44 + audio.samples.len() * 2);
    }
}
