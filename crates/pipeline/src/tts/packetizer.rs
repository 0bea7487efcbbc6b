//! Span-to-packet synthesis
//!
//! Each span becomes one [`AudioPacket`]. A span that fails (error, timeout
//! or empty audio) is logged and skipped; only an unavailable capability
//! stops the sequence.

use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use packet_tts_core::{Language, SpeechSynthesizer, SynthesisError, SynthesisRequest};
use tokio::time::Instant;

use super::chunker::TextSpan;
use super::context::ContextCarrier;
use crate::audio::{normalize, Resampler};
use crate::PipelineError;

/// Synthesized audio for one span
#[derive(Debug, Clone, PartialEq)]
pub struct AudioPacket {
    /// Index of the source span
    pub span_index: usize,
    /// Normalized mono samples at `sample_rate`
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    /// Produced from the final span
    pub is_last: bool,
    /// Wall time spent in the synthesis call
    pub synthesis_ms: f64,
}

impl AudioPacket {
    pub fn duration_ms(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 * 1000.0 / self.sample_rate as f64
    }
}

/// Turns spans into packets, one capability call per span
pub struct PacketSynthesizer {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    target_sample_rate: u32,
    timeout: Duration,
    context: ContextCarrier,
}

impl PacketSynthesizer {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        target_sample_rate: u32,
        timeout: Duration,
        context_words: usize,
    ) -> Self {
        Self {
            synthesizer,
            target_sample_rate,
            timeout,
            context: ContextCarrier::new(context_words),
        }
    }

    pub fn target_sample_rate(&self) -> u32 {
        self.target_sample_rate
    }

    /// Clear carried context before reuse on another stream
    pub fn reset(&mut self) {
        self.context.reset();
    }

    /// Synthesize one span.
    ///
    /// Returns `Ok(None)` when the span is skipped and `Err` only for a
    /// fatal capability error.
    pub async fn synthesize_span(
        &mut self,
        span: &TextSpan,
        language: Language,
    ) -> Result<Option<AudioPacket>, SynthesisError> {
        let text = span.text.trim();
        if text.is_empty() {
            tracing::warn!(span = span.index, "Empty span, skipping");
            return Ok(None);
        }

        let context = self.context.window_for(span);
        let request = SynthesisRequest::new(text, language).with_context(context);

        let started = Instant::now();
        let result = match tokio::time::timeout(self.timeout, self.synthesizer.synthesize(&request))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(SynthesisError::Timeout(self.timeout.as_millis() as u64)),
        };
        let synthesis_ms = started.elapsed().as_secs_f64() * 1000.0;

        let audio = match result.and_then(|audio| {
            if audio.is_empty() {
                Err(SynthesisError::EmptyAudio)
            } else if audio.sample_rate == 0 {
                Err(SynthesisError::Failed("engine reported a 0 Hz sample rate".into()))
            } else {
                Ok(audio)
            }
        }) {
            Ok(audio) => audio,
            Err(e) if e.is_fatal() => {
                tracing::error!(span = span.index, error = %e, "Synthesis capability unavailable");
                return Err(e);
            }
            Err(e) => {
                tracing::warn!(
                    span = span.index,
                    text = %text,
                    error = %e,
                    "Span synthesis failed, skipping packet"
                );
                if span.is_last {
                    tracing::error!(
                        span = span.index,
                        "Final span produced no audio, stream will end short"
                    );
                }
                return Ok(None);
            }
        };

        let source_rate = audio.sample_rate;
        let mut samples = audio.samples;
        normalize(&mut samples);
        if source_rate != self.target_sample_rate {
            samples = Resampler::new(source_rate, self.target_sample_rate).resample(&samples);
        }

        tracing::debug!(
            span = span.index,
            samples = samples.len(),
            synthesis_ms,
            "Packet synthesized"
        );

        Ok(Some(AudioPacket {
            span_index: span.index,
            samples,
            sample_rate: self.target_sample_rate,
            is_last: span.is_last,
            synthesis_ms,
        }))
    }

    /// Lazy packet sequence over `spans`.
    ///
    /// Skipped spans produce nothing; a fatal error is yielded once and
    /// ends the sequence.
    pub fn packets(
        mut self,
        spans: Vec<TextSpan>,
        language: Language,
    ) -> impl Stream<Item = Result<AudioPacket, PipelineError>> + Send {
        self.reset();
        let total = spans.len();
        let state = (self, spans.into_iter(), 0usize, false);

        futures::stream::unfold(state, move |(mut this, mut spans, mut yielded, done)| async move {
            if done {
                return None;
            }
            loop {
                let Some(span) = spans.next() else {
                    if yielded < total {
                        tracing::error!(
                            yielded,
                            total,
                            missing = total - yielded,
                            "Packet sequence ended short"
                        );
                    }
                    return None;
                };
                match this.synthesize_span(&span, language).await {
                    Ok(Some(packet)) => {
                        yielded += 1;
                        return Some((Ok(packet), (this, spans, yielded, false)));
                    }
                    Ok(None) => continue,
                    Err(e) => {
                        return Some((Err(PipelineError::from(e)), (this, spans, yielded, true)));
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use packet_tts_core::SynthesizedAudio;
    use parking_lot::Mutex;

    /// Records requests; fails on spans containing "FAIL"
    struct ScriptedSynth {
        rate: u32,
        requests: Mutex<Vec<SynthesisRequest>>,
    }

    impl ScriptedSynth {
        fn new(rate: u32) -> Arc<Self> {
            Arc::new(Self {
                rate,
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl SpeechSynthesizer for ScriptedSynth {
        async fn synthesize(
            &self,
            request: &SynthesisRequest,
        ) -> Result<SynthesizedAudio, SynthesisError> {
            self.requests.lock().push(request.clone());
            if request.text.contains("FAIL") {
                return Err(SynthesisError::Failed("scripted".into()));
            }
            if request.text.contains("EMPTY") {
                return Ok(SynthesizedAudio::new(Vec::new(), self.rate));
            }
            if request.text.contains("DOWN") {
                return Err(SynthesisError::Unavailable("model not loaded".into()));
            }
            if request.text.contains("SLOW") {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            Ok(SynthesizedAudio::new(vec![2.0; 100], self.rate))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn spans(texts: &[&str]) -> Vec<TextSpan> {
        texts
            .iter()
            .enumerate()
            .map(|(index, text)| TextSpan {
                index,
                text: text.to_string(),
                word_count: text.split_whitespace().count(),
                is_last: index + 1 == texts.len(),
            })
            .collect()
    }

    fn packetizer(synth: Arc<ScriptedSynth>, target: u32) -> PacketSynthesizer {
        PacketSynthesizer::new(synth, target, Duration::from_millis(500), 3)
    }

    #[tokio::test]
    async fn test_packet_is_normalized() {
        let synth = ScriptedSynth::new(16000);
        let mut p = packetizer(synth, 16000);
        let packet = p
            .synthesize_span(&spans(&["hello there"])[0], Language::Gujarati)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(packet.samples.len(), 100);
        assert!(packet.samples.iter().all(|&s| s == 1.0));
        assert!(packet.is_last);
        assert_eq!(packet.span_index, 0);
    }

    #[tokio::test]
    async fn test_packet_is_resampled() {
        let synth = ScriptedSynth::new(8000);
        let mut p = packetizer(synth, 16000);
        let packet = p
            .synthesize_span(&spans(&["hello"])[0], Language::Marathi)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(packet.samples.len(), 200);
        assert_eq!(packet.sample_rate, 16000);
    }

    #[tokio::test]
    async fn test_failures_are_skipped() {
        let synth = ScriptedSynth::new(16000);
        let p = packetizer(synth.clone(), 16000);
        let packets: Vec<_> = p
            .packets(spans(&["one", "FAIL two", "EMPTY three", "four"]), Language::Gujarati)
            .collect()
            .await;

        let indices: Vec<usize> = packets.iter().map(|p| p.as_ref().unwrap().span_index).collect();
        assert_eq!(indices, vec![0, 3]);
        assert_eq!(synth.requests.lock().len(), 4);
    }

    #[tokio::test]
    async fn test_unavailable_ends_sequence() {
        let synth = ScriptedSynth::new(16000);
        let p = packetizer(synth.clone(), 16000);
        let packets: Vec<_> = p
            .packets(spans(&["one", "DOWN", "three"]), Language::Gujarati)
            .collect()
            .await;

        assert_eq!(packets.len(), 2);
        assert!(packets[0].is_ok());
        assert!(matches!(
            packets[1],
            Err(PipelineError::Synthesis(SynthesisError::Unavailable(_)))
        ));
        assert_eq!(synth.requests.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_skips_span() {
        let synth = ScriptedSynth::new(16000);
        let mut p = packetizer(synth, 16000);
        let result = p
            .synthesize_span(&spans(&["SLOW span"])[0], Language::Gujarati)
            .await;

        assert_eq!(result, Ok(None));
    }

    #[tokio::test]
    async fn test_context_is_carried() {
        let synth = ScriptedSynth::new(16000);
        let p = packetizer(synth.clone(), 16000);
        let _: Vec<_> = p
            .packets(spans(&["a b c d", "e f"]), Language::Gujarati)
            .collect()
            .await;

        let requests = synth.requests.lock();
        let first = requests[0].context.as_ref().unwrap();
        assert!(first.previous_tail_words.is_empty());
        let second = requests[1].context.as_ref().unwrap();
        assert_eq!(second.previous_tail_words, vec!["b", "c", "d"]);
        assert_eq!(second.current_head_words, vec!["e", "f"]);
        assert_eq!(requests[1].text, "e f");
    }
}
