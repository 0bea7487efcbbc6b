//! Rolling request latency history
//!
//! Sits beside the pipeline rather than in it: transports hand over one
//! [`LatencyMetrics`] per finished (or aborted) request.

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::Serialize;

use crate::tts::StreamStats;

/// Timing for a single request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencyMetrics {
    pub total_time_ms: f64,
    pub inference_time_ms: f64,
    pub first_frame_ms: Option<f64>,
    pub text_length: usize,
    pub audio_duration_ms: f64,
    pub model: String,
    pub device: String,
    pub language: String,
    pub frames: usize,
    /// Spans that produced no audio
    pub shortfall: usize,
}

impl LatencyMetrics {
    /// Metrics for a finished or aborted stream
    pub fn from_stream(
        stats: &StreamStats,
        text_length: usize,
        model: impl Into<String>,
        device: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            total_time_ms: stats.elapsed_ms(),
            inference_time_ms: stats.synthesis_ms,
            first_frame_ms: stats.first_frame_ms,
            text_length,
            audio_duration_ms: stats.audio_duration_ms(),
            model: model.into(),
            device: device.into(),
            language: language.into(),
            frames: stats.frames_yielded,
            shortfall: stats.shortfall(),
        }
    }

    /// Inference time over audio duration (0 when either is 0)
    pub fn real_time_factor(&self) -> f64 {
        if self.audio_duration_ms <= 0.0 || self.inference_time_ms <= 0.0 {
            return 0.0;
        }
        self.inference_time_ms / self.audio_duration_ms
    }

    pub fn throughput_chars_per_sec(&self) -> f64 {
        if self.inference_time_ms <= 0.0 {
            return 0.0;
        }
        self.text_length as f64 * 1000.0 / self.inference_time_ms
    }
}

/// Aggregate over the retained history
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LatencyStats {
    /// Lifetime count, not bounded by history size
    pub total_requests: u64,
    pub avg_total_time_ms: f64,
    pub avg_inference_time_ms: f64,
    pub avg_first_frame_ms: f64,
    pub avg_rtf: f64,
    pub avg_throughput_chars_per_sec: f64,
    pub min_inference_time_ms: f64,
    pub max_inference_time_ms: f64,
}

/// Aggregate for one model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelStats {
    pub model: String,
    pub count: usize,
    pub avg_inference_time_ms: f64,
    pub avg_rtf: f64,
}

struct History {
    entries: VecDeque<LatencyMetrics>,
    total_requests: u64,
}

/// Bounded latency history, safe to share across tasks
pub struct LatencyRecorder {
    max_history: usize,
    history: Mutex<History>,
}

impl LatencyRecorder {
    pub fn new(max_history: usize) -> Self {
        let max_history = max_history.max(1);
        Self {
            max_history,
            history: Mutex::new(History {
                entries: VecDeque::with_capacity(max_history),
                total_requests: 0,
            }),
        }
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Record one request, evicting the oldest beyond capacity
    pub fn record(&self, metrics: LatencyMetrics) {
        tracing::info!(
            model = %metrics.model,
            device = %metrics.device,
            language = %metrics.language,
            text_length = metrics.text_length,
            total_ms = %format!("{:.1}", metrics.total_time_ms),
            inference_ms = %format!("{:.1}", metrics.inference_time_ms),
            first_frame_ms = ?metrics.first_frame_ms,
            rtf = %format!("{:.3}", metrics.real_time_factor()),
            "Request latency"
        );

        let mut history = self.history.lock();
        if history.entries.len() == self.max_history {
            history.entries.pop_front();
        }
        history.entries.push_back(metrics);
        history.total_requests += 1;
    }

    /// Averages over the retained history
    pub fn stats(&self) -> LatencyStats {
        let history = self.history.lock();
        let entries = &history.entries;
        if entries.is_empty() {
            return LatencyStats {
                total_requests: history.total_requests,
                ..LatencyStats::default()
            };
        }

        let n = entries.len() as f64;
        let avg = |f: fn(&LatencyMetrics) -> f64| entries.iter().map(f).sum::<f64>() / n;

        let first_frames: Vec<f64> = entries.iter().filter_map(|m| m.first_frame_ms).collect();
        let avg_first_frame_ms = if first_frames.is_empty() {
            0.0
        } else {
            first_frames.iter().sum::<f64>() / first_frames.len() as f64
        };

        LatencyStats {
            total_requests: history.total_requests,
            avg_total_time_ms: avg(|m| m.total_time_ms),
            avg_inference_time_ms: avg(|m| m.inference_time_ms),
            avg_first_frame_ms,
            avg_rtf: avg(|m| m.real_time_factor()),
            avg_throughput_chars_per_sec: avg(|m| m.throughput_chars_per_sec()),
            min_inference_time_ms: entries
                .iter()
                .map(|m| m.inference_time_ms)
                .fold(f64::INFINITY, f64::min),
            max_inference_time_ms: entries
                .iter()
                .map(|m| m.inference_time_ms)
                .fold(0.0, f64::max),
        }
    }

    /// Averages for one model, `None` if it has no retained requests
    pub fn model_stats(&self, model: &str) -> Option<ModelStats> {
        let history = self.history.lock();
        let matching: Vec<&LatencyMetrics> =
            history.entries.iter().filter(|m| m.model == model).collect();
        if matching.is_empty() {
            return None;
        }

        let n = matching.len() as f64;
        Some(ModelStats {
            model: model.to_string(),
            count: matching.len(),
            avg_inference_time_ms: matching.iter().map(|m| m.inference_time_ms).sum::<f64>() / n,
            avg_rtf: matching.iter().map(|m| m.real_time_factor()).sum::<f64>() / n,
        })
    }

    /// Most recent requests, newest last
    pub fn recent(&self, limit: usize) -> Vec<LatencyMetrics> {
        let history = self.history.lock();
        let skip = history.entries.len().saturating_sub(limit);
        history.entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.history.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LatencyRecorder {
    fn default() -> Self {
        Self::new(100)
    }
}
