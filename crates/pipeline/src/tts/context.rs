//! Neighbouring-word context for span synthesis

use packet_tts_core::ContextWindow;

use super::chunker::TextSpan;

/// Carries the tail of the previous span into the next request.
///
/// Stateful across one stream; call [`ContextCarrier::reset`] between
/// streams.
#[derive(Debug, Clone)]
pub struct ContextCarrier {
    context_size: usize,
    previous_words: Vec<String>,
}

impl ContextCarrier {
    pub fn new(context_size: usize) -> Self {
        Self {
            context_size,
            previous_words: Vec::new(),
        }
    }

    pub fn context_size(&self) -> usize {
        self.context_size
    }

    /// Context window for `current_words`, then remember them as "previous"
    pub fn window(&mut self, current_words: &[&str]) -> ContextWindow {
        let tail_start = self.previous_words.len().saturating_sub(self.context_size);
        let window = ContextWindow {
            previous_tail_words: self.previous_words[tail_start..].to_vec(),
            current_head_words: current_words
                .iter()
                .take(self.context_size)
                .map(|w| w.to_string())
                .collect(),
        };

        self.previous_words = current_words.iter().map(|w| w.to_string()).collect();
        window
    }

    /// Context window for a span
    pub fn window_for(&mut self, span: &TextSpan) -> ContextWindow {
        let words: Vec<&str> = span.text.split_whitespace().collect();
        self.window(&words)
    }

    /// Forget the previous span
    pub fn reset(&mut self) {
        self.previous_words.clear();
    }
}
