//! Breath-group text segmentation for packet streaming
//!
//! Splits text into small spans that are synthesized independently. Long
//! runs are broken at the strongest boundary available (terminators, then
//! clause separators, then conjunctions) before falling back to a hard word
//! cutoff. Every character of the input ends up in exactly one span.

use packet_tts_config::StreamingConfig;

/// A split marker and its priority (higher splits first)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryRule {
    pub marker: &'static str,
    pub priority: u8,
}

const fn rule(marker: &'static str, priority: u8) -> BoundaryRule {
    BoundaryRule { marker, priority }
}

/// Boundary table, sorted by descending priority
pub const BOUNDARY_RULES: &[BoundaryRule] = &[
    rule(".", 6),
    rule("?", 5),
    rule("!", 4),
    rule(";", 3),
    rule(",", 2),
    rule(" and ", 1),
    rule(" but ", 1),
    rule(" or ", 1),
    // Gujarati: then, and, but
    rule(" તો ", 1),
    rule(" અને ", 1),
    rule(" પણ ", 1),
    // Marathi: and, but, so
    rule(" आणि ", 1),
    rule(" पण ", 1),
    rule(" म्हणून ", 1),
];

/// Sentence-ending punctuation
pub const HARD_TERMINATORS: &[&str] = &[".", "?", "!"];

/// One synthesizable slice of the input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    /// Position in the span sequence
    pub index: usize,
    /// Span text, trimmed, single-spaced
    pub text: String,
    /// Whitespace-separated words in `text`
    pub word_count: usize,
    /// Is this the final span?
    pub is_last: bool,
}

/// Segmenter configuration
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Runs longer than this are split at a boundary
    pub max_words: usize,
    /// Minimum words for a boundary split to count
    pub min_words: usize,
    /// Largest span a boundary split may produce
    pub max_span_words: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_words: 5,
            min_words: 2,
            max_span_words: 10,
        }
    }
}

impl From<&StreamingConfig> for ChunkerConfig {
    fn from(config: &StreamingConfig) -> Self {
        Self {
            max_words: config.words_per_packet.max(1),
            min_words: config.min_words,
            max_span_words: config.effective_max_span_words(),
        }
    }
}

/// Bookkeeping from a single split
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentStats {
    pub spans: usize,
    /// Non-whitespace characters restored by reconciliation
    pub recovered_chars: usize,
}

/// Breath-group segmenter
#[derive(Debug, Clone)]
pub struct Segmenter {
    config: ChunkerConfig,
}

impl Segmenter {
    /// Create a new segmenter
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Split text into ordered spans
    pub fn split(&self, text: &str) -> Vec<TextSpan> {
        self.split_with_stats(text).0
    }

    /// Split text and report whether reconciliation had to intervene
    pub fn split_with_stats(&self, text: &str) -> (Vec<TextSpan>, SegmentStats) {
        let normalized = collapse_whitespace(text);
        if normalized.is_empty() {
            return (Vec::new(), SegmentStats::default());
        }

        let mut pieces: Vec<String> = Vec::new();
        let mut remaining: &str = &normalized;

        while !remaining.is_empty() {
            let chunk = self.extract_next(remaining);
            let chunk = chunk.trim();
            if chunk.is_empty() {
                pieces.push(remaining.to_string());
                break;
            }
            pieces.push(chunk.to_string());
            remaining = consume(remaining, chunk);
        }

        let recovered_chars = reconcile(&normalized, &mut pieces);

        let total = pieces.len();
        let spans: Vec<TextSpan> = pieces
            .into_iter()
            .enumerate()
            .map(|(index, text)| TextSpan {
                index,
                word_count: text.split_whitespace().count(),
                text,
                is_last: index + 1 == total,
            })
            .collect();

        tracing::debug!(
            spans = spans.len(),
            words = normalized.split_whitespace().count(),
            "Split text into spans"
        );

        (
            spans,
            SegmentStats {
                spans: total,
                recovered_chars,
            },
        )
    }

    /// Pick the next span from the front of `text`
    fn extract_next(&self, text: &str) -> String {
        let word_count = text.split_whitespace().count();

        if word_count <= self.config.max_words {
            return match self.leftmost_valid_split(text, HARD_TERMINATORS.iter().copied(), None)
            {
                Some(end) => text[..end].to_string(),
                None => text.to_string(),
            };
        }

        let mut priorities: Vec<u8> = BOUNDARY_RULES.iter().map(|r| r.priority).collect();
        priorities.dedup();

        for priority in priorities {
            let markers = BOUNDARY_RULES
                .iter()
                .filter(|r| r.priority == priority)
                .map(|r| r.marker);
            if let Some(end) =
                self.leftmost_valid_split(text, markers, Some(self.config.max_span_words))
            {
                return text[..end].to_string();
            }
        }

        // No usable boundary: hard cutoff at max_words
        text.split_whitespace()
            .take(self.config.max_words)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Byte offset just past the leftmost acceptable marker occurrence.
    ///
    /// Each marker contributes only its first occurrence; among those the
    /// leftmost one producing a span within the word limits wins.
    fn leftmost_valid_split<'m>(
        &self,
        text: &str,
        markers: impl Iterator<Item = &'m str>,
        max_span_words: Option<usize>,
    ) -> Option<usize> {
        let mut candidates: Vec<usize> = markers
            .filter_map(|marker| text.find(marker).map(|idx| idx + marker.len()))
            .collect();
        candidates.sort_unstable();
        candidates.dedup();

        candidates.into_iter().find(|&end| {
            let words = text[..end].split_whitespace().count();
            words >= self.config.min_words.max(1)
                && max_span_words.map_or(true, |cap| words <= cap)
        })
    }
}

/// Collapse runs of whitespace to single spaces and trim
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_whitespace_count(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

/// Drop a committed chunk from the front of `remaining`
fn consume<'a>(remaining: &'a str, chunk: &str) -> &'a str {
    if let Some(rest) = remaining.strip_prefix(chunk) {
        return rest.trim_start();
    }

    // Chunk does not line up with the remainder; trim by length instead
    tracing::warn!(
        chunk_len = chunk.len(),
        remaining_len = remaining.len(),
        "Span not aligned with remaining text, trimming by length"
    );
    let mut cut = chunk.len().min(remaining.len());
    while cut > 0 && !remaining.is_char_boundary(cut) {
        cut -= 1;
    }
    if cut == 0 {
        cut = remaining.chars().next().map_or(remaining.len(), char::len_utf8);
    }
    remaining[cut..].trim_start()
}

/// Text of `source` after its first `skip` non-whitespace characters
fn suffix_after(source: &str, skip: usize) -> &str {
    let mut seen = 0;
    for (idx, c) in source.char_indices() {
        if c.is_whitespace() {
            continue;
        }
        if seen == skip {
            return &source[idx..];
        }
        seen += 1;
    }
    ""
}

/// Append whatever the spans lost as one final span.
///
/// Returns the number of non-whitespace characters restored.
fn reconcile(normalized: &str, pieces: &mut Vec<String>) -> usize {
    let expected = non_whitespace_count(normalized);
    let produced: usize = pieces.iter().map(|p| non_whitespace_count(p)).sum();

    if produced >= expected {
        return 0;
    }

    let missing = suffix_after(normalized, produced).trim();
    tracing::warn!(
        expected_chars = expected,
        produced_chars = produced,
        lost = expected - produced,
        "Segmentation lost text, appending remainder as final span"
    );
    if missing.is_empty() {
        return 0;
    }
    pieces.push(missing.to_string());
    non_whitespace_count(missing)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segmenter(max_words: usize, min_words: usize) -> Segmenter {
        Segmenter::new(ChunkerConfig {
            max_words,
            min_words,
            max_span_words: max_words * 2,
        })
    }

    fn texts(spans: &[TextSpan]) -> Vec<&str> {
        spans.iter().map(|s| s.text.as_str()).collect()
    }

    #[test]
    fn test_boundary_table_sorted() {
        assert!(BOUNDARY_RULES
            .windows(2)
            .all(|w| w[0].priority >= w[1].priority));
        assert_eq!(BOUNDARY_RULES[0], rule(".", 6));
        assert_eq!(BOUNDARY_RULES[4], rule(",", 2));
    }

    #[test]
    fn test_terminator_beats_comma() {
        let spans = segmenter(5, 2).split("The sun rose. It was warm, calm, and quiet.");
        assert_eq!(
            texts(&spans),
            vec!["The sun rose.", "It was warm, calm, and quiet."]
        );
        assert_eq!(spans[0].index, 0);
        assert_eq!(spans[1].word_count, 6);
        assert!(!spans[0].is_last);
        assert!(spans[1].is_last);
    }

    #[test]
    fn test_empty_input() {
        assert!(segmenter(5, 2).split("").is_empty());
        assert!(segmenter(5, 2).split("  \n\t ").is_empty());
    }

    #[test]
    fn test_single_word() {
        let spans = segmenter(5, 2).split("hello");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "hello");
        assert!(spans[0].is_last);
    }

    #[test]
    fn test_forced_split_without_boundaries() {
        let spans = segmenter(5, 2).split("a b c d e f g h i j k l");
        assert_eq!(texts(&spans), vec!["a b c d e", "f g h i j", "k l"]);
    }

    #[test]
    fn test_short_text_prefers_terminator() {
        let spans = segmenter(10, 2).split("Come here now. Please hurry");
        assert_eq!(texts(&spans), vec!["Come here now.", "Please hurry"]);
    }

    #[test]
    fn test_short_text_ignores_tiny_terminator_split() {
        let spans = segmenter(10, 2).split("Yes. I will");
        assert_eq!(texts(&spans), vec!["Yes. I will"]);
    }

    #[test]
    fn test_same_priority_uses_leftmost_marker() {
        // " and " is listed before " but ", yet " but " occurs first
        let spans =
            segmenter(5, 2).split("alpha beta but gamma delta and epsilon zeta eta theta");
        assert_eq!(spans[0].text, "alpha beta but");
    }

    #[test]
    fn test_gujarati_conjunction_split() {
        let spans = segmenter(5, 2).split("હું ઘરે ગયો અને પછી મેં ખાધું અને સૂઈ ગયો");
        assert_eq!(
            texts(&spans),
            vec!["હું ઘરે ગયો અને", "પછી મેં ખાધું અને", "સૂઈ ગયો"]
        );
    }

    #[test]
    fn test_marathi_text_is_preserved() {
        let text = "मी बाजारात गेलो आणि भाजी घेतली पण दूध विसरलो म्हणून परत गेलो";
        let spans = segmenter(4, 2).split(text);
        let joined = spans
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(joined, text);
    }

    #[test]
    fn test_far_terminator_is_capped() {
        let mut text = (0..40).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ");
        text.push('.');
        let spans = segmenter(5, 2).split(&text);
        assert!(spans[0].word_count <= 10);
        assert_eq!(spans[0].word_count, 5);
    }

    #[test]
    fn test_content_preserved() {
        let inputs = [
            "The sun rose. It was warm, calm, and quiet.",
            "go go go go go go go go go go go go. go go, go go and go",
            "  Many   spaces\tand\nnewlines here, with commas, and more and more text!  ",
            "Wait?! What... really?? Yes; no, maybe. or or or or or or or or",
            "unbroken",
            "a, b, c, d, e, f, g, h, i, j, k",
        ];
        let seg = segmenter(5, 2);
        for input in inputs {
            let (spans, stats) = seg.split_with_stats(input);
            let joined: String = spans
                .iter()
                .flat_map(|s| s.text.chars())
                .filter(|c| !c.is_whitespace())
                .collect();
            let expected: String = input.chars().filter(|c| !c.is_whitespace()).collect();
            assert_eq!(joined, expected);
            assert_eq!(stats.recovered_chars, 0);
            assert!(spans.iter().all(|s| !s.text.trim().is_empty()));
            assert!(spans.iter().enumerate().all(|(i, s)| s.index == i));
        }
    }

    #[test]
    fn test_consume_falls_back_to_length() {
        assert_eq!(consume("abc def", "abc"), "def");
        assert_eq!(consume("abc def", "xyz"), "def");
        assert_eq!(consume("અને", "x"), "ને");
    }

    #[test]
    fn test_reconcile_appends_missing_suffix() {
        let mut pieces = vec!["one two".to_string()];
        let restored = reconcile("one two three four", &mut pieces);
        assert_eq!(pieces, vec!["one two", "three four"]);
        assert_eq!(restored, "threefour".len());
    }
}
