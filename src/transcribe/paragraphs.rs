//! Grouping of timed transcript segments into paragraphs.
//!
//! A paragraph closes when a segment ends with sentence punctuation, or when the
//! segment's end lies more than the gap threshold past the end of the last closed
//! paragraph. Transcripts without timing fall back to fixed-size sentence chunks.

use serde::Serialize;

use super::client::{RawTranscript, TranscriptSegment};

pub const DEFAULT_PARAGRAPH_GAP_SECONDS: f64 = 15.0;
pub const DEFAULT_SENTENCES_PER_PARAGRAPH: usize = 3;

/// Text ready for the response body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentedTranscript {
    pub full_text: String,
    pub paragraphs: Vec<String>,
    pub segments: Vec<TranscriptSegment>,
}

#[derive(Debug, Clone)]
pub struct ParagraphSegmenter {
    gap_seconds: f64,
    sentences_per_paragraph: usize,
}

impl Default for ParagraphSegmenter {
    fn default() -> Self {
        Self::new(DEFAULT_PARAGRAPH_GAP_SECONDS, DEFAULT_SENTENCES_PER_PARAGRAPH)
    }
}

impl ParagraphSegmenter {
    pub fn new(gap_seconds: f64, sentences_per_paragraph: usize) -> Self {
        Self {
            gap_seconds,
            sentences_per_paragraph: sentences_per_paragraph.max(1),
        }
    }

    /// Normalize segments and derive full text plus paragraphs
    pub fn segment(&self, raw: &RawTranscript) -> SegmentedTranscript {
        let segments: Vec<TranscriptSegment> = raw.segments.iter().map(normalize_segment).collect();
        let full_text = raw.text.trim().to_string();

        let mut paragraphs = self.group_segments(&segments);
        if paragraphs.is_empty() && !full_text.is_empty() {
            paragraphs = self.group_sentences(&full_text);
        }

        SegmentedTranscript {
            full_text,
            paragraphs,
            segments,
        }
    }

    /// Single pass over already-normalized segments
    pub fn group_segments(&self, segments: &[TranscriptSegment]) -> Vec<String> {
        let mut paragraphs = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut last_end = 0.0;

        for segment in segments {
            let text = segment.text.trim();
            if !text.is_empty() {
                current.push(text);
            }

            let long_gap = segment.end - last_end > self.gap_seconds;
            if long_gap || ends_sentence(text) {
                if !current.is_empty() {
                    paragraphs.push(current.join(" "));
                    current.clear();
                }
                last_end = segment.end;
            }
        }

        if !current.is_empty() {
            paragraphs.push(current.join(" "));
        }

        paragraphs
    }

    /// Chunk plain text into groups of sentences
    pub fn group_sentences(&self, text: &str) -> Vec<String> {
        split_sentences(text)
            .chunks(self.sentences_per_paragraph)
            .map(|chunk| chunk.join(" "))
            .collect()
    }
}

/// Round to two decimals, halves away from zero
pub fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn normalize_segment(segment: &TranscriptSegment) -> TranscriptSegment {
    let start = round_to_hundredths(segment.start.max(0.0));
    let end = round_to_hundredths(segment.end).max(start);

    TranscriptSegment {
        start,
        end,
        text: segment.text.trim().to_string(),
    }
}

fn ends_sentence(text: &str) -> bool {
    text.ends_with(['.', '!', '?'])
}

/// Split after `.`, `!` or `?` when followed by whitespace
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut after_terminal = false;
    let mut chars = text.char_indices().peekable();

    while let Some((index, c)) = chars.next() {
        if after_terminal && c.is_whitespace() {
            sentences.push(&text[start..index]);

            let mut next_start = index + c.len_utf8();
            while let Some(&(i, w)) = chars.peek() {
                if !w.is_whitespace() {
                    break;
                }
                next_start = i + w.len_utf8();
                chars.next();
            }
            start = next_start;
            after_terminal = false;
            continue;
        }
        after_terminal = matches!(c, '.' | '!' | '?');
    }

    if start < text.len() {
        sentences.push(&text[start..]);
    }

    sentences
}
