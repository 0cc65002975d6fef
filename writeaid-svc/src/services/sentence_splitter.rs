//! Paragraph to sentence splitting
//!
//! A sentence boundary is a whitespace run immediately after `.`, `!` or `?`.
//! The terminal punctuation stays with its sentence.

use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

static BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]\s+").expect("sentence boundary pattern is valid"));

/// Split a paragraph into trimmed, non-empty sentences in textual order
pub fn split_sentences(paragraph: &str) -> Vec<String> {
    sentence_spans(paragraph)
        .into_iter()
        .map(|span| paragraph[span].to_string())
        .collect()
}

/// Byte ranges of each trimmed, non-empty sentence within `paragraph`
///
/// Text between spans (the separating whitespace) is left untouched, so a
/// paragraph can be rebuilt with its original layout.
pub fn sentence_spans(paragraph: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut start = 0;

    for found in BOUNDARY.find_iter(paragraph) {
        // punctuation is a single ASCII byte
        let end = found.start() + 1;
        push_span(&mut spans, paragraph, start..end);
        start = found.end();
    }
    push_span(&mut spans, paragraph, start..paragraph.len());

    spans
}

fn push_span(spans: &mut Vec<Range<usize>>, paragraph: &str, piece: Range<usize>) {
    let text = &paragraph[piece.clone()];
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return;
    }
    let lead = text.len() - text.trim_start().len();
    let begin = piece.start + lead;
    spans.push(begin..begin + trimmed.len());
}
