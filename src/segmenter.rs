//! Sentence segmentation for synchronized highlighting.
//!
//! Text is cut after every run of sentence terminators (Chinese and ASCII).
//! The terminator run stays attached to the sentence it ends, so the segments
//! concatenate back to the source text. A terminator run at the very start of
//! the text has nothing to attach to and is dropped.

use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;

fn terminators() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[。！？.!?;；]+").expect("terminator pattern is valid"))
}

/// Split text into sentence segments.
pub fn segment(text: &str) -> Vec<String> {
    segment_spans(text)
        .into_iter()
        .map(|span| text[span].to_string())
        .collect()
}

/// Byte ranges of each segment within `text`.
///
/// Whitespace-only runs never open a segment of their own: they are folded
/// into the segment before them, or dropped when nothing precedes them.
pub fn segment_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans: Vec<Range<usize>> = Vec::new();
    let mut cursor = 0;

    for m in terminators().find_iter(text) {
        push_fragment(&mut spans, text, cursor..m.start());
        // Terminator run: attach to the preceding segment or drop it
        if let Some(last) = spans.last_mut() {
            last.end = m.end();
        }
        cursor = m.end();
    }
    push_fragment(&mut spans, text, cursor..text.len());

    spans
}

fn push_fragment(spans: &mut Vec<Range<usize>>, text: &str, fragment: Range<usize>) {
    if fragment.is_empty() {
        return;
    }
    if text[fragment.clone()].trim().is_empty() {
        if let Some(last) = spans.last_mut() {
            last.end = fragment.end;
        }
        return;
    }
    spans.push(fragment);
}
