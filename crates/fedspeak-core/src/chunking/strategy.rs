//! Split strategies, from coarsest to finest.
//!
//! Every strategy returns pieces that tile its input exactly: separators stay
//! attached to the piece they end, so concatenating the pieces gives back
//! the input byte for byte.

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// One level of the split hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitStrategy {
    /// After each run of newlines
    Paragraph,
    /// At Unicode sentence boundaries (UAX #29)
    Sentence,
    /// After each run of whitespace
    Word,
    /// Fixed-size character windows no longer than the overlap, so a chunk
    /// can always carry its full overlap forward
    Character,
}

impl SplitStrategy {
    /// The default order: paragraph, then sentence, then word, then character.
    pub const DEFAULT_ORDER: [SplitStrategy; 4] = [
        SplitStrategy::Paragraph,
        SplitStrategy::Sentence,
        SplitStrategy::Word,
        SplitStrategy::Character,
    ];

    /// Splits `text` into contiguous pieces.
    ///
    /// # Arguments
    ///
    /// * `text` - Text to split
    /// * `window` - Window size for [`SplitStrategy::Character`]; ignored
    ///   by the boundary-based strategies
    pub fn split<'a>(&self, text: &'a str, window: usize) -> Vec<&'a str> {
        match self {
            SplitStrategy::Paragraph => split_after_runs(text, |c| c == '\n'),
            SplitStrategy::Sentence => text.split_sentence_bounds().collect(),
            SplitStrategy::Word => split_after_runs(text, char::is_whitespace),
            SplitStrategy::Character => split_char_windows(text, window.max(1)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SplitStrategy::Paragraph => "paragraph",
            SplitStrategy::Sentence => "sentence",
            SplitStrategy::Word => "word",
            SplitStrategy::Character => "character",
        }
    }
}

/// Cuts after every maximal run of characters matching `is_separator`.
fn split_after_runs(text: &str, is_separator: impl Fn(char) -> bool) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut in_run = false;

    for (i, c) in text.char_indices() {
        if is_separator(c) {
            in_run = true;
        } else if in_run {
            pieces.push(&text[start..i]);
            start = i;
            in_run = false;
        }
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn split_char_windows(text: &str, window: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut count = 0;

    for (i, _) in text.char_indices() {
        if count == window {
            pieces.push(&text[start..i]);
            start = i;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}
