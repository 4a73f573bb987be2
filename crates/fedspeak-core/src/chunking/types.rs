//! Types for text chunking.

use std::ops::Range;

/// A chunk of text with metadata about its position in the source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Index of this chunk in the document (0-based)
    pub index: usize,
    /// The text content of this chunk
    pub text: String,
    /// Byte offset where this chunk starts in the original document
    pub start_byte: usize,
    /// Byte offset where this chunk ends in the original document (exclusive)
    pub end_byte: usize,
}

impl TextChunk {
    /// Byte range of the chunk within the source text.
    pub fn byte_range(&self) -> Range<usize> {
        self.start_byte..self.end_byte
    }

    /// Length in characters (the unit chunk bounds are expressed in).
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}
