//! Text chunking for speech processing.
//!
//! Speeches are far longer than the encoder's input window, so each one is
//! split into bounded-length chunks before embedding. Chunk order is the
//! order of the source text and is preserved by every later stage.
//!
//! # Strategy Order
//!
//! Boundaries are tried from coarsest to finest, and only pieces that are
//! still too long are split further:
//! - **Paragraph**: runs of newlines
//! - **Sentence**: Unicode sentence boundaries
//! - **Word**: runs of whitespace
//! - **Character**: fixed windows (always fits)
//!
//! # Overlap
//!
//! Consecutive chunks share `overlap_chars` characters: the start of each
//! chunk repeats the end of the previous one. The overlap is shorter only
//! when a boundary piece would not fit in the next chunk otherwise.

mod recursive;
mod strategy;
mod types;

use crate::error::ChunkingError;

pub use recursive::RecursiveChunker;
pub use strategy::SplitStrategy;
pub use types::TextChunk;

/// Trait for text chunking strategies.
///
/// Implementations define how to split text into coherent chunks suitable
/// for embedding.
pub trait ChunkingStrategy: Send + Sync {
    /// Splits text into chunks according to this strategy.
    ///
    /// # Arguments
    ///
    /// * `text` - The source text to chunk
    ///
    /// # Returns
    ///
    /// Vector of text chunks with metadata. Chunks are ordered by their
    /// position in the source document (ascending `start_byte`).
    fn chunk(&self, text: &str) -> Result<Vec<TextChunk>, ChunkingError>;

    /// Returns a human-readable name for this strategy.
    fn name(&self) -> &'static str;

    /// Returns the maximum characters per chunk.
    fn max_chars(&self) -> usize;
}

/// Rebuilds the source text from overlapping chunks.
///
/// Each chunk contributes only the bytes past the end of the text already
/// covered by earlier chunks, so overlap regions appear once.
pub fn reassemble(chunks: &[TextChunk]) -> String {
    let mut out = String::new();
    let mut covered = 0usize;

    for chunk in chunks {
        if chunk.end_byte <= covered {
            continue;
        }
        let skip = covered.saturating_sub(chunk.start_byte);
        out.push_str(&chunk.text[skip..]);
        covered = chunk.end_byte;
    }
    out
}
