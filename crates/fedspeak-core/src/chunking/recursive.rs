//! Character-bounded chunker with trailing overlap.

use super::{ChunkingStrategy, SplitStrategy, TextChunk};
use crate::config::ChunkingConfig;
use crate::error::ChunkingError;
use std::ops::Range;
use tracing::debug;

/// Splits text into chunks of at most `max_chars` characters, where each
/// chunk after the first repeats up to `overlap_chars` trailing characters
/// of its predecessor.
///
/// # Algorithm
///
/// 1. Starting from the whole text, each strategy in order re-splits the
///    pieces that are still longer than `max_chars`. The last strategy is
///    always [`SplitStrategy::Character`], whose windows are at most
///    `overlap_chars` long, which guarantees the bound.
/// 2. Pieces are merged greedily into chunks. When the next piece would
///    overflow the current chunk, the chunk is emitted and the following one
///    starts with its last `overlap_chars` characters, shortened only when
///    the next piece would not fit otherwise.
/// 3. A whitespace-only chunk is folded into the previous chunk when the
///    result stays within `max_chars`, and kept on its own otherwise.
///
/// Pieces tile the input, so chunk byte ranges are contiguous in the source
/// and every byte of the text lands in some chunk.
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    max_chars: usize,
    overlap_chars: usize,
    strategies: Vec<SplitStrategy>,
}

#[derive(Debug, Clone, Copy)]
struct Piece {
    start: usize,
    end: usize,
    chars: usize,
}

impl RecursiveChunker {
    /// Creates a chunker with the default strategy order.
    ///
    /// # Arguments
    ///
    /// * `max_chars` - Maximum characters per chunk (> 0)
    /// * `overlap_chars` - Trailing overlap (< `max_chars`)
    ///
    /// # Errors
    ///
    /// Returns [`ChunkingError::InvalidConfig`] for a zero maximum or an
    /// overlap that is not smaller than the maximum.
    pub fn new(max_chars: usize, overlap_chars: usize) -> Result<Self, ChunkingError> {
        if max_chars == 0 {
            return Err(ChunkingError::InvalidConfig(
                "max_chars must be greater than 0".to_string(),
            ));
        }
        if overlap_chars >= max_chars {
            return Err(ChunkingError::InvalidConfig(format!(
                "overlap_chars ({overlap_chars}) must be smaller than max_chars ({max_chars})"
            )));
        }
        Ok(Self {
            max_chars,
            overlap_chars,
            strategies: SplitStrategy::DEFAULT_ORDER.to_vec(),
        })
    }

    /// Creates a chunker from the pipeline's chunking section.
    pub fn from_config(config: &ChunkingConfig) -> Result<Self, ChunkingError> {
        Self::new(config.max_chars, config.overlap_chars)
    }

    /// Replaces the strategy order. [`SplitStrategy::Character`] is appended
    /// when missing so the bound always holds.
    pub fn with_strategies(mut self, strategies: Vec<SplitStrategy>) -> Self {
        self.strategies = strategies;
        if self.strategies.last() != Some(&SplitStrategy::Character) {
            self.strategies.retain(|s| *s != SplitStrategy::Character);
            self.strategies.push(SplitStrategy::Character);
        }
        self
    }

    pub fn overlap_chars(&self) -> usize {
        self.overlap_chars
    }

    pub fn strategies(&self) -> &[SplitStrategy] {
        &self.strategies
    }

    /// Window size for the character fallback.
    fn char_window(&self) -> usize {
        if self.overlap_chars > 0 {
            self.overlap_chars
        } else {
            self.max_chars
        }
    }

    fn split_into_pieces(&self, text: &str) -> Vec<Piece> {
        let mut pieces = vec![Piece {
            start: 0,
            end: text.len(),
            chars: text.chars().count(),
        }];

        for strategy in &self.strategies {
            if pieces.iter().all(|p| p.chars <= self.max_chars) {
                break;
            }
            let mut refined = Vec::with_capacity(pieces.len());
            for piece in pieces {
                if piece.chars <= self.max_chars {
                    refined.push(piece);
                    continue;
                }
                let mut offset = piece.start;
                for part in strategy.split(&text[piece.start..piece.end], self.char_window()) {
                    refined.push(Piece {
                        start: offset,
                        end: offset + part.len(),
                        chars: part.chars().count(),
                    });
                    offset += part.len();
                }
            }
            debug!(
                strategy = strategy.name(),
                pieces = refined.len(),
                "Refined oversized pieces"
            );
            pieces = refined;
        }
        pieces
    }

    fn merge(&self, text: &str, pieces: Vec<Piece>) -> Vec<TextChunk> {
        let mut chunks = Vec::new();
        let Some(first) = pieces.first() else {
            return chunks;
        };
        let (mut start, mut end) = (first.start, first.start);
        let mut total = 0usize;

        for piece in pieces {
            if total > 0 && total + piece.chars > self.max_chars {
                self.emit(text, start..end, &mut chunks);
                // piece.chars <= max_chars after refinement
                let carry = self.overlap_chars.min(self.max_chars - piece.chars);
                start = tail_start(&text[start..end], carry) + start;
                total = text[start..end].chars().count();
            }
            total += piece.chars;
            end = piece.end;
        }
        self.emit(text, start..end, &mut chunks);
        chunks
    }

    fn emit(&self, text: &str, range: Range<usize>, chunks: &mut Vec<TextChunk>) {
        if range.is_empty() {
            return;
        }
        if text[range.clone()].trim().is_empty() {
            if let Some(last) = chunks.last_mut() {
                if text[last.start_byte..range.end].chars().count() <= self.max_chars {
                    last.end_byte = range.end;
                    last.text = text[last.start_byte..range.end].to_string();
                    return;
                }
            }
        }
        chunks.push(TextChunk {
            index: chunks.len(),
            text: text[range.clone()].to_string(),
            start_byte: range.start,
            end_byte: range.end,
        });
    }
}

/// Byte offset in `window` where its last `chars` characters begin.
fn tail_start(window: &str, chars: usize) -> usize {
    if chars == 0 {
        return window.len();
    }
    window
        .char_indices()
        .rev()
        .nth(chars - 1)
        .map_or(0, |(i, _)| i)
}

impl ChunkingStrategy for RecursiveChunker {
    fn chunk(&self, text: &str) -> Result<Vec<TextChunk>, ChunkingError> {
        if text.trim().is_empty() {
            return Ok(vec![]);
        }
        let pieces = self.split_into_pieces(text);
        Ok(self.merge(text, pieces))
    }

    fn name(&self) -> &'static str {
        "recursive"
    }

    fn max_chars(&self) -> usize {
        self.max_chars
    }
}
