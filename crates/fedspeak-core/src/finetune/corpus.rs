//! Corpus tokenization and block construction.

use crate::embedding::{SpecialTokens, TokenizerHandle};
use crate::error::{EmbeddingError, TrainingError};
use tracing::debug;

/// Tokenizes every paragraph without special tokens and concatenates the ids.
pub fn tokenize_corpus(
    tokenizer: &TokenizerHandle,
    paragraphs: &[String],
) -> Result<Vec<u32>, EmbeddingError> {
    let mut tokens = Vec::new();
    for paragraph in paragraphs {
        tokens.extend(tokenizer.tokenize_plain(paragraph)?);
    }
    debug!(
        "Tokenized {} paragraphs into {} tokens",
        paragraphs.len(),
        tokens.len()
    );
    Ok(tokens)
}

/// Cuts a token stream into `[CLS] … [SEP]` training blocks.
///
/// Each block holds `block_size - 2` corpus tokens. A trailing remainder
/// shorter than `min_block_tokens` is dropped unless it is the only block.
///
/// # Errors
///
/// Returns `TrainingError::InvalidConfig` if `block_size < 3` and
/// `TrainingError::InvalidData` if `tokens` is empty.
pub fn build_blocks(
    tokens: &[u32],
    special: &SpecialTokens,
    block_size: usize,
    min_block_tokens: usize,
) -> Result<Vec<Vec<u32>>, TrainingError> {
    if block_size < 3 {
        return Err(TrainingError::InvalidConfig(format!(
            "block_size must be at least 3, got {}",
            block_size
        )));
    }
    if tokens.is_empty() {
        return Err(TrainingError::InvalidData(
            "Corpus produced no tokens".to_string(),
        ));
    }

    let content = block_size - 2;
    let pieces: Vec<&[u32]> = tokens.chunks(content).collect();
    let keep = match pieces.last() {
        Some(last) if pieces.len() > 1 && last.len() < min_block_tokens => pieces.len() - 1,
        _ => pieces.len(),
    };

    Ok(pieces[..keep]
        .iter()
        .map(|piece| {
            let mut block = Vec::with_capacity(piece.len() + 2);
            block.push(special.cls);
            block.extend_from_slice(piece);
            block.push(special.sep);
            block
        })
        .collect())
}
