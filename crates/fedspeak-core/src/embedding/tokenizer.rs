//! Tokenization utilities for text processing.
//!
//! This module provides the `TokenizerHandle` type for managing HuggingFace
//! tokenizers with truncation to the encoder's input window, batch padding,
//! and access to the BERT special tokens used by masked-language modeling.

use crate::error::EmbeddingError;
use candle_core::{Device, Tensor};
use std::path::Path;
use tokenizers::tokenizer::{Tokenizer, TruncationDirection, TruncationParams, TruncationStrategy};

/// Ids of the BERT special tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialTokens {
    pub cls: u32,
    pub sep: u32,
    pub mask: u32,
    pub pad: u32,
}

impl SpecialTokens {
    pub fn contains(&self, id: u32) -> bool {
        id == self.cls || id == self.sep || id == self.mask || id == self.pad
    }
}

/// A padded batch of encodings, flattened row-major as `[batch_size, seq_len]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBatch {
    pub input_ids: Vec<u32>,
    pub type_ids: Vec<u32>,
    /// 1 for real tokens, 0 for padding
    pub attention_mask: Vec<u32>,
    pub batch_size: usize,
    pub seq_len: usize,
    /// Unpadded token count per row
    pub token_counts: Vec<usize>,
    /// Whether each row lost tokens to truncation
    pub truncated: Vec<bool>,
}

impl EncodedBatch {
    /// Builds `(input_ids, type_ids, attention_mask)` tensors on `device`.
    pub fn to_tensors(&self, device: &Device) -> candle_core::Result<(Tensor, Tensor, Tensor)> {
        let shape = (self.batch_size, self.seq_len);
        Ok((
            Tensor::from_vec(self.input_ids.clone(), shape, device)?,
            Tensor::from_vec(self.type_ids.clone(), shape, device)?,
            Tensor::from_vec(self.attention_mask.clone(), shape, device)?,
        ))
    }
}

/// Handle for a configured tokenizer.
///
/// Wraps a HuggingFace tokenizer with truncation settings. Keeps a second,
/// untruncated copy for corpus tokenization, where text is cut into training
/// blocks after tokenizing.
///
/// # Examples
///
/// ```ignore
/// let handle = TokenizerHandle::from_file(Path::new("tokenizer.json"), 512)?;
///
/// let batch = handle.encode_batch(&["Inflation remains elevated."])?;
/// println!("Token IDs: {:?}", batch.input_ids);
/// ```
#[derive(Clone)]
pub struct TokenizerHandle {
    tokenizer: Tokenizer,
    plain: Tokenizer,
    max_length: usize,
    pad_to_max_length: bool,
}

impl TokenizerHandle {
    /// Creates a tokenizer from JSON bytes with truncation configured.
    ///
    /// # Arguments
    ///
    /// * `tokenizer_bytes` - Serialized tokenizer JSON bytes
    /// * `max_length` - Maximum sequence length (special tokens included)
    ///
    /// # Errors
    ///
    /// Returns `EmbeddingError::TokenizerUnavailable` if initialization fails.
    pub fn from_bytes(tokenizer_bytes: Vec<u8>, max_length: usize) -> Result<Self, EmbeddingError> {
        let tokenizer = Tokenizer::from_bytes(tokenizer_bytes).map_err(|e| {
            EmbeddingError::TokenizerUnavailable(format!("Failed to deserialize tokenizer: {}", e))
        })?;
        Self::from_tokenizer(tokenizer, max_length)
    }

    /// Loads a `tokenizer.json` file.
    pub fn from_file(path: &Path, max_length: usize) -> Result<Self, EmbeddingError> {
        let bytes = std::fs::read(path).map_err(|e| {
            EmbeddingError::TokenizerUnavailable(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_bytes(bytes, max_length)
    }

    fn from_tokenizer(mut tokenizer: Tokenizer, max_length: usize) -> Result<Self, EmbeddingError> {
        if max_length < 2 {
            return Err(EmbeddingError::InvalidConfig(format!(
                "max_length must leave room for [CLS] and [SEP], got {}",
                max_length
            )));
        }
        // Padding is applied per batch
        tokenizer.with_padding(None);

        let mut plain = tokenizer.clone();
        plain.with_truncation(None).map_err(|e| {
            EmbeddingError::InvalidConfig(format!("Failed to disable truncation: {}", e))
        })?;
        configure_truncation(&mut tokenizer, max_length)?;

        Ok(Self {
            tokenizer,
            plain,
            max_length,
            pad_to_max_length: false,
        })
    }

    /// Pads every batch to `max_length` instead of its longest row.
    pub fn with_pad_to_max_length(mut self, pad: bool) -> Self {
        self.pad_to_max_length = pad;
        self
    }

    /// Returns the configured maximum length.
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Returns a reference to the underlying (truncating) tokenizer.
    pub fn inner(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Returns the vocabulary size.
    pub fn vocab_size(&self) -> usize {
        self.tokenizer.get_vocab_size(true)
    }

    /// Looks up a token's id.
    pub fn token_id(&self, token: &str) -> Option<u32> {
        self.tokenizer.token_to_id(token)
    }

    /// Ids of `[CLS]`, `[SEP]`, `[MASK]` and `[PAD]`.
    ///
    /// # Errors
    ///
    /// Returns `EmbeddingError::TokenizerUnavailable` if the vocabulary lacks
    /// one of them.
    pub fn special_tokens(&self) -> Result<SpecialTokens, EmbeddingError> {
        let lookup = |token: &str| {
            self.token_id(token).ok_or_else(|| {
                EmbeddingError::TokenizerUnavailable(format!("Vocabulary has no {} token", token))
            })
        };
        Ok(SpecialTokens {
            cls: lookup("[CLS]")?,
            sep: lookup("[SEP]")?,
            mask: lookup("[MASK]")?,
            pad: lookup("[PAD]")?,
        })
    }

    /// Tokenizes text into token IDs, including special tokens (CLS, SEP),
    /// truncated to `max_length`.
    ///
    /// # Errors
    ///
    /// Returns `EmbeddingError::TokenizationFailed` if encoding fails.
    pub fn tokenize(&self, text: &str) -> Result<Vec<u32>, EmbeddingError> {
        tokenize_text(&self.tokenizer, text)
    }

    /// Tokenizes text without special tokens and without truncation.
    pub fn tokenize_plain(&self, text: &str) -> Result<Vec<u32>, EmbeddingError> {
        let encoding = self
            .plain
            .encode(text, false)
            .map_err(|e| EmbeddingError::TokenizationFailed(format!("Encoding failed: {}", e)))?;
        Ok(encoding.get_ids().to_vec())
    }

    /// Encodes and pads a batch of texts.
    ///
    /// Each row is `[CLS] tokens [SEP]`, truncated to `max_length`, then
    /// padded with `[PAD]` (attention mask 0) to the longest row, or to
    /// `max_length` when configured.
    pub fn encode_batch(&self, texts: &[&str]) -> Result<EncodedBatch, EmbeddingError> {
        let pad_id = self.token_id("[PAD]").unwrap_or(0);

        let mut rows = Vec::with_capacity(texts.len());
        for text in texts {
            let encoding = self
                .tokenizer
                .encode(*text, true)
                .map_err(|e| EmbeddingError::TokenizationFailed(format!("Encoding failed: {}", e)))?;
            if encoding.get_ids().is_empty() {
                return Err(EmbeddingError::TokenizationFailed(
                    "Tokenizer returned no tokens".to_string(),
                ));
            }
            let truncated = !encoding.get_overflowing().is_empty();
            rows.push((
                encoding.get_ids().to_vec(),
                encoding.get_type_ids().to_vec(),
                truncated,
            ));
        }

        let longest = rows.iter().map(|(ids, _, _)| ids.len()).max().unwrap_or(0);
        let seq_len = if self.pad_to_max_length {
            self.max_length.max(longest)
        } else {
            longest
        };

        let mut batch = EncodedBatch {
            input_ids: Vec::with_capacity(rows.len() * seq_len),
            type_ids: Vec::with_capacity(rows.len() * seq_len),
            attention_mask: Vec::with_capacity(rows.len() * seq_len),
            batch_size: rows.len(),
            seq_len,
            token_counts: Vec::with_capacity(rows.len()),
            truncated: Vec::with_capacity(rows.len()),
        };
        for (ids, type_ids, truncated) in rows {
            let padding = seq_len - ids.len();
            batch.token_counts.push(ids.len());
            batch.truncated.push(truncated);
            batch.attention_mask.extend(std::iter::repeat(1).take(ids.len()));
            batch.attention_mask.extend(std::iter::repeat(0).take(padding));
            batch.input_ids.extend(ids);
            batch.input_ids.extend(std::iter::repeat(pad_id).take(padding));
            batch.type_ids.extend(type_ids);
            batch.type_ids.extend(std::iter::repeat(0).take(padding));
        }
        Ok(batch)
    }
}

/// Configures tokenizer with truncation settings.
fn configure_truncation(
    tokenizer: &mut Tokenizer,
    max_length: usize,
) -> Result<(), EmbeddingError> {
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length,
            stride: 0,
            strategy: TruncationStrategy::OnlyFirst,
            direction: TruncationDirection::Right,
        }))
        .map_err(|e| {
            EmbeddingError::InvalidConfig(format!(
                "Failed to configure tokenizer truncation: {}",
                e
            ))
        })?;

    Ok(())
}

/// Tokenizes text into token IDs.
///
/// # Arguments
///
/// * `tokenizer` - Reference to configured tokenizer
/// * `text` - Input text to tokenize
///
/// # Returns
///
/// Vector of token IDs, including special tokens (CLS, SEP).
pub fn tokenize_text(tokenizer: &Tokenizer, text: &str) -> Result<Vec<u32>, EmbeddingError> {
    let encoding = tokenizer
        .encode(text, true)
        .map_err(|e| EmbeddingError::TokenizationFailed(format!("Encoding failed: {}", e)))?;

    let ids = encoding.get_ids();
    if ids.is_empty() {
        return Err(EmbeddingError::TokenizationFailed(
            "Tokenizer returned no tokens".to_string(),
        ));
    }

    Ok(ids.to_vec())
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{tiny_tokenizer, CLS_ID, MASK_ID, PAD_ID, SEP_ID};

    #[test]
    fn test_tokenize_basic() {
        let handle = tiny_tokenizer(16);
        let token_ids = handle.tokenize("inflation rates rose").unwrap();

        assert_eq!(token_ids.len(), 5);
        assert_eq!(token_ids[0], CLS_ID, "First token should be [CLS]");
        assert_eq!(token_ids[4], SEP_ID, "Last token should be [SEP]");
    }

    #[test]
    fn test_tokenize_empty_string() {
        let handle = tiny_tokenizer(16);
        let token_ids = handle.tokenize("").unwrap();
        assert_eq!(token_ids, vec![CLS_ID, SEP_ID]);
    }

    #[test]
    fn test_truncation() {
        let handle = tiny_tokenizer(10);
        let token_ids = handle.tokenize(&"policy ".repeat(100)).unwrap();

        assert_eq!(token_ids.len(), 10);
        assert_eq!(token_ids[9], SEP_ID);
    }

    #[test]
    fn test_tokenize_plain_is_untruncated() {
        let handle = tiny_tokenizer(10);
        let ids = handle.tokenize_plain(&"policy ".repeat(100)).unwrap();

        assert_eq!(ids.len(), 100);
        assert!(!ids.contains(&CLS_ID));
    }

    #[test]
    fn test_encode_batch_pads_and_flags_truncation() {
        let handle = tiny_tokenizer(6);
        let batch = handle
            .encode_batch(&["rates", "policy policy policy policy policy policy"])
            .unwrap();

        assert_eq!(batch.batch_size, 2);
        assert_eq!(batch.seq_len, 6);
        assert_eq!(batch.token_counts, vec![3, 6]);
        assert_eq!(batch.truncated, vec![false, true]);
        assert_eq!(&batch.attention_mask[..6], &[1, 1, 1, 0, 0, 0]);
        assert_eq!(&batch.input_ids[3..6], &[PAD_ID, PAD_ID, PAD_ID]);
    }

    #[test]
    fn test_pad_to_max_length() {
        let handle = tiny_tokenizer(8).with_pad_to_max_length(true);
        let batch = handle.encode_batch(&["rates"]).unwrap();
        assert_eq!(batch.seq_len, 8);
        assert_eq!(batch.attention_mask.iter().sum::<u32>(), 3);
    }

    #[test]
    fn test_special_tokens() {
        let special = tiny_tokenizer(8).special_tokens().unwrap();
        assert_eq!(special.cls, CLS_ID);
        assert_eq!(special.mask, MASK_ID);
        assert!(special.contains(PAD_ID));
    }

    #[test]
    fn test_clone() {
        let handle = tiny_tokenizer(16);
        let cloned = handle.clone();

        assert_eq!(handle.max_length(), cloned.max_length());
        assert_eq!(handle.vocab_size(), cloned.vocab_size());
        assert_eq!(
            handle.tokenize("rates").unwrap(),
            cloned.tokenize("rates").unwrap()
        );
    }
}
