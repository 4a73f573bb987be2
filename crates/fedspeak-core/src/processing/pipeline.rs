//! Embedding pipeline for chunked speeches.
//!
//! The `EmbeddingPipeline` tokenizes chunks in batches, runs them through an
//! [`Embedder`] and pairs each CLS vector with its chunk identity.

use super::progress::{ProgressTimer, StageProgress};
use crate::dataset::{Chunk, Embedding};
use crate::embedding::{Embedder, TokenizerHandle};
use crate::error::ProcessingError;
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of embedding a set of chunks.
#[derive(Debug, Clone)]
pub struct EmbeddingRun {
    /// One embedding per input chunk, in input order
    pub embeddings: Vec<Embedding>,
    /// Total tokens fed to the model (excluding padding)
    pub total_tokens: usize,
    /// Chunks that were cut at the tokenizer's max length
    pub truncated: usize,
    /// Processing time in milliseconds
    pub elapsed_ms: u64,
}

impl EmbeddingRun {
    /// Returns the number of chunks embedded.
    pub fn chunk_count(&self) -> usize {
        self.embeddings.len()
    }

    /// Returns true if any chunks were embedded.
    pub fn has_embeddings(&self) -> bool {
        !self.embeddings.is_empty()
    }
}

/// Turns chunks into CLS embeddings.
///
/// # Thread Safety
///
/// The pipeline is `Send + Sync`; the `Embedder` and `TokenizerHandle` are
/// shared through `Arc`.
///
/// # Example
///
/// ```ignore
/// use fedspeak_core::processing::EmbeddingPipeline;
/// use std::sync::Arc;
///
/// let pipeline = EmbeddingPipeline::new(Arc::new(embedder), Arc::new(tokenizer), 16)?;
/// let run = pipeline.embed_chunks(&chunks, |progress| {
///     println!("{:.0}%", progress.percent_complete())
/// })?;
/// save_embeddings(&dir, "bert-base-uncased", &run.embeddings)?;
/// ```
pub struct EmbeddingPipeline {
    embedder: Arc<dyn Embedder>,
    tokenizer: Arc<TokenizerHandle>,
    batch_size: usize,
}

impl EmbeddingPipeline {
    /// Creates a new embedding pipeline.
    ///
    /// # Arguments
    ///
    /// * `embedder` - The model that produces CLS vectors
    /// * `tokenizer` - Tokenizer configured with the truncation length
    /// * `batch_size` - Chunks per forward pass (0 is treated as 1)
    ///
    /// # Errors
    ///
    /// Returns `ProcessingError::LengthExceedsModel` if the tokenizer can emit
    /// sequences longer than the model's position embeddings.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        tokenizer: Arc<TokenizerHandle>,
        batch_size: usize,
    ) -> Result<Self, ProcessingError> {
        let max_positions = embedder.max_position_embeddings();
        if tokenizer.max_length() > max_positions {
            return Err(ProcessingError::LengthExceedsModel {
                max_length: tokenizer.max_length(),
                max_positions,
            });
        }
        Ok(Self {
            embedder,
            tokenizer,
            batch_size: batch_size.max(1),
        })
    }

    /// Returns a reference to the embedder.
    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    /// Returns a reference to the tokenizer.
    pub fn tokenizer(&self) -> &TokenizerHandle {
        self.tokenizer.as_ref()
    }

    /// Embeds every chunk.
    ///
    /// Chunks longer than the tokenizer's max length are truncated and
    /// logged at warn level; embedding continues.
    ///
    /// # Arguments
    ///
    /// * `chunks` - Chunks to embed
    /// * `on_progress` - Called once before the first batch and after each batch
    ///
    /// # Returns
    ///
    /// An [`EmbeddingRun`] whose embeddings are aligned with `chunks`.
    pub fn embed_chunks<F>(
        &self,
        chunks: &[Chunk],
        mut on_progress: F,
    ) -> Result<EmbeddingRun, ProcessingError>
    where
        F: FnMut(&StageProgress),
    {
        let timer = ProgressTimer::new();
        let total = chunks.len();
        let mut embeddings = Vec::with_capacity(total);
        let mut total_tokens = 0;
        let mut truncated = 0;

        on_progress(&StageProgress::new(0, total, timer.elapsed_ms()));

        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let encoded = self.tokenizer.encode_batch(&texts)?;

            for (chunk, cut) in batch.iter().zip(&encoded.truncated) {
                if *cut {
                    truncated += 1;
                    warn!(
                        "Chunk {} exceeds {} tokens and was truncated",
                        chunk.id(),
                        self.tokenizer.max_length()
                    );
                }
            }
            total_tokens += encoded.token_counts.iter().sum::<usize>();

            let vectors = self.embedder.embed_batch(&encoded)?;
            if vectors.len() != batch.len() {
                return Err(ProcessingError::CountMismatch {
                    expected: batch.len(),
                    actual: vectors.len(),
                });
            }
            embeddings.extend(batch.iter().zip(vectors).map(|(chunk, vector)| Embedding {
                chunk_id: chunk.id(),
                vector,
            }));

            debug!(
                "Embedded batch of {} chunks ({} of {})",
                batch.len(),
                embeddings.len(),
                total
            );
            on_progress(&StageProgress::new(
                embeddings.len(),
                total,
                timer.elapsed_ms(),
            ));
        }

        Ok(EmbeddingRun {
            embeddings,
            total_tokens,
            truncated,
            elapsed_ms: timer.elapsed_ms(),
        })
    }
}
