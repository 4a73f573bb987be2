//! Traits for embedding operations.
//!
//! The embedding pipeline and the classifier's prediction path only need a
//! model that turns padded token batches into fixed-width vectors, so the
//! concrete encoder sits behind [`Embedder`].

use super::tokenizer::EncodedBatch;
use crate::error::EmbeddingError;

/// Trait for embedding model operations.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow sharing across threads.
///
/// # Examples
///
/// ```ignore
/// let embedder: Arc<dyn Embedder> = Arc::new(BertEmbedder::load(&assets, device)?);
///
/// let batch = tokenizer.encode_batch(&["The Committee decided to maintain the target range."])?;
/// let vectors = embedder.embed_batch(&batch)?;
/// assert_eq!(vectors[0].len(), embedder.embedding_dim());
/// ```
pub trait Embedder: Send + Sync {
    /// Returns the maximum number of position embeddings (sequence length).
    ///
    /// Tokenizers feeding this model must truncate to at most this length.
    fn max_position_embeddings(&self) -> usize;

    /// Returns the embedding dimension (vector size).
    ///
    /// All embeddings from this model will have this length.
    fn embedding_dim(&self) -> usize;

    /// Generates one embedding per row of a padded batch.
    ///
    /// # Arguments
    ///
    /// * `batch` - Token ids, type ids and attention mask from the tokenizer
    ///
    /// # Returns
    ///
    /// Vector of embeddings in row order, each of length `embedding_dim()`
    fn embed_batch(&self, batch: &EncodedBatch) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}
