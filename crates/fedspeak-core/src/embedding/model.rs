//! BERT encoder inference.
//!
//! [`BertEmbedder`] runs a BERT encoder over a padded batch and returns the
//! final hidden state at the `[CLS]` position of every row.

use super::assets::ModelAssets;
use super::tokenizer::EncodedBatch;
use super::traits::Embedder;
use crate::error::EmbeddingError;
use candle_core::{DType, Device, IndexOp};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tracing::{debug, info};

/// BERT encoder producing `[CLS]` embeddings.
///
/// # Examples
///
/// ```ignore
/// let assets = ModelAssets::from_dir(Path::new("models/fedspeak-bert"))?;
/// let embedder = BertEmbedder::load(&assets, select_device())?;
///
/// let batch = tokenizer.encode_batch(&["Inflation expectations remain anchored."])?;
/// let vectors = embedder.embed_batch(&batch)?;
/// assert_eq!(vectors[0].len(), 768);
/// ```
pub struct BertEmbedder {
    model: BertModel,
    config: BertConfig,
    device: Device,
}

impl BertEmbedder {
    /// Loads a checkpoint from resolved assets.
    ///
    /// Accepts weights named either `bert.*` (checkpoints saved with a
    /// pre-training head) or bare `embeddings.*`/`encoder.*`.
    ///
    /// # Errors
    ///
    /// Returns `EmbeddingError::ModelLoad` if the config or weights cannot be
    /// read, or the weights do not match the config.
    pub fn load(assets: &ModelAssets, device: Device) -> Result<Self, EmbeddingError> {
        let config = assets.load_config()?;
        info!(
            "Config: {}d hidden, {} layers, {} heads",
            config.hidden_size, config.num_hidden_layers, config.num_attention_heads
        );

        // SAFETY: the weights file is not modified while mapped
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[&assets.weights_path], DType::F32, &device)
        }
        .map_err(|e| EmbeddingError::ModelLoad(format!("Failed to create VarBuilder: {}", e)))?;

        let model = match BertModel::load(vb.pp("bert"), &config) {
            Ok(model) => model,
            Err(prefixed) => {
                debug!("No bert.* weights ({}), trying unprefixed names", prefixed);
                BertModel::load(vb, &config).map_err(|e| {
                    EmbeddingError::ModelLoad(format!("Failed to create BertModel: {}", e))
                })?
            }
        };
        info!("Loaded encoder from {}", assets.weights_path.display());

        Ok(Self {
            model,
            config,
            device,
        })
    }

    /// Returns a reference to the config.
    pub fn config(&self) -> &BertConfig {
        &self.config
    }

    /// Returns a reference to the device.
    pub fn device(&self) -> &Device {
        &self.device
    }
}

impl Embedder for BertEmbedder {
    fn max_position_embeddings(&self) -> usize {
        self.config.max_position_embeddings
    }

    fn embedding_dim(&self) -> usize {
        self.config.hidden_size
    }

    fn embed_batch(&self, batch: &EncodedBatch) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if batch.batch_size == 0 {
            return Ok(vec![]);
        }
        if batch.seq_len > self.max_position_embeddings() {
            return Err(EmbeddingError::InvalidConfig(format!(
                "Sequence length {} exceeds the model's {} positions",
                batch.seq_len,
                self.max_position_embeddings()
            )));
        }

        let (ids, type_ids, mask) = batch
            .to_tensors(&self.device)
            .map_err(|e| EmbeddingError::TensorCreation(format!("Failed to create batch tensor: {}", e)))?;

        // [batch, seq_len, hidden] -> [batch, hidden] at position 0
        let hidden = self
            .model
            .forward(&ids, &type_ids, Some(&mask))
            .map_err(|e| EmbeddingError::InferenceFailed(format!("Forward pass failed: {}", e)))?;
        let cls = hidden.i((.., 0))?.contiguous()?.to_dtype(DType::F32)?;

        let vectors = cls.to_vec2::<f32>()?;
        if let Some(first) = vectors.first() {
            if first.len() != self.embedding_dim() {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.embedding_dim(),
                    actual: first.len(),
                });
            }
        }
        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{tiny_tokenizer, write_tiny_model, TINY_HIDDEN};

    #[test]
    fn test_model_load_missing_weights() {
        let dir = tempfile::tempdir().unwrap();
        write_tiny_model(dir.path());
        std::fs::write(dir.path().join("model.safetensors"), b"not safetensors").unwrap();

        let assets = ModelAssets::from_dir(dir.path()).unwrap();
        let result = BertEmbedder::load(&assets, Device::Cpu);
        assert!(matches!(result, Err(EmbeddingError::ModelLoad(_))));
    }

    #[test]
    fn test_embed_batch_returns_cls_vectors() {
        let dir = tempfile::tempdir().unwrap();
        write_tiny_model(dir.path());
        let assets = ModelAssets::from_dir(dir.path()).unwrap();
        let embedder = BertEmbedder::load(&assets, Device::Cpu).unwrap();
        let tokenizer = tiny_tokenizer(16);

        let batch = tokenizer
            .encode_batch(&["inflation rates rose", "policy"])
            .unwrap();
        let vectors = embedder.embed_batch(&batch).unwrap();

        assert_eq!(vectors.len(), 2);
        assert!(vectors.iter().all(|v| v.len() == TINY_HIDDEN));
        assert!(vectors.iter().flatten().all(|x| x.is_finite()));
    }

    #[test]
    fn test_embedding_ignores_padding() {
        let dir = tempfile::tempdir().unwrap();
        write_tiny_model(dir.path());
        let assets = ModelAssets::from_dir(dir.path()).unwrap();
        let embedder = BertEmbedder::load(&assets, Device::Cpu).unwrap();

        let short = tiny_tokenizer(16).encode_batch(&["policy"]).unwrap();
        let padded = tiny_tokenizer(16)
            .with_pad_to_max_length(true)
            .encode_batch(&["policy"])
            .unwrap();

        let a = embedder.embed_batch(&short).unwrap();
        let b = embedder.embed_batch(&padded).unwrap();
        for (x, y) in a[0].iter().zip(&b[0]) {
            assert!((x - y).abs() < 1e-4, "{} vs {}", x, y);
        }
    }

    #[test]
    fn test_empty_batch() {
        let dir = tempfile::tempdir().unwrap();
        write_tiny_model(dir.path());
        let assets = ModelAssets::from_dir(dir.path()).unwrap();
        let embedder = BertEmbedder::load(&assets, Device::Cpu).unwrap();

        let batch = tiny_tokenizer(16).encode_batch(&[]).unwrap();
        assert!(embedder.embed_batch(&batch).unwrap().is_empty());
    }
}
