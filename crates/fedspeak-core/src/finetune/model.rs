//! BERT with a masked-language-model head.
//!
//! Parameter names follow the Hugging Face `BertForMaskedLM` checkpoint
//! layout: the encoder under `bert.*` and the head under `cls.predictions.*`.
//! The decoder shares its weight matrix with the word embeddings.

use crate::error::TrainingError;
use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{layer_norm, linear, Init, LayerNorm, Linear, VarBuilder, VarMap};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use std::path::Path;
use tracing::{info, warn};

const WORD_EMBEDDINGS: &str = "bert.embeddings.word_embeddings.weight";

/// Encoder plus prediction head, built over a trainable `VarMap`.
pub struct MaskedLmModel {
    bert: BertModel,
    transform: Linear,
    transform_norm: LayerNorm,
    decoder_weight: Tensor,
    decoder_bias: Tensor,
}

impl MaskedLmModel {
    /// Creates (or reuses) every parameter in the variable map behind `vb`.
    pub fn new(vb: VarBuilder, config: &BertConfig) -> candle_core::Result<Self> {
        let hidden = config.hidden_size;
        let bert = BertModel::load(vb.pp("bert"), config)?;

        let head = vb.pp("cls").pp("predictions");
        let transform = linear(hidden, hidden, head.pp("transform").pp("dense"))?;
        let transform_norm = layer_norm(
            hidden,
            config.layer_norm_eps,
            head.pp("transform").pp("LayerNorm"),
        )?;
        let decoder_weight = vb.get((config.vocab_size, hidden), WORD_EMBEDDINGS)?;
        let decoder_bias = head.get_with_hints(config.vocab_size, "bias", Init::Const(0.))?;

        Ok(Self {
            bert,
            transform,
            transform_norm,
            decoder_weight,
            decoder_bias,
        })
    }

    /// Returns vocabulary logits `[batch, seq_len, vocab_size]`.
    pub fn forward(
        &self,
        input_ids: &Tensor,
        type_ids: &Tensor,
        attention_mask: &Tensor,
    ) -> candle_core::Result<Tensor> {
        let hidden = self.bert.forward(input_ids, type_ids, Some(attention_mask))?;
        let x = self.transform.forward(&hidden)?.gelu_erf()?;
        let x = self.transform_norm.forward(&x)?;
        x.broadcast_matmul(&self.decoder_weight.t()?)?
            .broadcast_add(&self.decoder_bias)
    }
}

/// Outcome of copying checkpoint tensors into a variable map.
#[derive(Debug, Clone, Default)]
pub struct CheckpointLoad {
    pub loaded: usize,
    /// Variables with no counterpart in the checkpoint, left at their
    /// initial values
    pub initialised: Vec<String>,
}

/// Names a variable may carry in a checkpoint.
///
/// Older BERT checkpoints store LayerNorm parameters as `gamma`/`beta`, and
/// bare encoder checkpoints omit the `bert.` prefix.
fn checkpoint_names(name: &str) -> Vec<String> {
    let mut bases = vec![name.to_string()];
    if let Some(stripped) = name.strip_prefix("bert.") {
        bases.push(stripped.to_string());
    }

    let mut names = Vec::new();
    for base in bases {
        if let Some(prefix) = base.strip_suffix("LayerNorm.weight") {
            names.push(format!("{prefix}LayerNorm.gamma"));
        } else if let Some(prefix) = base.strip_suffix("LayerNorm.bias") {
            names.push(format!("{prefix}LayerNorm.beta"));
        }
        names.push(base);
    }
    names
}

/// Overwrites the variables in `varmap` with tensors from a safetensors file.
///
/// # Errors
///
/// Returns `TrainingError::Checkpoint` if a tensor has the wrong shape or no
/// variable could be loaded at all.
pub fn load_checkpoint(
    varmap: &VarMap,
    weights_path: &Path,
    device: &Device,
) -> Result<CheckpointLoad, TrainingError> {
    let tensors = candle_core::safetensors::load(weights_path, device).map_err(|e| {
        TrainingError::Checkpoint(format!("Failed to read {}: {}", weights_path.display(), e))
    })?;

    let data = varmap
        .data()
        .lock()
        .map_err(|_| TrainingError::Checkpoint("Variable map lock poisoned".to_string()))?;
    let mut names: Vec<&String> = data.keys().collect();
    names.sort();

    let mut outcome = CheckpointLoad::default();
    for name in names {
        let var = &data[name];
        let source = checkpoint_names(name)
            .into_iter()
            .find_map(|candidate| tensors.get(&candidate));
        match source {
            Some(tensor) if tensor.shape() == var.shape() => {
                var.set(&tensor.to_dtype(DType::F32)?)?;
                outcome.loaded += 1;
            }
            Some(tensor) => {
                return Err(TrainingError::Checkpoint(format!(
                    "{}: checkpoint shape {:?}, model shape {:?}",
                    name,
                    tensor.dims(),
                    var.dims()
                )));
            }
            None => outcome.initialised.push(name.clone()),
        }
    }

    if outcome.loaded == 0 {
        return Err(TrainingError::Checkpoint(format!(
            "No parameters of {} match the model",
            weights_path.display()
        )));
    }
    for name in &outcome.initialised {
        warn!("Parameter {} not in checkpoint, using initial values", name);
    }
    info!(
        "Loaded {} parameters from {}",
        outcome.loaded,
        weights_path.display()
    );
    Ok(outcome)
}
