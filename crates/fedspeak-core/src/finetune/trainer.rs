//! Masked-language-model fine-tuning loop.

use super::corpus::{build_blocks, tokenize_corpus};
use super::masking::{MaskedBlock, Masker};
use super::model::{load_checkpoint, MaskedLmModel};
use crate::config::FineTuneConfig;
use crate::dataset::persist_atomically;
use crate::embedding::assets::{ModelAssets, CONFIG_FILE, TOKENIZER_FILE, WEIGHTS_FILE};
use crate::embedding::{select_accelerator, select_device, TokenizerHandle};
use crate::error::{DatasetError, TrainingError};
use crate::processing::EpochProgress;
use candle_core::{DType, Device, Tensor};
use candle_nn::{Optimizer, VarBuilder, VarMap};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Result of a completed fine-tuning run.
#[derive(Debug, Clone)]
pub struct FineTuneOutcome {
    /// Mean MLM loss of each epoch
    pub epoch_losses: Vec<f64>,
    /// Number of training blocks per epoch
    pub blocks: usize,
    /// Parameters that started from fresh initial values
    pub initialised: Vec<String>,
    pub output_dir: PathBuf,
}

/// Fine-tunes a BERT checkpoint on a text corpus with the MLM objective.
///
/// # Examples
///
/// ```ignore
/// let tuner = MlmFineTuner::new(FineTuneConfig::default())?;
/// let outcome = tuner.fine_tune(&assets, &corpus, Path::new("models/fedspeak-bert"), |p| {
///     println!("epoch {} loss {:.3}", p.epoch, p.mean_loss);
/// })?;
/// ```
pub struct MlmFineTuner {
    config: FineTuneConfig,
    device: Device,
}

impl MlmFineTuner {
    /// Validates the configuration and selects a device.
    ///
    /// # Errors
    ///
    /// Returns `TrainingError::AcceleratorUnavailable` when
    /// `require_accelerator` is set and no GPU can be initialised.
    pub fn new(config: FineTuneConfig) -> Result<Self, TrainingError> {
        let device = if config.require_accelerator {
            select_accelerator().ok_or_else(|| {
                TrainingError::AcceleratorUnavailable(
                    "No CUDA or Metal device could be initialised".to_string(),
                )
            })?
        } else {
            select_device()
        };
        Self::with_device(config, device)
    }

    /// Uses an explicit device.
    pub fn with_device(config: FineTuneConfig, device: Device) -> Result<Self, TrainingError> {
        if config.epochs == 0 || config.batch_size == 0 {
            return Err(TrainingError::InvalidConfig(
                "epochs and batch_size must be positive".to_string(),
            ));
        }
        if !(config.learning_rate > 0.0) {
            return Err(TrainingError::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                config.learning_rate
            )));
        }
        Ok(Self { config, device })
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Runs the full epoch loop and writes the model to `output_dir`.
    ///
    /// Nothing is written until every epoch has finished; the weights,
    /// config and tokenizer are then each replaced atomically.
    ///
    /// # Arguments
    ///
    /// * `assets` - Pretrained checkpoint to start from
    /// * `corpus` - Training paragraphs
    /// * `output_dir` - Destination directory for the fine-tuned model
    /// * `on_progress` - Called after every batch
    pub fn fine_tune<F>(
        &self,
        assets: &ModelAssets,
        corpus: &[String],
        output_dir: &Path,
        mut on_progress: F,
    ) -> Result<FineTuneOutcome, TrainingError>
    where
        F: FnMut(&EpochProgress),
    {
        let bert_config = assets.load_config()?;
        if self.config.block_size > bert_config.max_position_embeddings {
            return Err(TrainingError::InvalidConfig(format!(
                "block_size {} exceeds the model's {} positions",
                self.config.block_size, bert_config.max_position_embeddings
            )));
        }

        let tokenizer = TokenizerHandle::from_file(&assets.tokenizer_path, self.config.block_size)?;
        let special = tokenizer.special_tokens()?;
        let tokens = tokenize_corpus(&tokenizer, corpus)?;
        let blocks = build_blocks(
            &tokens,
            &special,
            self.config.block_size,
            self.config.min_block_tokens,
        )?;
        let masker = Masker::new(special, bert_config.vocab_size, self.config.mask_probability)?;
        info!(
            "Fine-tuning on {} blocks of up to {} tokens for {} epochs",
            blocks.len(),
            self.config.block_size,
            self.config.epochs
        );

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &self.device);
        let model = MaskedLmModel::new(vb, &bert_config)?;
        let checkpoint = load_checkpoint(&varmap, &assets.weights_path, &self.device)?;

        let mut optimizer = candle_nn::AdamW::new(
            varmap.all_vars(),
            candle_nn::ParamsAdamW {
                lr: self.config.learning_rate,
                weight_decay: self.config.weight_decay,
                ..Default::default()
            },
        )?;

        let mut order: Vec<usize> = (0..blocks.len()).collect();
        let batches_total = blocks.len().div_ceil(self.config.batch_size);
        let mut epoch_losses = Vec::with_capacity(self.config.epochs);

        for epoch in 0..self.config.epochs {
            let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed.wrapping_add(epoch as u64));
            order.shuffle(&mut rng);

            let mut loss_sum = 0.0;
            for (batch_index, indices) in order.chunks(self.config.batch_size).enumerate() {
                let masked: Vec<MaskedBlock> = indices
                    .iter()
                    .map(|&i| masker.mask(&blocks[i], &mut rng))
                    .collect();
                let loss = self.train_step(&model, &mut optimizer, &masked, special.pad)?;
                loss_sum += loss;

                on_progress(&EpochProgress {
                    epoch: epoch + 1,
                    total_epochs: self.config.epochs,
                    batches_completed: batch_index + 1,
                    batches_total,
                    mean_loss: loss_sum / (batch_index + 1) as f64,
                });
            }

            let mean = loss_sum / batches_total as f64;
            info!(
                "Epoch {}/{}: mean MLM loss {:.4}",
                epoch + 1,
                self.config.epochs,
                mean
            );
            epoch_losses.push(mean);
        }

        save_model(&varmap, assets, output_dir)?;

        Ok(FineTuneOutcome {
            epoch_losses,
            blocks: blocks.len(),
            initialised: checkpoint.initialised,
            output_dir: output_dir.to_path_buf(),
        })
    }

    fn train_step(
        &self,
        model: &MaskedLmModel,
        optimizer: &mut candle_nn::AdamW,
        batch: &[MaskedBlock],
        pad_id: u32,
    ) -> Result<f64, TrainingError> {
        let seq_len = batch.iter().map(|b| b.input_ids.len()).max().unwrap_or(0);
        let rows = batch.len();

        let mut ids = Vec::with_capacity(rows * seq_len);
        let mut mask = Vec::with_capacity(rows * seq_len);
        let mut selected = Vec::new();
        let mut targets = Vec::new();
        for (row, block) in batch.iter().enumerate() {
            let padding = seq_len - block.input_ids.len();
            ids.extend_from_slice(&block.input_ids);
            ids.extend(std::iter::repeat(pad_id).take(padding));
            mask.extend(std::iter::repeat(1u32).take(block.input_ids.len()));
            mask.extend(std::iter::repeat(0u32).take(padding));
            for &(pos, original) in &block.targets {
                selected.push((row * seq_len + pos) as u32);
                targets.push(original);
            }
        }
        if selected.is_empty() {
            return Err(TrainingError::InvalidData(
                "Batch has no maskable tokens".to_string(),
            ));
        }

        let ids = Tensor::from_vec(ids, (rows, seq_len), &self.device)?;
        let type_ids = ids.zeros_like()?;
        let mask = Tensor::from_vec(mask, (rows, seq_len), &self.device)?;

        let logits = model.forward(&ids, &type_ids, &mask)?;
        let (b, l, v) = logits.dims3()?;
        let picked = logits
            .reshape((b * l, v))?
            .index_select(&Tensor::new(selected.as_slice(), &self.device)?, 0)?;
        let targets = Tensor::new(targets.as_slice(), &self.device)?;

        let loss = candle_nn::loss::cross_entropy(&picked, &targets)?;
        optimizer.backward_step(&loss)?;

        let value = loss.to_scalar::<f32>()? as f64;
        if !value.is_finite() {
            return Err(TrainingError::InvalidData(format!(
                "MLM loss is not finite ({})",
                value
            )));
        }
        debug!("MLM batch loss {:.4}", value);
        Ok(value)
    }
}

/// Writes weights, config and tokenizer to `output_dir`, each atomically.
fn save_model(
    varmap: &VarMap,
    assets: &ModelAssets,
    output_dir: &Path,
) -> Result<(), TrainingError> {
    persist_atomically(&output_dir.join(WEIGHTS_FILE), |tmp| {
        varmap
            .save(tmp)
            .map_err(|e| TrainingError::Checkpoint(format!("Failed to save weights: {}", e)))
    })?;
    for (source, name) in [
        (&assets.config_path, CONFIG_FILE),
        (&assets.tokenizer_path, TOKENIZER_FILE),
    ] {
        persist_atomically(&output_dir.join(name), |tmp| {
            std::fs::copy(source, tmp)
                .map(|_| ())
                .map_err(|e| TrainingError::from(DatasetError::io(source, e)))
        })?;
    }
    info!("Saved fine-tuned model to {}", output_dir.display());
    Ok(())
}
