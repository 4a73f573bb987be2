//! Classifier training, evaluation, persistence and prediction.

use super::data::{batch_examples, example_vectors, pad_batch, stratified_split, DataSplit};
use super::model::SequenceClassifier;
use super::report::ClassificationReport;
use crate::config::ClassifierConfig;
use crate::dataset::{persist_atomically, Embedding, TrainingExample, VolatilityLabel};
use crate::error::{DatasetError, TrainingError};
use crate::processing::EpochProgress;
use candle_core::{DType, Device, D};
use candle_nn::{ops::softmax, Optimizer, VarBuilder, VarMap};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::{debug, info};

pub const CLASSIFIER_WEIGHTS_FILE: &str = "classifier.safetensors";
pub const CLASSIFIER_CONFIG_FILE: &str = "classifier_config.json";

/// Shape of a saved classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierMetadata {
    pub input_dim: usize,
    pub hidden_size: usize,
}

/// A predicted label with class probabilities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub label: VolatilityLabel,
    /// Softmax probabilities indexed by class index
    pub probabilities: [f32; 2],
}

/// A trained classifier that can be saved, reloaded and used for prediction.
pub struct TrainedClassifier {
    varmap: VarMap,
    model: SequenceClassifier,
    device: Device,
}

impl TrainedClassifier {
    fn build(
        metadata: ClassifierMetadata,
        device: &Device,
    ) -> Result<(VarMap, SequenceClassifier), TrainingError> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let model = SequenceClassifier::new(vb, metadata.input_dim, metadata.hidden_size)?;
        Ok((varmap, model))
    }

    pub fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            input_dim: self.model.input_dim(),
            hidden_size: self.model.hidden_size(),
        }
    }

    /// Writes weights and metadata to `dir`, each atomically.
    pub fn save(&self, dir: &Path) -> Result<(), TrainingError> {
        persist_atomically(&dir.join(CLASSIFIER_WEIGHTS_FILE), |tmp| {
            self.varmap
                .save(tmp)
                .map_err(|e| TrainingError::Checkpoint(format!("Failed to save classifier: {}", e)))
        })?;
        let metadata = self.metadata();
        persist_atomically(&dir.join(CLASSIFIER_CONFIG_FILE), |tmp| {
            let file = File::create(tmp).map_err(|e| DatasetError::io(tmp, e))?;
            serde_json::to_writer_pretty(BufWriter::new(file), &metadata)
                .map_err(DatasetError::from)?;
            Ok::<(), TrainingError>(())
        })?;
        info!("Saved classifier to {}", dir.display());
        Ok(())
    }

    /// Loads a classifier saved by [`TrainedClassifier::save`].
    pub fn load(dir: &Path, device: Device) -> Result<Self, TrainingError> {
        let config_path = dir.join(CLASSIFIER_CONFIG_FILE);
        let file = File::open(&config_path).map_err(|e| DatasetError::io(&config_path, e))?;
        let metadata: ClassifierMetadata =
            serde_json::from_reader(BufReader::new(file)).map_err(DatasetError::from)?;

        let (mut varmap, model) = Self::build(metadata, &device)?;
        let weights_path = dir.join(CLASSIFIER_WEIGHTS_FILE);
        varmap.load(&weights_path).map_err(|e| {
            TrainingError::Checkpoint(format!("Failed to load {}: {}", weights_path.display(), e))
        })?;

        Ok(Self {
            varmap,
            model,
            device,
        })
    }

    /// Predicts the label of one speech from its chunk embeddings in order.
    pub fn predict(&self, embeddings: &[Embedding]) -> Result<Prediction, TrainingError> {
        let vectors: Vec<Vec<f32>> = embeddings.iter().map(|e| e.vector.clone()).collect();
        let mut predictions = self.predict_sequences(&[vectors.as_slice()])?;
        predictions
            .pop()
            .ok_or_else(|| TrainingError::InvalidData("No prediction produced".to_string()))
    }

    /// Predicts labels for several sequences at once.
    pub fn predict_sequences(
        &self,
        sequences: &[&[Vec<f32>]],
    ) -> Result<Vec<Prediction>, TrainingError> {
        if sequences.is_empty() {
            return Ok(vec![]);
        }
        // Labels are unused for inference
        let placeholder = vec![VolatilityLabel::Negative; sequences.len()];
        let batch = pad_batch(sequences, &placeholder, self.model.input_dim(), &self.device)?;

        let logits = self.model.forward(&batch.inputs, &batch.last_step)?;
        let probabilities: Vec<Vec<f32>> = softmax(&logits, D::Minus1)?.to_vec2()?;

        Ok(probabilities
            .into_iter()
            .map(|p| {
                let label = if p[1] > p[0] {
                    VolatilityLabel::Positive
                } else {
                    VolatilityLabel::Negative
                };
                Prediction {
                    label,
                    probabilities: [p[0], p[1]],
                }
            })
            .collect())
    }

    fn predict_examples(
        &self,
        examples: &[TrainingExample],
        indices: &[usize],
        batch_size: usize,
    ) -> Result<Vec<VolatilityLabel>, TrainingError> {
        let mut labels = Vec::with_capacity(indices.len());
        for chunk in indices.chunks(batch_size) {
            let vectors: Vec<Vec<Vec<f32>>> = chunk
                .iter()
                .map(|&i| example_vectors(&examples[i]))
                .collect();
            let sequences: Vec<&[Vec<f32>]> = vectors.iter().map(|v| v.as_slice()).collect();
            labels.extend(self.predict_sequences(&sequences)?.into_iter().map(|p| p.label));
        }
        Ok(labels)
    }
}

/// Result of a training run.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    /// Mean cross-entropy of each epoch
    pub epoch_losses: Vec<f64>,
    pub split: DataSplit,
    pub report: ClassificationReport,
}

/// Trains the LSTM classifier on speech-level examples.
///
/// # Examples
///
/// ```ignore
/// let trainer = ClassifierTrainer::new(ClassifierConfig::default(), select_device())?;
/// let (classifier, outcome) = trainer.train(&examples, |_| {})?;
/// println!("{}", outcome.report);
/// classifier.save(Path::new("models/classifier"))?;
/// ```
pub struct ClassifierTrainer {
    config: ClassifierConfig,
    device: Device,
}

impl ClassifierTrainer {
    pub fn new(config: ClassifierConfig, device: Device) -> Result<Self, TrainingError> {
        if config.epochs == 0 || config.batch_size == 0 || config.hidden_size == 0 {
            return Err(TrainingError::InvalidConfig(
                "epochs, batch_size and hidden_size must be positive".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&config.test_ratio) {
            return Err(TrainingError::InvalidConfig(format!(
                "test_ratio must be in [0, 1), got {}",
                config.test_ratio
            )));
        }
        Ok(Self { config, device })
    }

    /// Splits, trains for the configured epochs and evaluates on the
    /// held-out split.
    ///
    /// # Errors
    ///
    /// Returns `TrainingError::InvalidData` if there are no examples, a
    /// sequence is empty, dimensions disagree, or a side of the split is
    /// empty.
    pub fn train<F>(
        &self,
        examples: &[TrainingExample],
        mut on_progress: F,
    ) -> Result<(TrainedClassifier, TrainingOutcome), TrainingError>
    where
        F: FnMut(&EpochProgress),
    {
        let input_dim = validate_examples(examples)?;
        let labels: Vec<VolatilityLabel> = examples.iter().map(|e| e.label).collect();
        let split = stratified_split(&labels, self.config.test_ratio, self.config.seed);
        if split.train.is_empty() || split.test.is_empty() {
            return Err(TrainingError::InvalidData(format!(
                "Split of {} examples left train={} test={}",
                examples.len(),
                split.train.len(),
                split.test.len()
            )));
        }

        let metadata = ClassifierMetadata {
            input_dim,
            hidden_size: self.config.hidden_size,
        };
        let (varmap, model) = TrainedClassifier::build(metadata, &self.device)?;
        let mut optimizer = candle_nn::AdamW::new(
            varmap.all_vars(),
            candle_nn::ParamsAdamW {
                lr: self.config.learning_rate,
                weight_decay: self.config.weight_decay,
                ..Default::default()
            },
        )?;

        info!(
            "Training LSTM: {} train / {} test speeches, {}d input, {} hidden, {} epochs",
            split.train.len(),
            split.test.len(),
            input_dim,
            self.config.hidden_size,
            self.config.epochs
        );

        let mut order = split.train.clone();
        let batches_total = order.len().div_ceil(self.config.batch_size);
        let mut epoch_losses = Vec::with_capacity(self.config.epochs);
        for epoch in 0..self.config.epochs {
            let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed.wrapping_add(epoch as u64));
            order.shuffle(&mut rng);

            let mut loss_sum = 0.0;
            for (batch_index, indices) in order.chunks(self.config.batch_size).enumerate() {
                let batch = batch_examples(examples, indices, input_dim, &self.device)?;
                let logits = model.forward(&batch.inputs, &batch.last_step)?;
                let loss = candle_nn::loss::cross_entropy(&logits, &batch.labels)?;
                optimizer.backward_step(&loss)?;

                loss_sum += loss.to_scalar::<f32>()? as f64;
                on_progress(&EpochProgress {
                    epoch: epoch + 1,
                    total_epochs: self.config.epochs,
                    batches_completed: batch_index + 1,
                    batches_total,
                    mean_loss: loss_sum / (batch_index + 1) as f64,
                });
            }
            let mean = loss_sum / batches_total as f64;
            info!("Epoch {}/{}: mean loss {:.4}", epoch + 1, self.config.epochs, mean);
            epoch_losses.push(mean);
        }

        let classifier = TrainedClassifier {
            varmap,
            model,
            device: self.device.clone(),
        };

        let predicted = classifier.predict_examples(examples, &split.test, self.config.batch_size)?;
        let actual: Vec<VolatilityLabel> = split.test.iter().map(|&i| labels[i]).collect();
        let train_labels: Vec<VolatilityLabel> = split.train.iter().map(|&i| labels[i]).collect();
        let report = ClassificationReport::new(&actual, &predicted, &train_labels);
        info!(
            "Held-out accuracy {:.4} (stratified baseline {:.4}, majority {:.4})",
            report.accuracy, report.stratified_baseline, report.majority_baseline
        );
        debug!("Confusion matrix {:?}", report.confusion);

        Ok((
            classifier,
            TrainingOutcome {
                epoch_losses,
                split,
                report,
            },
        ))
    }
}

/// Checks that examples are non-empty and share one dimension; returns it.
fn validate_examples(examples: &[TrainingExample]) -> Result<usize, TrainingError> {
    let first = examples
        .first()
        .ok_or_else(|| TrainingError::InvalidData("No training examples".to_string()))?;
    let dim = first.dimension();
    for example in examples {
        if example.sequence_len() == 0 {
            return Err(TrainingError::InvalidData(format!(
                "Speech {} has no embeddings",
                example.speech_id
            )));
        }
        if let Some(bad) = example.embeddings.iter().find(|e| e.dimension() != dim) {
            return Err(TrainingError::InvalidData(format!(
                "Embedding {} has dimension {}, expected {}",
                bad.chunk_id,
                bad.dimension(),
                dim
            )));
        }
    }
    if dim == 0 {
        return Err(TrainingError::InvalidData(
            "Embeddings have dimension 0".to_string(),
        ));
    }
    Ok(dim)
}
