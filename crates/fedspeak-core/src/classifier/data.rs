//! Stratified splitting and padded batching of embedding sequences.

use crate::dataset::{TrainingExample, VolatilityLabel};
use crate::error::TrainingError;
use candle_core::{Device, Tensor};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

/// Train/test partition, as indices into the example list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Perform stratified train/test split preserving class ratios.
///
/// Within each class the indices are shuffled with a seeded RNG and the
/// first `round(len * test_ratio)` go to the test set. Both sides are
/// returned in ascending index order.
pub fn stratified_split(labels: &[VolatilityLabel], test_ratio: f64, seed: u64) -> DataSplit {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    for class in VolatilityLabel::ALL {
        let mut members: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, label)| **label == class)
            .map(|(i, _)| i)
            .collect();
        members.shuffle(&mut rng);

        let held_out = (members.len() as f64 * test_ratio).round() as usize;
        test.extend_from_slice(&members[..held_out]);
        train.extend_from_slice(&members[held_out..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    info!("Split: train={} test={}", train.len(), test.len());
    DataSplit { train, test }
}

/// A padded batch of sequences.
pub struct SequenceBatch {
    /// `[batch, max_len, dim]`, zero-padded after each sequence's end
    pub inputs: Tensor,
    /// `[batch, max_len]` one-hot marking each sequence's last real step
    pub last_step: Tensor,
    /// `[batch]` class indices
    pub labels: Tensor,
}

/// Pads variable-length sequences into one batch.
///
/// # Errors
///
/// Returns `TrainingError::InvalidData` if a sequence is empty or its
/// vectors do not have length `dim`.
pub fn pad_batch(
    sequences: &[&[Vec<f32>]],
    labels: &[VolatilityLabel],
    dim: usize,
    device: &Device,
) -> Result<SequenceBatch, TrainingError> {
    let batch = sequences.len();
    let max_len = sequences.iter().map(|s| s.len()).max().unwrap_or(0);
    if batch == 0 || max_len == 0 {
        return Err(TrainingError::InvalidData("Empty batch".to_string()));
    }

    let mut inputs = vec![0f32; batch * max_len * dim];
    let mut last_step = vec![0f32; batch * max_len];
    for (row, sequence) in sequences.iter().enumerate() {
        if sequence.is_empty() {
            return Err(TrainingError::InvalidData(format!(
                "Sequence {} has no embeddings",
                row
            )));
        }
        for (step, vector) in sequence.iter().enumerate() {
            if vector.len() != dim {
                return Err(TrainingError::InvalidData(format!(
                    "Embedding of length {} in a batch of dimension {}",
                    vector.len(),
                    dim
                )));
            }
            let offset = (row * max_len + step) * dim;
            inputs[offset..offset + dim].copy_from_slice(vector);
        }
        last_step[row * max_len + sequence.len() - 1] = 1.0;
    }

    let class_ids: Vec<u32> = labels.iter().map(|l| l.class_index()).collect();
    Ok(SequenceBatch {
        inputs: Tensor::from_vec(inputs, (batch, max_len, dim), device)?,
        last_step: Tensor::from_vec(last_step, (batch, max_len), device)?,
        labels: Tensor::new(class_ids.as_slice(), device)?,
    })
}

/// Collects the vectors of an example in chunk order.
pub fn example_vectors(example: &TrainingExample) -> Vec<Vec<f32>> {
    example
        .embeddings
        .iter()
        .map(|e| e.vector.clone())
        .collect()
}

/// Builds the padded batch for a subset of examples.
pub fn batch_examples(
    examples: &[TrainingExample],
    indices: &[usize],
    dim: usize,
    device: &Device,
) -> Result<SequenceBatch, TrainingError> {
    let vectors: Vec<Vec<Vec<f32>>> = indices
        .iter()
        .map(|&i| example_vectors(&examples[i]))
        .collect();
    let sequences: Vec<&[Vec<f32>]> = vectors.iter().map(|v| v.as_slice()).collect();
    let labels: Vec<VolatilityLabel> = indices.iter().map(|&i| examples[i].label).collect();
    pad_batch(&sequences, &labels, dim, device)
}
