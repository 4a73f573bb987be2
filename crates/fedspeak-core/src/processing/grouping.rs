//! Reassembly of chunk embeddings into per-speech sequences.

use crate::dataset::{Chunk, Embedding, TrainingExample, VolatilityLabel};
use crate::error::ProcessingError;
use std::collections::{BTreeMap, HashMap};

/// Collects the label of every speech from its chunks.
///
/// # Errors
///
/// Returns `ProcessingError::ConflictingLabels` if chunks of one speech
/// disagree.
pub fn speech_labels(chunks: &[Chunk]) -> Result<HashMap<String, VolatilityLabel>, ProcessingError> {
    let mut labels = HashMap::new();
    for chunk in chunks {
        match labels.get(&chunk.speech_id) {
            Some(label) if *label != chunk.label => {
                return Err(ProcessingError::ConflictingLabels(chunk.speech_id.clone()));
            }
            Some(_) => {}
            None => {
                labels.insert(chunk.speech_id.clone(), chunk.label);
            }
        }
    }
    Ok(labels)
}

/// Groups embeddings by speech and orders each group by chunk index.
///
/// Examples are returned sorted by speech id so the result does not depend
/// on input order.
///
/// # Errors
///
/// * `ProcessingError::ChunkGap` if a speech's indices are not exactly `0..n`
///   (a duplicate index counts as a gap)
/// * `ProcessingError::MissingLabel` if a speech has no entry in `labels`
pub fn group_embeddings(
    embeddings: Vec<Embedding>,
    labels: &HashMap<String, VolatilityLabel>,
) -> Result<Vec<TrainingExample>, ProcessingError> {
    let mut by_speech: BTreeMap<String, Vec<Embedding>> = BTreeMap::new();
    for embedding in embeddings {
        by_speech
            .entry(embedding.chunk_id.speech_id.clone())
            .or_default()
            .push(embedding);
    }

    let mut examples = Vec::with_capacity(by_speech.len());
    for (speech_id, mut group) in by_speech {
        group.sort_by_key(|e| e.chunk_id.sequence_index);
        for (expected, embedding) in group.iter().enumerate() {
            if embedding.chunk_id.sequence_index != expected {
                return Err(ProcessingError::ChunkGap {
                    speech_id,
                    expected,
                    found: embedding.chunk_id.sequence_index,
                });
            }
        }

        let label = *labels
            .get(&speech_id)
            .ok_or_else(|| ProcessingError::MissingLabel(speech_id.clone()))?;
        examples.push(TrainingExample {
            speech_id,
            embeddings: group,
            label,
        });
    }
    Ok(examples)
}
