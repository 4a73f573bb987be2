//! Masked-language-model input corruption.

use crate::embedding::SpecialTokens;
use crate::error::TrainingError;
use rand::seq::SliceRandom;
use rand::Rng;

/// A block with some positions corrupted and their original ids recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskedBlock {
    pub input_ids: Vec<u32>,
    /// `(position, original id)` of every selected position, ascending
    pub targets: Vec<(usize, u32)>,
}

/// Selects and corrupts positions following the BERT recipe.
///
/// Each non-special position is selected with `probability`. A selected
/// position becomes `[MASK]` 80% of the time, a random non-special token 10%
/// of the time and stays unchanged otherwise. At least one position is
/// selected in every block that has a non-special token.
#[derive(Debug, Clone)]
pub struct Masker {
    special: SpecialTokens,
    replacement_ids: Vec<u32>,
    probability: f64,
}

impl Masker {
    /// # Errors
    ///
    /// Returns `TrainingError::InvalidConfig` if `probability` is outside
    /// `(0, 1]` or the vocabulary has no ordinary tokens.
    pub fn new(
        special: SpecialTokens,
        vocab_size: usize,
        probability: f64,
    ) -> Result<Self, TrainingError> {
        if !(probability > 0.0 && probability <= 1.0) {
            return Err(TrainingError::InvalidConfig(format!(
                "mask_probability must be in (0, 1], got {}",
                probability
            )));
        }
        let replacement_ids: Vec<u32> = (0..vocab_size as u32)
            .filter(|id| !special.contains(*id))
            .collect();
        if replacement_ids.is_empty() {
            return Err(TrainingError::InvalidConfig(
                "Vocabulary has no ordinary tokens".to_string(),
            ));
        }
        Ok(Self {
            special,
            replacement_ids,
            probability,
        })
    }

    pub fn mask<R: Rng + ?Sized>(&self, block: &[u32], rng: &mut R) -> MaskedBlock {
        let candidates: Vec<usize> = block
            .iter()
            .enumerate()
            .filter(|(_, id)| !self.special.contains(**id))
            .map(|(pos, _)| pos)
            .collect();

        let mut selected: Vec<usize> = candidates
            .iter()
            .copied()
            .filter(|_| rng.gen_bool(self.probability))
            .collect();
        if selected.is_empty() {
            if let Some(&pos) = candidates.choose(rng) {
                selected.push(pos);
            }
        }

        let mut input_ids = block.to_vec();
        let mut targets = Vec::with_capacity(selected.len());
        for pos in selected {
            targets.push((pos, block[pos]));
            let roll: f64 = rng.gen();
            if roll < 0.8 {
                input_ids[pos] = self.special.mask;
            } else if roll < 0.9 {
                if let Some(&id) = self.replacement_ids.choose(rng) {
                    input_ids[pos] = id;
                }
            }
        }

        MaskedBlock { input_ids, targets }
    }
}
