//! Domain adaptation of the encoder by masked-language modeling.
//!
//! The vocabulary corpus is tokenized into fixed-size blocks, tokens are
//! masked following the BERT recipe, and the encoder plus a prediction head
//! are trained to recover them. Only the encoder is used downstream; the
//! head is saved alongside it in the `BertForMaskedLM` layout.

mod corpus;
mod masking;
mod model;
mod trainer;

pub use corpus::{build_blocks, tokenize_corpus};
pub use masking::{MaskedBlock, Masker};
pub use model::{load_checkpoint, CheckpointLoad, MaskedLmModel};
pub use trainer::{FineTuneOutcome, MlmFineTuner};
