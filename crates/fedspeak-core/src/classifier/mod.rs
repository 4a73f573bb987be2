//! Speech-level volatility classifier.
//!
//! Each speech is a variable-length sequence of chunk embeddings. A
//! single-direction LSTM reads the sequence and a linear head scores the two
//! labels from the hidden state after the last chunk. Evaluation uses a
//! stratified held-out split and reports accuracy against label-frequency
//! baselines.

mod data;
mod model;
mod report;
mod trainer;

pub use data::{batch_examples, pad_batch, stratified_split, DataSplit, SequenceBatch};
pub use model::{SequenceClassifier, NUM_CLASSES};
pub use report::{AveragedMetrics, ClassMetrics, ClassificationReport, LabelCounts};
pub use trainer::{
    ClassifierMetadata, ClassifierTrainer, Prediction, TrainedClassifier, TrainingOutcome,
    CLASSIFIER_CONFIG_FILE, CLASSIFIER_WEIGHTS_FILE,
};
