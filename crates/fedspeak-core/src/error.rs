//! Error types for fedspeak-core.
//!
//! This module defines one error enum per pipeline concern: scraping,
//! chunking, volatility labeling, dataset I/O, embedding, processing and
//! training.
//! Scraping and labeling errors are recoverable (the item is skipped and
//! logged); training errors caused by the accelerator are fatal.

use thiserror::Error;

/// Errors that can occur while fetching or parsing web pages.
#[derive(Debug, Clone, Error)]
pub enum ScrapeError {
    /// URL could not be parsed or uses an unsupported scheme
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// HTTP request failed (network error, timeout, non-success status)
    #[error("Request failed: {0}")]
    RequestFailed(String),
    /// Page was fetched but did not have the expected structure
    #[error("Parse error: {0}")]
    ParseError(String),
    /// Speech date could not be derived from the page URL
    #[error("Invalid speech date: {0}")]
    InvalidDate(String),
}

/// Errors that can occur during text chunking.
#[derive(Debug, Clone, Error)]
pub enum ChunkingError {
    /// Invalid chunking configuration
    #[error("Invalid chunking config: {0}")]
    InvalidConfig(String),
}

/// Errors that can occur while deriving a volatility label for a speech.
///
/// Any of these excludes the speech from the labeled dataset.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LabelError {
    /// No observation at or shortly before the publication date
    #[error("No volatility observation at or before {0}")]
    MissingObservation(String),
    /// No observation far enough after the publication date
    #[error("No volatility observation {horizon} trading day(s) after {date}")]
    MissingFollowUp {
        /// Publication date (ISO format)
        date: String,
        /// Number of trading observations looked ahead
        horizon: usize,
    },
    /// Observation exists but is NaN or infinite
    #[error("Malformed volatility value on {0}")]
    MalformedValue(String),
    /// Change was exactly zero and the policy excludes such speeches
    #[error("Zero volatility change on {0}")]
    ZeroChange(String),
}

/// Errors that can occur while reading or writing tabular artifacts.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// Underlying file I/O failed
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File being accessed
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
    /// CSV encoding or decoding failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    /// JSON encoding or decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Header or row violates the expected schema
    #[error("Schema violation: {0}")]
    Schema(String),
    /// Rows are individually valid but inconsistent with each other
    #[error("Inconsistent dataset: {0}")]
    Inconsistent(String),
    /// Tensor file could not be encoded or decoded
    #[error("Tensor file error: {0}")]
    Tensor(String),
}

impl DatasetError {
    /// Wraps an I/O error with the path that caused it.
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        DatasetError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

/// Errors that can occur during embedding operations.
#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    /// Failed to load model weights or config
    #[error("Failed to load model: {0}")]
    ModelLoad(String),
    /// Failed to create tensor during inference
    #[error("Failed to create tensor: {0}")]
    TensorCreation(String),
    /// Forward pass through the model failed
    #[error("Inference failed: {0}")]
    InferenceFailed(String),
    /// Failed to tokenize text
    #[error("Tokenization failed: {0}")]
    TokenizationFailed(String),
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    /// Tokenizer not available or initialization failed
    #[error("Tokenizer unavailable: {0}")]
    TokenizerUnavailable(String),
    /// Produced vector does not have the model's hidden size
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Model hidden size
        expected: usize,
        /// Observed vector length
        actual: usize,
    },
}

/// Errors that can occur while fine-tuning or training models.
#[derive(Debug, Error)]
pub enum TrainingError {
    /// A GPU was required but none could be initialised
    #[error("Accelerator unavailable: {0}")]
    AcceleratorUnavailable(String),
    /// Device ran out of memory
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),
    /// Tensor operation failed
    #[error("Tensor operation failed: {0}")]
    Tensor(String),
    /// Training data is unusable (empty, single class, wrong dimensions)
    #[error("Invalid training data: {0}")]
    InvalidData(String),
    /// Invalid training configuration
    #[error("Invalid training config: {0}")]
    InvalidConfig(String),
    /// Persisting or loading weights failed
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),
    /// Model or tokenizer setup failed
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    /// Dataset I/O failed
    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

/// Errors from the embedding stage and from grouping embeddings into
/// per-speech training examples.
#[derive(Debug, Clone, Error)]
pub enum ProcessingError {
    /// Tokenization or inference failed
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    /// The tokenizer allows longer inputs than the model has positions
    #[error("Tokenizer max length {max_length} exceeds the model's {max_positions} positions")]
    LengthExceedsModel {
        /// Configured tokenizer limit
        max_length: usize,
        /// Model position embeddings
        max_positions: usize,
    },
    /// The embedder returned a different number of vectors than inputs
    #[error("Expected {expected} embeddings, got {actual}")]
    CountMismatch {
        /// Inputs in the batch
        expected: usize,
        /// Vectors returned
        actual: usize,
    },
    /// No label is known for a speech that has embeddings
    #[error("No label for speech {0}")]
    MissingLabel(String),
    /// A speech's chunk indices are not `0..n`
    #[error("Speech {speech_id} is missing chunk {expected} (found {found})")]
    ChunkGap {
        /// Speech whose sequence is broken
        speech_id: String,
        /// First index not present
        expected: usize,
        /// Index found in its place
        found: usize,
    },
    /// Two chunks of one speech carry different labels
    #[error("Speech {0} has chunks with different labels")]
    ConflictingLabels(String),
}

impl From<candle_core::Error> for TrainingError {
    fn from(err: candle_core::Error) -> Self {
        let message = err.to_string();
        let lowered = message.to_lowercase();
        if lowered.contains("out of memory") || lowered.contains("out_of_memory") {
            TrainingError::ResourceExhausted(message)
        } else {
            TrainingError::Tensor(message)
        }
    }
}

// Conversion implementations for error chaining

impl From<EmbeddingError> for String {
    fn from(err: EmbeddingError) -> String {
        err.to_string()
    }
}

impl From<candle_core::Error> for EmbeddingError {
    fn from(err: candle_core::Error) -> Self {
        EmbeddingError::InferenceFailed(err.to_string())
    }
}

impl From<candle_core::Error> for DatasetError {
    fn from(err: candle_core::Error) -> Self {
        DatasetError::Tensor(err.to_string())
    }
}

impl From<ChunkingError> for DatasetError {
    fn from(err: ChunkingError) -> Self {
        DatasetError::Schema(err.to_string())
    }
}
