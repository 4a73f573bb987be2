//! Production configuration.
//!
//! This module contains the constants that define the production pipeline
//! and the [`PipelineConfig`] object that carries them to each component.
//! Components never read ambient state: every stage receives the section of
//! the configuration it needs.
//!
//! # Usage
//!
//! ```
//! use fedspeak_core::config::{PipelineConfig, MAX_CHUNK_CHARS};
//!
//! let config = PipelineConfig::default();
//! assert_eq!(config.chunking.max_chars, MAX_CHUNK_CHARS);
//! ```

use crate::labeling::ZeroChangePolicy;
use crate::error::DatasetError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// =============================================================================
// Encoder Model Configuration
// =============================================================================

/// Hugging Face Hub id of the pretrained encoder that gets fine-tuned.
pub const DEFAULT_MODEL_ID: &str = "bert-base-uncased";

/// Embedding vector dimension (BERT-base hidden_size).
///
/// Must match the `hidden_size` in the model's `config.json`; the extractor
/// checks every vector against the loaded model rather than this constant.
pub const EMBEDDING_DIM: usize = 768;

/// Maximum encoder input length in tokens (BERT position embeddings).
pub const MAX_INPUT_TOKENS: usize = 512;

// =============================================================================
// Chunking Configuration
// =============================================================================

/// Maximum characters per speech chunk.
pub const MAX_CHUNK_CHARS: usize = 1000;

/// Characters shared between consecutive chunks.
pub const CHUNK_OVERLAP_CHARS: usize = 100;

// =============================================================================
// Training Configuration
// =============================================================================

/// Masked-language-model fine-tuning epochs.
pub const FINE_TUNE_EPOCHS: usize = 20;

/// LSTM classifier training epochs.
pub const CLASSIFIER_EPOCHS: usize = 10;

/// Fraction of non-special tokens selected for masking.
pub const MASK_PROBABILITY: f64 = 0.15;

// =============================================================================
// Scraping Configuration
// =============================================================================

/// Browser-like user agent; the dictionary site rejects default client agents.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3";

/// Investopedia financial term dictionary root page.
pub const DICTIONARY_URL: &str = "https://www.investopedia.com/financial-term-dictionary-4769738";

/// Federal Reserve speech archive root.
pub const SPEECH_ARCHIVE_URL: &str = "https://www.federalreserve.gov/newsevents/speech/";

/// Last year published with the legacy (table-based) archive layout.
pub const LEGACY_LAYOUT_LAST_YEAR: i32 = 2010;

/// HTTP settings shared by both scrapers.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FetchConfig {
    /// User-Agent header sent with every request
    pub user_agent: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Upper bound on in-flight requests
    pub max_concurrent_requests: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 30,
            max_concurrent_requests: 6,
        }
    }
}

/// Vocabulary corpus source.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CorpusConfig {
    /// Dictionary root page listing the letter pages
    pub dictionary_url: String,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            dictionary_url: DICTIONARY_URL.to_string(),
        }
    }
}

/// Speech archive source and year range (inclusive).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpeechArchiveConfig {
    /// Archive root, ending with a slash
    pub base_url: String,
    /// First year to scrape
    pub first_year: i32,
    /// Last year to scrape
    pub last_year: i32,
}

impl Default for SpeechArchiveConfig {
    fn default() -> Self {
        Self {
            base_url: SPEECH_ARCHIVE_URL.to_string(),
            first_year: 1996,
            last_year: 2023,
        }
    }
}

/// Chunk size bounds, in characters.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk
    pub max_chars: usize,
    /// Trailing characters repeated at the start of the next chunk
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: MAX_CHUNK_CHARS,
            overlap_chars: CHUNK_OVERLAP_CHARS,
        }
    }
}

/// Volatility label derivation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LabelingConfig {
    /// Trading observations between the "at" and "after" values
    pub horizon: usize,
    /// Calendar days to look back when the speech date is not a trading day
    pub max_lookback_days: i64,
    /// Resolution of an exactly-zero change
    pub zero_change: ZeroChangePolicy,
}

impl Default for LabelingConfig {
    fn default() -> Self {
        Self {
            horizon: 1,
            max_lookback_days: 5,
            zero_change: ZeroChangePolicy::Exclude,
        }
    }
}

/// Encoder model location and inference settings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Hub id used when `model_dir` is not set
    pub model_id: String,
    /// Local directory with `config.json`, `tokenizer.json`, `model.safetensors`
    pub model_dir: Option<PathBuf>,
    /// Maximum input tokens (truncation and padding length)
    pub max_length: usize,
    /// Pad every input to `max_length` instead of the batch's longest input
    pub pad_to_max_length: bool,
    /// Chunks per forward pass
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL_ID.to_string(),
            model_dir: None,
            max_length: MAX_INPUT_TOKENS,
            pad_to_max_length: true,
            batch_size: 16,
        }
    }
}

/// Masked-language-model fine-tuning hyperparameters.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FineTuneConfig {
    pub epochs: usize,
    /// Tokens per training span, including `[CLS]` and `[SEP]`
    pub block_size: usize,
    /// Shorter trailing spans are dropped unless they are the only span
    pub min_block_tokens: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub weight_decay: f64,
    pub mask_probability: f64,
    pub seed: u64,
    /// Fail instead of falling back to CPU when no GPU is present
    pub require_accelerator: bool,
}

impl Default for FineTuneConfig {
    fn default() -> Self {
        Self {
            epochs: FINE_TUNE_EPOCHS,
            block_size: 128,
            min_block_tokens: 16,
            batch_size: 8,
            learning_rate: 5e-5,
            weight_decay: 0.01,
            mask_probability: MASK_PROBABILITY,
            seed: 42,
            require_accelerator: false,
        }
    }
}

/// LSTM classifier hyperparameters.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClassifierConfig {
    pub epochs: usize,
    pub hidden_size: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub weight_decay: f64,
    /// Fraction of each class held out for the report
    pub test_ratio: f64,
    pub seed: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            epochs: CLASSIFIER_EPOCHS,
            hidden_size: 128,
            batch_size: 8,
            learning_rate: 1e-3,
            weight_decay: 1e-4,
            test_ratio: 0.2,
            seed: 42,
        }
    }
}

/// Complete pipeline configuration.
///
/// Every field has a production default, so a JSON file only needs to list
/// the values it overrides.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub fetch: FetchConfig,
    pub corpus: CorpusConfig,
    pub speeches: SpeechArchiveConfig,
    pub chunking: ChunkingConfig,
    pub labeling: LabelingConfig,
    pub embedding: EmbeddingConfig,
    pub fine_tune: FineTuneConfig,
    pub classifier: ClassifierConfig,
}

impl PipelineConfig {
    /// Loads a configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        let text = std::fs::read_to_string(path).map_err(|e| DatasetError::io(path, e))?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Writes the configuration as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), DatasetError> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text).map_err(|e| DatasetError::io(path, e))
    }
}
