//! Model asset resolution.
//!
//! An encoder checkpoint is a directory with three files:
//! - `config.json` - BERT architecture
//! - `tokenizer.json` - HuggingFace tokenizer
//! - `model.safetensors` - weights
//!
//! Assets come either from a local directory (a fine-tuned model written by
//! the fine-tuner) or from the Hugging Face Hub cache.

use crate::config::EmbeddingConfig;
use crate::error::EmbeddingError;
use candle_transformers::models::bert::Config as BertConfig;
use std::path::{Path, PathBuf};
use tracing::info;

pub const CONFIG_FILE: &str = "config.json";
pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const WEIGHTS_FILE: &str = "model.safetensors";

/// Paths of a model's files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelAssets {
    pub config_path: PathBuf,
    pub tokenizer_path: PathBuf,
    pub weights_path: PathBuf,
}

impl ModelAssets {
    /// Uses the standard file names inside `dir`.
    ///
    /// # Errors
    ///
    /// Returns `EmbeddingError::ModelLoad` naming the first missing file.
    pub fn from_dir(dir: &Path) -> Result<Self, EmbeddingError> {
        let assets = Self {
            config_path: dir.join(CONFIG_FILE),
            tokenizer_path: dir.join(TOKENIZER_FILE),
            weights_path: dir.join(WEIGHTS_FILE),
        };
        for path in [
            &assets.config_path,
            &assets.tokenizer_path,
            &assets.weights_path,
        ] {
            if !path.is_file() {
                return Err(EmbeddingError::ModelLoad(format!(
                    "Missing model file: {}",
                    path.display()
                )));
            }
        }
        Ok(assets)
    }

    /// Downloads (or reuses cached) assets from the Hugging Face Hub.
    pub async fn from_hub(model_id: &str) -> Result<Self, EmbeddingError> {
        use hf_hub::api::tokio::ApiBuilder;

        info!("Resolving model '{}' from the Hugging Face Hub", model_id);
        let api = ApiBuilder::new().build().map_err(|e| {
            EmbeddingError::ModelLoad(format!("Failed to create HF API client: {e}"))
        })?;
        let repo = api.model(model_id.to_string());

        let config_path = repo.get(CONFIG_FILE).await.map_err(|e| {
            EmbeddingError::ModelLoad(format!("Failed to download {CONFIG_FILE}: {e}"))
        })?;
        let tokenizer_path = repo.get(TOKENIZER_FILE).await.map_err(|e| {
            EmbeddingError::ModelLoad(format!("Failed to download {TOKENIZER_FILE}: {e}"))
        })?;
        let weights_path = repo.get(WEIGHTS_FILE).await.map_err(|e| {
            EmbeddingError::ModelLoad(format!("Failed to download {WEIGHTS_FILE}: {e}"))
        })?;

        Ok(Self {
            config_path,
            tokenizer_path,
            weights_path,
        })
    }

    /// Resolves assets from the configured directory, else the Hub id.
    pub async fn resolve(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        match &config.model_dir {
            Some(dir) => Self::from_dir(dir),
            None => Self::from_hub(&config.model_id).await,
        }
    }

    /// Parses `config.json`.
    pub fn load_config(&self) -> Result<BertConfig, EmbeddingError> {
        load_bert_config(&self.config_path)
    }
}

/// Parses a BERT `config.json`.
pub fn load_bert_config(path: &Path) -> Result<BertConfig, EmbeddingError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        EmbeddingError::ModelLoad(format!("Failed to read {}: {e}", path.display()))
    })?;
    serde_json::from_str(&text)
        .map_err(|e| EmbeddingError::ModelLoad(format!("Invalid BERT config: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::write_tiny_model;

    #[test]
    fn test_from_dir_requires_all_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "{}").unwrap();

        let err = ModelAssets::from_dir(dir.path()).unwrap_err();
        assert!(err.to_string().contains(TOKENIZER_FILE));
    }

    #[test]
    fn test_from_dir_and_config() {
        let dir = tempfile::tempdir().unwrap();
        write_tiny_model(dir.path());

        let assets = ModelAssets::from_dir(dir.path()).unwrap();
        let config = assets.load_config().unwrap();
        assert_eq!(config.hidden_size, crate::test_utils::TINY_HIDDEN);
    }

    #[test]
    fn test_invalid_config_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "{\"hidden_size\": \"wide\"}").unwrap();
        assert!(matches!(
            load_bert_config(&path),
            Err(EmbeddingError::ModelLoad(_))
        ));
    }
}
