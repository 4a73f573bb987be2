//! Configuration and path resolution for the CLI.
//!
//! Every stage reads and writes fixed file names inside one data directory:
//! - Custom: `--data-dir`
//! - Default: the platform data directory for `fedspeak`
//!
//! The encoder is resolved from `--model`, then `$FEDSPEAK_MODEL_DIR`, then
//! the pipeline configuration (local directory or Hub id).

use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use fedspeak_core::config::PipelineConfig;
use fedspeak_core::embedding::ModelAssets;
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable for a custom model directory
pub const MODEL_DIR_ENV: &str = "FEDSPEAK_MODEL_DIR";

pub const VOCABULARY_FILE: &str = "vocabulary.csv";
pub const CORPUS_FILE: &str = "corpus.txt";
pub const SPEECHES_FILE: &str = "speeches.csv";
pub const VOLATILITY_FILE: &str = "vix.csv";
pub const CHUNKS_FILE: &str = "chunks.csv";
pub const EMBEDDINGS_DIR: &str = "embeddings";
pub const FINE_TUNED_DIR: &str = "models/fedspeak-bert";
pub const CLASSIFIER_DIR: &str = "models/classifier";
pub const REPORT_TEXT_FILE: &str = "report.txt";
pub const REPORT_JSON_FILE: &str = "report.json";

/// Loads the pipeline configuration, or the defaults without `--config`.
pub fn load_pipeline_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load configuration: {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

/// Returns the data directory, creating it if needed.
///
/// Default locations:
/// - macOS: `~/Library/Application Support/org.fedspeak.fedspeak/`
/// - Linux: `~/.local/share/fedspeak/`
/// - Windows: `%APPDATA%\fedspeak\fedspeak\data\`
pub fn get_data_dir(custom_dir: Option<&PathBuf>) -> Result<PathBuf> {
    let dir = match custom_dir {
        Some(dir) => dir.clone(),
        None => ProjectDirs::from("org", "fedspeak", "fedspeak")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or_else(|| anyhow!("Could not determine data directory"))?,
    };
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create data directory: {}", dir.display()))?;
    Ok(dir)
}

/// Model directory named by `--model` or `$FEDSPEAK_MODEL_DIR`, if any.
pub fn explicit_model_dir(flag: Option<&PathBuf>) -> Option<PathBuf> {
    flag.cloned().or_else(|| {
        std::env::var(MODEL_DIR_ENV)
            .ok()
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from)
    })
}

/// Resolves the pretrained encoder to fine-tune.
pub async fn base_model_assets(
    flag: Option<&PathBuf>,
    config: &PipelineConfig,
) -> Result<ModelAssets> {
    if let Some(dir) = explicit_model_dir(flag) {
        return ModelAssets::from_dir(&dir)
            .with_context(|| format!("Invalid model directory: {}", dir.display()));
    }
    ModelAssets::resolve(&config.embedding)
        .await
        .context("Failed to resolve the pretrained model")
}

/// Resolves the encoder used for embeddings.
///
/// A fine-tuned model in the data directory is preferred over the
/// configured pretrained one.
pub async fn embedding_model_assets(
    flag: Option<&PathBuf>,
    data_dir: &Path,
    config: &PipelineConfig,
) -> Result<ModelAssets> {
    if flag.is_none() && std::env::var_os(MODEL_DIR_ENV).is_none() {
        let tuned = data_dir.join(FINE_TUNED_DIR);
        if let Ok(assets) = ModelAssets::from_dir(&tuned) {
            info!("Using fine-tuned model at {}", tuned.display());
            return Ok(assets);
        }
    }
    base_model_assets(flag, config).await
}

/// Short name recorded in the embedding manifest.
pub fn model_name(assets: &ModelAssets) -> String {
    assets
        .weights_path
        .parent()
        .map(|dir| dir.display().to_string())
        .unwrap_or_else(|| assets.weights_path.display().to_string())
}
