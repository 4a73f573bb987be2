//! On-disk storage for chunk embeddings.
//!
//! A store directory holds two files:
//! - `embeddings.safetensors` - one `[rows, dimension]` F32 tensor
//! - `embeddings.json` - model name, dimension and the chunk id of each row
//!
//! Both are written atomically.

use crate::dataset::{persist_atomically, ChunkId, Embedding};
use crate::error::DatasetError;
use candle_core::{Device, Tensor};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::info;

pub const EMBEDDINGS_FILE: &str = "embeddings.safetensors";
pub const MANIFEST_FILE: &str = "embeddings.json";
const TENSOR_NAME: &str = "embeddings";

/// Row layout of a stored embedding tensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingManifest {
    /// Encoder that produced the vectors
    pub model: String,
    pub dimension: usize,
    /// Chunk id of each tensor row, in row order
    pub rows: Vec<ChunkId>,
}

/// Embeddings read back from a store.
#[derive(Debug, Clone)]
pub struct StoredEmbeddings {
    pub model: String,
    pub dimension: usize,
    pub embeddings: Vec<Embedding>,
}

/// Saves embeddings to `dir`.
///
/// # Errors
///
/// Returns `DatasetError::Schema` if `embeddings` is empty and
/// `DatasetError::Inconsistent` if vector lengths differ.
pub fn save_embeddings(
    dir: &Path,
    model: &str,
    embeddings: &[Embedding],
) -> Result<(), DatasetError> {
    let dimension = embeddings
        .first()
        .map(Embedding::dimension)
        .ok_or_else(|| DatasetError::Schema("No embeddings to save".to_string()))?;

    let mut flat = Vec::with_capacity(embeddings.len() * dimension);
    for embedding in embeddings {
        if embedding.dimension() != dimension {
            return Err(DatasetError::Inconsistent(format!(
                "Embedding {} has dimension {}, expected {}",
                embedding.chunk_id,
                embedding.dimension(),
                dimension
            )));
        }
        flat.extend_from_slice(&embedding.vector);
    }

    let tensor = Tensor::from_vec(flat, (embeddings.len(), dimension), &Device::Cpu)?;
    let tensors = HashMap::from([(TENSOR_NAME.to_string(), tensor)]);
    persist_atomically(&dir.join(EMBEDDINGS_FILE), |tmp| {
        candle_core::safetensors::save(&tensors, tmp).map_err(DatasetError::from)
    })?;

    let manifest = EmbeddingManifest {
        model: model.to_string(),
        dimension,
        rows: embeddings.iter().map(|e| e.chunk_id.clone()).collect(),
    };
    persist_atomically(&dir.join(MANIFEST_FILE), |tmp| {
        let file = File::create(tmp).map_err(|e| DatasetError::io(tmp, e))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &manifest)?;
        Ok::<(), DatasetError>(())
    })?;

    info!(
        "Saved {} embeddings ({}d) to {}",
        embeddings.len(),
        dimension,
        dir.display()
    );
    Ok(())
}

/// Loads embeddings saved by [`save_embeddings`].
///
/// # Errors
///
/// Returns `DatasetError::Inconsistent` if the tensor shape disagrees with
/// the manifest.
pub fn load_embeddings(dir: &Path) -> Result<StoredEmbeddings, DatasetError> {
    let manifest_path = dir.join(MANIFEST_FILE);
    let file = File::open(&manifest_path).map_err(|e| DatasetError::io(&manifest_path, e))?;
    let manifest: EmbeddingManifest = serde_json::from_reader(BufReader::new(file))?;

    let tensor_path = dir.join(EMBEDDINGS_FILE);
    if !tensor_path.is_file() {
        return Err(DatasetError::io(
            &tensor_path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "embedding tensor not found"),
        ));
    }
    let mut tensors = candle_core::safetensors::load(&tensor_path, &Device::Cpu)?;
    let tensor = tensors.remove(TENSOR_NAME).ok_or_else(|| {
        DatasetError::Schema(format!(
            "{} has no '{}' tensor",
            tensor_path.display(),
            TENSOR_NAME
        ))
    })?;

    let (rows, dimension) = tensor.dims2()?;
    if rows != manifest.rows.len() || dimension != manifest.dimension {
        return Err(DatasetError::Inconsistent(format!(
            "Tensor is {}x{} but manifest lists {} rows of dimension {}",
            rows,
            dimension,
            manifest.rows.len(),
            manifest.dimension
        )));
    }

    let vectors = tensor.to_vec2::<f32>()?;
    let embeddings = manifest
        .rows
        .into_iter()
        .zip(vectors)
        .map(|(chunk_id, vector)| Embedding { chunk_id, vector })
        .collect();

    Ok(StoredEmbeddings {
        model: manifest.model,
        dimension,
        embeddings,
    })
}
