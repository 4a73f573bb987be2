//! Data model and tabular artifacts.
//!
//! Typed records for every stage of the pipeline ([`Speech`], [`Chunk`],
//! [`Embedding`], [`TrainingExample`], ...) and validated CSV readers and
//! writers for the artifacts passed between stages.

mod io;
mod types;

pub use io::{
    read_chunks, read_corpus, read_speeches, read_vocabulary, write_chunks, write_corpus,
    write_speeches, write_vocabulary, CHUNK_COLUMNS, SPEECH_COLUMNS, VOCABULARY_COLUMNS,
};
pub use types::{
    Chunk, ChunkId, Embedding, LabeledSpeech, Speech, TrainingExample, VocabularyEntry,
    VolatilityLabel,
};

use crate::error::DatasetError;
use std::path::{Path, PathBuf};

/// Writes a file by way of a temporary sibling and a rename.
///
/// `write` receives the temporary path. Readers of `path` observe either the
/// previous file or the complete new one, never a partial write. The
/// temporary file is removed if `write` fails.
///
/// # Arguments
///
/// * `path` - Final destination
/// * `write` - Closure producing the file at the given temporary path
pub fn persist_atomically<E, F>(path: &Path, write: F) -> Result<(), E>
where
    F: FnOnce(&Path) -> Result<(), E>,
    E: From<DatasetError>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| DatasetError::io(parent, e))?;
    }
    let tmp = temporary_sibling(path);

    if let Err(err) = write(&tmp) {
        let _ = std::fs::remove_file(&tmp);
        return Err(err);
    }

    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        E::from(DatasetError::io(path, e))
    })
}

fn temporary_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persist_atomically_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.bin");
        std::fs::write(&path, b"old").unwrap();

        persist_atomically::<DatasetError, _>(&path, |tmp| {
            std::fs::write(tmp, b"new").map_err(|e| DatasetError::io(tmp, e))
        })
        .unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"new");
        assert!(!temporary_sibling(&path).exists());
    }

    #[test]
    fn test_persist_atomically_keeps_old_file_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.bin");
        std::fs::write(&path, b"old").unwrap();

        let result = persist_atomically::<DatasetError, _>(&path, |tmp| {
            std::fs::write(tmp, b"partial").unwrap();
            Err(DatasetError::Schema("interrupted".to_string()))
        });

        assert!(result.is_err());
        assert_eq!(std::fs::read(&path).unwrap(), b"old");
        assert!(!temporary_sibling(&path).exists());
    }
}
