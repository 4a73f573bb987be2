//! CSV and text artifact I/O with schema validation.
//!
//! Every loader checks the header against the exact expected column list
//! before reading rows, so a file produced by a different stage (or an older
//! layout) fails fast with [`DatasetError::Schema`] instead of producing
//! silently misaligned records.

use super::types::{Chunk, Speech, VocabularyEntry, VolatilityLabel};
use crate::error::DatasetError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Column layout of the vocabulary CSV.
pub const VOCABULARY_COLUMNS: [&str; 2] = ["term", "definition"];

/// Column layout of the raw speeches CSV.
pub const SPEECH_COLUMNS: [&str; 4] = ["id", "date", "speaker", "content"];

/// Column layout of the labeled chunks CSV.
pub const CHUNK_COLUMNS: [&str; 4] = ["speech_id", "chunk_index", "text", "label"];

#[derive(Serialize, Deserialize)]
struct SpeechRecord {
    id: String,
    date: NaiveDate,
    speaker: String,
    content: String,
}

#[derive(Serialize, Deserialize)]
struct ChunkRecord {
    speech_id: String,
    chunk_index: usize,
    text: String,
    label: String,
}

// =============================================================================
// Shared helpers
// =============================================================================

fn open_reader(path: &Path) -> Result<csv::Reader<File>, DatasetError> {
    let file = File::open(path).map_err(|e| DatasetError::io(path, e))?;
    Ok(csv::Reader::from_reader(file))
}

fn open_writer(path: &Path) -> Result<csv::Writer<File>, DatasetError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| DatasetError::io(parent, e))?;
    }
    let file = File::create(path).map_err(|e| DatasetError::io(path, e))?;
    Ok(csv::Writer::from_writer(file))
}

/// Fails unless the header row is exactly `expected` (whitespace-trimmed).
fn expect_header<R: std::io::Read>(
    reader: &mut csv::Reader<R>,
    expected: &[&str],
    path: &Path,
) -> Result<(), DatasetError> {
    let headers = reader.headers()?;
    let found: Vec<&str> = headers.iter().map(str::trim).collect();
    if found != expected {
        return Err(DatasetError::Schema(format!(
            "{}: expected columns {:?}, found {:?}",
            path.display(),
            expected,
            found
        )));
    }
    Ok(())
}

// =============================================================================
// Vocabulary
// =============================================================================

/// Writes the vocabulary CSV (`term,definition`).
pub fn write_vocabulary(path: &Path, entries: &[VocabularyEntry]) -> Result<(), DatasetError> {
    let mut writer = open_writer(path)?;
    for entry in entries {
        writer.serialize(entry)?;
    }
    writer.flush().map_err(|e| DatasetError::io(path, e))?;
    Ok(())
}

/// Reads the vocabulary CSV.
pub fn read_vocabulary(path: &Path) -> Result<Vec<VocabularyEntry>, DatasetError> {
    let mut reader = open_reader(path)?;
    expect_header(&mut reader, &VOCABULARY_COLUMNS, path)?;

    let mut entries = Vec::new();
    for row in reader.deserialize() {
        let entry: VocabularyEntry = row?;
        if entry.term.trim().is_empty() {
            return Err(DatasetError::Schema(format!(
                "{}: empty term in row {}",
                path.display(),
                entries.len() + 1
            )));
        }
        entries.push(entry);
    }
    Ok(entries)
}

/// Writes the fine-tuning corpus: one `term: definition` paragraph per
/// entry, paragraphs separated by a blank line.
pub fn write_corpus(path: &Path, entries: &[VocabularyEntry]) -> Result<(), DatasetError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| DatasetError::io(parent, e))?;
    }
    let file = File::create(path).map_err(|e| DatasetError::io(path, e))?;
    let mut out = BufWriter::new(file);
    for (i, entry) in entries.iter().enumerate() {
        if i > 0 {
            writeln!(out).map_err(|e| DatasetError::io(path, e))?;
        }
        writeln!(out, "{}", entry.to_corpus_line()).map_err(|e| DatasetError::io(path, e))?;
    }
    out.flush().map_err(|e| DatasetError::io(path, e))
}

/// Reads the corpus back as its non-empty paragraphs.
pub fn read_corpus(path: &Path) -> Result<Vec<String>, DatasetError> {
    let text = std::fs::read_to_string(path).map_err(|e| DatasetError::io(path, e))?;
    Ok(text
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect())
}

// =============================================================================
// Speeches
// =============================================================================

/// Writes the raw speeches CSV (`id,date,speaker,content`).
pub fn write_speeches(path: &Path, speeches: &[Speech]) -> Result<(), DatasetError> {
    let mut writer = open_writer(path)?;
    for speech in speeches {
        writer.serialize(SpeechRecord {
            id: speech.id.clone(),
            date: speech.date,
            speaker: speech.speaker.clone(),
            content: speech.full_text.clone(),
        })?;
    }
    writer.flush().map_err(|e| DatasetError::io(path, e))?;
    Ok(())
}

/// Reads the raw speeches CSV, rejecting empty or duplicate ids.
pub fn read_speeches(path: &Path) -> Result<Vec<Speech>, DatasetError> {
    let mut reader = open_reader(path)?;
    expect_header(&mut reader, &SPEECH_COLUMNS, path)?;

    let mut seen = HashSet::new();
    let mut speeches = Vec::new();
    for row in reader.deserialize() {
        let record: SpeechRecord = row?;
        if record.id.trim().is_empty() {
            return Err(DatasetError::Schema(format!(
                "{}: empty speech id in row {}",
                path.display(),
                speeches.len() + 1
            )));
        }
        if !seen.insert(record.id.clone()) {
            return Err(DatasetError::Inconsistent(format!(
                "duplicate speech id '{}'",
                record.id
            )));
        }
        speeches.push(Speech {
            id: record.id,
            date: record.date,
            speaker: record.speaker,
            full_text: record.content,
        });
    }
    Ok(speeches)
}

// =============================================================================
// Labeled chunks
// =============================================================================

/// Writes the labeled chunks CSV (`speech_id,chunk_index,text,label`).
pub fn write_chunks(path: &Path, chunks: &[Chunk]) -> Result<(), DatasetError> {
    let mut writer = open_writer(path)?;
    for chunk in chunks {
        writer.serialize(ChunkRecord {
            speech_id: chunk.speech_id.clone(),
            chunk_index: chunk.sequence_index,
            text: chunk.text.clone(),
            label: chunk.label.as_str().to_string(),
        })?;
    }
    writer.flush().map_err(|e| DatasetError::io(path, e))?;
    Ok(())
}

/// Reads the labeled chunks CSV.
///
/// Validates that every speech's chunk indices appear in order starting at
/// 0 with no gaps, and that all chunks of a speech carry the same label.
pub fn read_chunks(path: &Path) -> Result<Vec<Chunk>, DatasetError> {
    let mut reader = open_reader(path)?;
    expect_header(&mut reader, &CHUNK_COLUMNS, path)?;

    // speech_id -> (next expected index, label)
    let mut state: HashMap<String, (usize, VolatilityLabel)> = HashMap::new();
    let mut chunks = Vec::new();

    for row in reader.deserialize() {
        let record: ChunkRecord = row?;
        let row_number = chunks.len() + 1;

        if record.speech_id.trim().is_empty() {
            return Err(DatasetError::Schema(format!(
                "{}: empty speech id in row {}",
                path.display(),
                row_number
            )));
        }
        let label: VolatilityLabel = record.label.parse().map_err(|e| {
            DatasetError::Schema(format!("{}: row {}: {}", path.display(), row_number, e))
        })?;

        let (expected, speech_label) = state
            .entry(record.speech_id.clone())
            .or_insert((0, label));
        if record.chunk_index != *expected {
            return Err(DatasetError::Inconsistent(format!(
                "speech '{}': expected chunk index {}, found {}",
                record.speech_id, expected, record.chunk_index
            )));
        }
        if *speech_label != label {
            return Err(DatasetError::Inconsistent(format!(
                "speech '{}' has both {} and {} labels",
                record.speech_id, speech_label, label
            )));
        }
        *expected += 1;

        chunks.push(Chunk {
            speech_id: record.speech_id,
            sequence_index: record.chunk_index,
            text: record.text,
            label,
        });
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn chunk(speech_id: &str, index: usize, label: VolatilityLabel) -> Chunk {
        Chunk {
            speech_id: speech_id.to_string(),
            sequence_index: index,
            text: format!("text {index}, with a comma"),
            label,
        }
    }

    #[test]
    fn test_chunks_roundtrip_preserves_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chunks.csv");
        let chunks = vec![
            chunk("a", 0, VolatilityLabel::Positive),
            chunk("a", 1, VolatilityLabel::Positive),
            chunk("b", 0, VolatilityLabel::Negative),
        ];

        write_chunks(&path, &chunks).unwrap();
        assert_eq!(read_chunks(&path).unwrap(), chunks);
    }

    #[test]
    fn test_read_chunks_rejects_wrong_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chunks.csv");
        std::fs::write(&path, "speech,index,text,label\na,0,hello,positive\n").unwrap();

        let err = read_chunks(&path).unwrap_err();
        assert!(matches!(err, DatasetError::Schema(_)));
    }

    #[test]
    fn test_read_chunks_rejects_index_gap() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chunks.csv");
        std::fs::write(
            &path,
            "speech_id,chunk_index,text,label\na,0,x,positive\na,2,y,positive\n",
        )
        .unwrap();

        let err = read_chunks(&path).unwrap_err();
        assert!(matches!(err, DatasetError::Inconsistent(_)));
    }

    #[test]
    fn test_read_chunks_rejects_mixed_labels() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chunks.csv");
        std::fs::write(
            &path,
            "speech_id,chunk_index,text,label\na,0,x,positive\na,1,y,negative\n",
        )
        .unwrap();

        let err = read_chunks(&path).unwrap_err();
        assert!(matches!(err, DatasetError::Inconsistent(_)));
    }

    #[test]
    fn test_read_chunks_rejects_unknown_label() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chunks.csv");
        std::fs::write(&path, "speech_id,chunk_index,text,label\na,0,x,flat\n").unwrap();

        let err = read_chunks(&path).unwrap_err();
        assert!(matches!(err, DatasetError::Schema(_)));
    }

    #[test]
    fn test_speeches_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("speeches.csv");
        let speeches = vec![Speech {
            id: "greenspan19961205".to_string(),
            date: NaiveDate::from_ymd_opt(1996, 12, 5).unwrap(),
            speaker: "Chairman Alan Greenspan".to_string(),
            full_text: "Irrational exuberance.\nSecond line.".to_string(),
        }];

        write_speeches(&path, &speeches).unwrap();
        assert_eq!(read_speeches(&path).unwrap(), speeches);
    }

    #[test]
    fn test_read_speeches_rejects_duplicates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("speeches.csv");
        std::fs::write(
            &path,
            "id,date,speaker,content\ns1,2020-01-02,A,x\ns1,2020-01-03,B,y\n",
        )
        .unwrap();

        assert!(matches!(
            read_speeches(&path).unwrap_err(),
            DatasetError::Inconsistent(_)
        ));
    }

    #[test]
    fn test_vocabulary_and_corpus() {
        let dir = tempdir().unwrap();
        let csv_path = dir.path().join("vocab/vocabulary.csv");
        let corpus_path = dir.path().join("vocab/corpus.txt");
        let entries = vec![
            VocabularyEntry {
                term: "Alpha".to_string(),
                definition: "Excess return.".to_string(),
            },
            VocabularyEntry {
                term: "Beta".to_string(),
                definition: "Market sensitivity.".to_string(),
            },
        ];

        write_vocabulary(&csv_path, &entries).unwrap();
        assert_eq!(read_vocabulary(&csv_path).unwrap(), entries);

        write_corpus(&corpus_path, &entries).unwrap();
        let paragraphs = read_corpus(&corpus_path).unwrap();
        assert_eq!(
            paragraphs,
            vec!["Alpha: Excess return.", "Beta: Market sensitivity."]
        );
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = read_speeches(Path::new("/nonexistent/speeches.csv")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/speeches.csv"));
    }
}
