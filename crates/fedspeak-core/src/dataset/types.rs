//! Domain records shared by every pipeline stage.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A financial term and its definition, as scraped from the dictionary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyEntry {
    pub term: String,
    pub definition: String,
}

impl VocabularyEntry {
    /// Renders the entry as one corpus paragraph (`term: definition`).
    pub fn to_corpus_line(&self) -> String {
        format!("{}: {}", self.term, self.definition)
    }
}

/// A speech as scraped from the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Speech {
    /// Stable identifier derived from the page name (e.g. `greenspan19961205`)
    pub id: String,
    /// Publication date
    pub date: NaiveDate,
    pub speaker: String,
    pub full_text: String,
}

/// Direction of the volatility index move following a speech.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolatilityLabel {
    /// Volatility fell after the speech
    Negative,
    /// Volatility rose after the speech
    Positive,
}

impl VolatilityLabel {
    /// Both labels, ordered by class index.
    pub const ALL: [VolatilityLabel; 2] = [VolatilityLabel::Negative, VolatilityLabel::Positive];

    /// Class index used by the classifier (`negative = 0`, `positive = 1`).
    pub fn class_index(self) -> u32 {
        match self {
            VolatilityLabel::Negative => 0,
            VolatilityLabel::Positive => 1,
        }
    }

    /// Inverse of [`class_index`](Self::class_index).
    pub fn from_class_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(VolatilityLabel::Negative),
            1 => Some(VolatilityLabel::Positive),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VolatilityLabel::Negative => "negative",
            VolatilityLabel::Positive => "positive",
        }
    }
}

impl fmt::Display for VolatilityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VolatilityLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(VolatilityLabel::Positive),
            "negative" => Ok(VolatilityLabel::Negative),
            other => Err(format!("unknown label '{other}'")),
        }
    }
}

/// A speech with its volatility label. Created once, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledSpeech {
    pub speech: Speech,
    pub label: VolatilityLabel,
    /// Signed volatility change that produced the label
    pub change: f64,
}

/// Identifies a chunk within the whole dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkId {
    pub speech_id: String,
    pub sequence_index: usize,
}

impl ChunkId {
    pub fn new(speech_id: impl Into<String>, sequence_index: usize) -> Self {
        Self {
            speech_id: speech_id.into(),
            sequence_index,
        }
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.speech_id, self.sequence_index)
    }
}

/// A bounded-length piece of a speech, tagged with the speech's label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub speech_id: String,
    /// Position of the chunk within its speech (0-based, contiguous)
    pub sequence_index: usize,
    pub text: String,
    pub label: VolatilityLabel,
}

impl Chunk {
    pub fn id(&self) -> ChunkId {
        ChunkId::new(self.speech_id.clone(), self.sequence_index)
    }
}

/// The CLS summary vector of one chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub chunk_id: ChunkId,
    pub vector: Vec<f32>,
}

impl Embedding {
    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}

/// All chunk embeddings of one speech, in chunk order, with its label.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingExample {
    pub speech_id: String,
    pub embeddings: Vec<Embedding>,
    pub label: VolatilityLabel,
}

impl TrainingExample {
    /// Number of chunks (LSTM time steps).
    pub fn sequence_len(&self) -> usize {
        self.embeddings.len()
    }

    /// Embedding dimension, or 0 for an empty sequence.
    pub fn dimension(&self) -> usize {
        self.embeddings.first().map(Embedding::dimension).unwrap_or(0)
    }
}
