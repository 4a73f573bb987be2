//! End-to-end tests across pipeline stages.
//!
//! These tests exercise the workflow from labeled speeches to predictions:
//! 1. Labeling: volatility CSV -> per-speech labels
//! 2. Chunking: speech text -> ordered, overlapping chunks
//! 3. Embedding: chunks -> CLS vectors -> per-speech sequences
//! 4. Classification: sequences -> LSTM -> held-out report and predictions
//!
//! A randomly initialised encoder with a word-level tokenizer is written to a
//! temporary directory, so no model download is needed.

use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use chrono::NaiveDate;
use fedspeak_core::chunking::{reassemble, ChunkingStrategy, RecursiveChunker};
use fedspeak_core::classifier::ClassifierTrainer;
use fedspeak_core::config::{ClassifierConfig, FineTuneConfig, LabelingConfig};
use fedspeak_core::dataset::{
    read_chunks, write_chunks, Chunk, ChunkId, Embedding, LabeledSpeech, Speech, TrainingExample,
    VolatilityLabel,
};
use fedspeak_core::embedding::{
    load_embeddings, save_embeddings, BertEmbedder, ModelAssets, TokenizerHandle,
};
use fedspeak_core::finetune::MlmFineTuner;
use fedspeak_core::labeling::{chunk_speech, SpeechLabeler, VolatilitySeries};
use fedspeak_core::processing::{group_embeddings, speech_labels, EmbeddingPipeline};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

// ============================================================================
// Test Fixtures
// ============================================================================

const VOCAB: &[&str] = &[
    "[PAD]", "[UNK]", "[CLS]", "[SEP]", "[MASK]", "the", "committee", "inflation", "rates",
    "rose", "fell", "policy", "market", "economy", "growth", "labor", "prices", "word", ".",
];
const HIDDEN: usize = 8;
const MAX_POSITIONS: usize = 64;

fn config_json() -> serde_json::Value {
    json!({
        "vocab_size": VOCAB.len(),
        "hidden_size": HIDDEN,
        "num_hidden_layers": 1,
        "num_attention_heads": 2,
        "intermediate_size": 16,
        "hidden_act": "gelu",
        "hidden_dropout_prob": 0.0,
        "max_position_embeddings": MAX_POSITIONS,
        "type_vocab_size": 2,
        "initializer_range": 0.02,
        "layer_norm_eps": 1e-12,
        "pad_token_id": 0,
        "position_embedding_type": "absolute",
        "use_cache": true,
        "classifier_dropout": null,
        "model_type": "bert"
    })
}

fn tokenizer_json() -> String {
    let vocab: serde_json::Map<String, serde_json::Value> = VOCAB
        .iter()
        .enumerate()
        .map(|(id, token)| (token.to_string(), json!(id)))
        .collect();
    json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": { "type": "Lowercase" },
        "pre_tokenizer": { "type": "Whitespace" },
        "post_processor": {
            "type": "BertProcessing",
            "sep": ["[SEP]", 3],
            "cls": ["[CLS]", 2]
        },
        "decoder": null,
        "model": { "type": "WordLevel", "vocab": vocab, "unk_token": "[UNK]" }
    })
    .to_string()
}

/// Writes config, tokenizer and random weights to `dir`.
fn write_model(dir: &Path) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join("config.json"), config_json().to_string()).unwrap();
    std::fs::write(dir.join("tokenizer.json"), tokenizer_json()).unwrap();

    let config: BertConfig = serde_json::from_value(config_json()).unwrap();
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
    BertModel::load(vb.pp("bert"), &config).unwrap();
    for (name, var) in varmap.data().lock().unwrap().iter() {
        if name.ends_with("LayerNorm.weight") {
            var.set(&Tensor::ones(var.shape(), DType::F32, &Device::Cpu).unwrap())
                .unwrap();
        }
    }
    varmap.save(dir.join("model.safetensors")).unwrap();
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn speech(id: &str, date: NaiveDate, text: &str) -> Speech {
    Speech {
        id: id.to_string(),
        date,
        speaker: "Chair".to_string(),
        full_text: text.to_string(),
    }
}

fn embedding_pipeline(model_dir: &Path) -> EmbeddingPipeline {
    let assets = ModelAssets::from_dir(model_dir).unwrap();
    let embedder = BertEmbedder::load(&assets, Device::Cpu).unwrap();
    let tokenizer = TokenizerHandle::from_file(&assets.tokenizer_path, MAX_POSITIONS).unwrap();
    EmbeddingPipeline::new(Arc::new(embedder), Arc::new(tokenizer), 4).unwrap()
}

/// Two well-separated clusters; one cluster per label.
fn separable_examples(count: usize, dim: usize) -> Vec<TrainingExample> {
    (0..count)
        .map(|i| {
            let label = if i % 2 == 0 {
                VolatilityLabel::Positive
            } else {
                VolatilityLabel::Negative
            };
            let sign = if label == VolatilityLabel::Positive { 1.0 } else { -1.0 };
            let speech_id = format!("speech{:03}", i);
            let steps = 1 + i % 3;
            let embeddings = (0..steps)
                .map(|step| Embedding {
                    chunk_id: ChunkId::new(speech_id.clone(), step),
                    vector: (0..dim)
                        .map(|d| sign * (1.0 + 0.05 * ((i + d + step) % 5) as f32))
                        .collect(),
                })
                .collect();
            TrainingExample {
                speech_id,
                embeddings,
                label,
            }
        })
        .collect()
}

// ============================================================================
// Labeling
// ============================================================================

#[test]
fn test_labels_from_volatility_csv() {
    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("vix.csv");
    std::fs::write(
        &csv_path,
        "Date,Open,High,Low,Close,Adj Close,Volume\n\
         2021-06-01,20.0,20.5,19.5,20.0,20.0,0\n\
         2021-06-02,23.0,23.5,22.5,23.2,23.2,0\n\
         2021-06-03,22.0,22.5,21.5,22.1,22.1,0\n\
         2021-06-04,22.0,22.5,21.5,22.1,22.1,0\n",
    )
    .unwrap();
    let series = VolatilitySeries::from_csv(&csv_path).unwrap();
    let labeler = SpeechLabeler::new(&series, LabelingConfig::default());

    let speeches = vec![
        speech("rise", date(2021, 6, 1), "the committee"),
        speech("fall", date(2021, 6, 2), "the committee"),
        speech("flat", date(2021, 6, 3), "the committee"),
    ];
    let outcome = labeler.label_all(&speeches);

    assert_eq!(outcome.labeled.len(), 2);
    assert_eq!(outcome.labeled[0].label, VolatilityLabel::Positive);
    assert!((outcome.labeled[0].change - 3.2).abs() < 1e-9);
    assert_eq!(outcome.labeled[1].label, VolatilityLabel::Negative);
    assert!((outcome.labeled[1].change + 1.1).abs() < 1e-9);
    assert_eq!(outcome.excluded.len(), 1);
    assert_eq!(outcome.excluded[0].0, "flat");
}

// ============================================================================
// Chunking
// ============================================================================

#[test]
fn test_chunks_reconstruct_speech() {
    let paragraph = "The committee judged that inflation pressures remained elevated. \
                     Labor market conditions continued to improve, and growth was solid.";
    let text = vec![paragraph; 30].join("\n\n");
    let chunker = RecursiveChunker::new(1000, 100).unwrap();

    let chunks = chunker.chunk(&text).unwrap();

    assert!(chunks.len() > 1);
    assert!(chunks.iter().all(|c| c.char_len() <= 1000));
    assert_eq!(reassemble(&chunks), text);
}

#[test]
fn test_chunk_csv_preserves_order_and_labels() {
    let dir = tempfile::tempdir().unwrap();
    let labeled = LabeledSpeech {
        speech: speech("s1", date(2021, 6, 1), &"word ".repeat(1000)),
        label: VolatilityLabel::Positive,
        change: 3.2,
    };
    let chunker = RecursiveChunker::new(1000, 100).unwrap();
    let chunks = chunk_speech(&labeled, &chunker).unwrap();

    let path = dir.path().join("chunks.csv");
    write_chunks(&path, &chunks).unwrap();
    let restored: Vec<Chunk> = read_chunks(&path).unwrap();

    assert_eq!(restored, chunks);
    let indices: Vec<usize> = restored.iter().map(|c| c.sequence_index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
}

// ============================================================================
// Full Pipeline
// ============================================================================

#[test]
fn test_five_thousand_char_speech_to_prediction() {
    let dir = tempfile::tempdir().unwrap();
    let model_dir = dir.path().join("model");
    write_model(&model_dir);

    let labeled = LabeledSpeech {
        speech: speech("long", date(2021, 6, 1), &"word ".repeat(1000)),
        label: VolatilityLabel::Positive,
        change: 3.2,
    };
    let chunker = RecursiveChunker::new(1000, 100).unwrap();
    let chunks = chunk_speech(&labeled, &chunker).unwrap();
    assert_eq!(chunks.len(), 6);

    let pipeline = embedding_pipeline(&model_dir);
    let mut last_completed = 0;
    let run = pipeline
        .embed_chunks(&chunks, |p| last_completed = p.completed)
        .unwrap();
    assert_eq!(run.chunk_count(), 6);
    assert_eq!(last_completed, 6);
    // 200 words per chunk exceed the 64-token limit
    assert_eq!(run.truncated, 6);
    assert!(run.embeddings.iter().all(|e| e.dimension() == HIDDEN));

    let store = dir.path().join("embeddings");
    save_embeddings(&store, "tiny-bert", &run.embeddings).unwrap();
    let stored = load_embeddings(&store).unwrap();
    assert_eq!(stored.embeddings, run.embeddings);

    let examples = group_embeddings(stored.embeddings, &speech_labels(&chunks).unwrap()).unwrap();
    assert_eq!(examples.len(), 1);
    assert_eq!(examples[0].sequence_len(), 6);
    assert_eq!(examples[0].label, VolatilityLabel::Positive);

    let trainer = ClassifierTrainer::new(
        ClassifierConfig {
            epochs: 3,
            hidden_size: 4,
            ..ClassifierConfig::default()
        },
        Device::Cpu,
    )
    .unwrap();
    let (classifier, _) = trainer
        .train(&separable_examples(20, HIDDEN), |_| {})
        .unwrap();

    let prediction = classifier.predict(&examples[0].embeddings).unwrap();
    let total: f32 = prediction.probabilities.iter().sum();
    assert!((total - 1.0).abs() < 1e-5);
}

#[test]
fn test_classifier_beats_stratified_baseline() {
    let examples = separable_examples(60, 6);
    let flat: Vec<Embedding> = examples
        .iter()
        .flat_map(|e| e.embeddings.iter().cloned())
        .collect();
    let labels = examples
        .iter()
        .map(|e| (e.speech_id.clone(), e.label))
        .collect();
    let regrouped = group_embeddings(flat, &labels).unwrap();
    assert_eq!(regrouped, examples);

    let trainer = ClassifierTrainer::new(
        ClassifierConfig {
            epochs: 10,
            hidden_size: 16,
            learning_rate: 1e-2,
            ..ClassifierConfig::default()
        },
        Device::Cpu,
    )
    .unwrap();
    let (_, outcome) = trainer.train(&regrouped, |_| {}).unwrap();

    assert_eq!(outcome.epoch_losses.len(), 10);
    assert_eq!(outcome.report.test_size(), 12);
    assert!(
        outcome.report.accuracy >= outcome.report.stratified_baseline + 0.25,
        "{}",
        outcome.report
    );
}

#[test]
fn test_fine_tuned_model_feeds_embedding() {
    let dir = tempfile::tempdir().unwrap();
    let base_dir = dir.path().join("base");
    let tuned_dir = dir.path().join("tuned");
    write_model(&base_dir);

    let corpus: Vec<String> = (0..12)
        .map(|i| {
            if i % 2 == 0 {
                "the committee rates rose . inflation prices rose .".to_string()
            } else {
                "the market economy growth fell . labor policy .".to_string()
            }
        })
        .collect();
    let tuner = MlmFineTuner::with_device(
        FineTuneConfig {
            epochs: 2,
            block_size: 16,
            min_block_tokens: 4,
            batch_size: 2,
            ..FineTuneConfig::default()
        },
        Device::Cpu,
    )
    .unwrap();
    let base = ModelAssets::from_dir(&base_dir).unwrap();
    let mut updates = 0;
    let outcome = tuner
        .fine_tune(&base, &corpus, &tuned_dir, |_| updates += 1)
        .unwrap();
    assert_eq!(outcome.epoch_losses.len(), 2);
    assert!(updates > 0);

    let pipeline = embedding_pipeline(&tuned_dir);
    assert_eq!(pipeline.embedder().embedding_dim(), HIDDEN);
    let chunk = Chunk {
        speech_id: "s".to_string(),
        sequence_index: 0,
        text: "inflation rose".to_string(),
        label: VolatilityLabel::Positive,
    };
    let run = pipeline.embed_chunks(&[chunk], |_| {}).unwrap();
    assert_eq!(run.embeddings[0].dimension(), HIDDEN);
    assert!(run.embeddings[0].vector.iter().all(|v| v.is_finite()));
}
