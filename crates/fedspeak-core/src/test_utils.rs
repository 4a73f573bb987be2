//! Test utilities for fedspeak-core.
//!
//! Shared helpers for unit tests: an in-memory page fetcher and a tiny
//! randomly initialised BERT checkpoint with a word-level tokenizer.
//! Only compiled when running tests.

use crate::embedding::assets::{CONFIG_FILE, TOKENIZER_FILE, WEIGHTS_FILE};
use crate::embedding::tokenizer::TokenizerHandle;
use crate::error::ScrapeError;
use crate::scraping::PageFetcher;
use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;

pub const PAD_ID: u32 = 0;
pub const CLS_ID: u32 = 2;
pub const SEP_ID: u32 = 3;
pub const MASK_ID: u32 = 4;

pub const TINY_HIDDEN: usize = 8;

/// Vocabulary of the tiny tokenizer; ids are positions.
pub const TINY_VOCAB: &[&str] = &[
    "[PAD]", "[UNK]", "[CLS]", "[SEP]", "[MASK]", "the", "committee", "inflation", "rates",
    "rose", "fell", "policy", "market", "economy", "growth", "labor", "prices", "federal",
    "reserve", "bank", "risk", "credit", "bond", "yield", "word", "of", "and", "to", ".", ",",
];

/// Serves fixed bodies by URL; unknown URLs fail.
pub struct StaticFetcher {
    pages: HashMap<String, String>,
}

impl StaticFetcher {
    pub fn new<I, K, V>(pages: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            pages: pages
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[async_trait]
impl PageFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ScrapeError> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| ScrapeError::RequestFailed(format!("HTTP 404 for {}", url)))
    }
}

/// `config.json` of the tiny encoder.
pub fn tiny_config_json() -> serde_json::Value {
    json!({
        "vocab_size": TINY_VOCAB.len(),
        "hidden_size": TINY_HIDDEN,
        "num_hidden_layers": 1,
        "num_attention_heads": 2,
        "intermediate_size": 16,
        "hidden_act": "gelu",
        "hidden_dropout_prob": 0.0,
        "max_position_embeddings": 64,
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

pub fn tiny_bert_config() -> BertConfig {
    serde_json::from_value(tiny_config_json()).unwrap()
}

/// `tokenizer.json` of a lowercasing word-level tokenizer over [`TINY_VOCAB`].
pub fn tiny_tokenizer_json() -> String {
    let vocab: serde_json::Map<String, serde_json::Value> = TINY_VOCAB
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
            "sep": ["[SEP]", SEP_ID],
            "cls": ["[CLS]", CLS_ID]
        },
        "decoder": null,
        "model": { "type": "WordLevel", "vocab": vocab, "unk_token": "[UNK]" }
    })
    .to_string()
}

pub fn tiny_tokenizer(max_length: usize) -> TokenizerHandle {
    TokenizerHandle::from_bytes(tiny_tokenizer_json().into_bytes(), max_length).unwrap()
}

/// Builds a randomly initialised encoder under `bert.*` in a fresh `VarMap`.
pub fn tiny_varmap() -> VarMap {
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
    BertModel::load(vb.pp("bert"), &tiny_bert_config()).unwrap();

    for (name, var) in varmap.data().lock().unwrap().iter() {
        if name.ends_with("LayerNorm.weight") {
            var.set(&Tensor::ones(var.shape(), DType::F32, &Device::Cpu).unwrap())
                .unwrap();
        }
    }
    varmap
}

/// Writes a complete tiny checkpoint (config, tokenizer, weights) to `dir`.
pub fn write_tiny_model(dir: &Path) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(CONFIG_FILE), tiny_config_json().to_string()).unwrap();
    std::fs::write(dir.join(TOKENIZER_FILE), tiny_tokenizer_json()).unwrap();
    tiny_varmap().save(dir.join(WEIGHTS_FILE)).unwrap();
}
