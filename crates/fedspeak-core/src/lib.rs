//! # Fedspeak Core
//!
//! Library for studying whether Federal Reserve speeches move market
//! volatility: scraping, labeling, BERT embeddings and sequence classification.
//!
//! The stages are independent and communicate through files in a data
//! directory, so each can be rerun on its own.
//!
//! ## Modules
//!
//! - [`scraping`] - Vocabulary corpus and speech archive scrapers
//! - [`labeling`] - Volatility-change labels and speech chunking
//! - [`chunking`] - Recursive character chunking with overlap
//! - [`finetune`] - Masked-language-model fine-tuning of the encoder
//! - [`embedding`] - Tokenizer, BERT encoder and CLS embedding storage
//! - [`processing`] - Batched embedding pipeline and progress types
//! - [`classifier`] - LSTM classifier, training loop and evaluation report
//! - [`dataset`] - Record types and CSV persistence
//! - [`config`] - Pipeline configuration
//! - [`error`] - Error types for every stage

// Note: unsafe is used only in embedding/model.rs to memory-map safetensors
// weights. The mapped file is not modified while the model is alive.
#![allow(unsafe_code)]

pub mod chunking;
pub mod classifier;
pub mod config;
pub mod dataset;
pub mod embedding;
pub mod error;
pub mod finetune;
pub mod labeling;
pub mod processing;
pub mod scraping;

#[cfg(test)]
mod test_utils;
