//! Encoder loading, tokenization and chunk embedding.
//!
//! ## Core Traits
//!
//! - [`Embedder`] - Embedding model inference interface
//!
//! ## Implementations
//!
//! - [`BertEmbedder`] - BERT encoder returning `[CLS]` vectors, using Candle
//! - [`TokenizerHandle`] - Wrapper for HuggingFace tokenizers
//! - [`ModelAssets`] - Checkpoint files from a directory or the Hugging Face Hub
//!
//! ## Example
//!
//! ```ignore
//! use fedspeak_core::embedding::{select_device, BertEmbedder, Embedder, ModelAssets, TokenizerHandle};
//!
//! let assets = ModelAssets::from_hub("bert-base-uncased").await?;
//! let tokenizer = TokenizerHandle::from_file(&assets.tokenizer_path, 512)?;
//! let embedder = BertEmbedder::load(&assets, select_device())?;
//!
//! let batch = tokenizer.encode_batch(&["Labor market conditions have eased."])?;
//! let vectors = embedder.embed_batch(&batch)?;
//! ```

mod traits;

pub mod assets;
pub mod device;
pub mod model;
pub mod store;
pub mod tokenizer;

pub use traits::Embedder;

pub use assets::{load_bert_config, ModelAssets};
pub use device::{select_accelerator, select_device};
pub use model::BertEmbedder;
pub use store::{load_embeddings, save_embeddings, EmbeddingManifest, StoredEmbeddings};
pub use tokenizer::{EncodedBatch, SpecialTokens, TokenizerHandle};
