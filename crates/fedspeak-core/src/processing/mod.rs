//! Embedding stage and progress reporting.
//!
//! - [`EmbeddingPipeline`] turns chunks into CLS vectors in batches
//! - [`group_embeddings`] reassembles them into per-speech
//!   [`TrainingExample`](crate::dataset::TrainingExample)s
//! - [`StageProgress`] and [`EpochProgress`] carry progress to callers
//!
//! # Example
//!
//! ```ignore
//! use fedspeak_core::processing::{group_embeddings, speech_labels, EmbeddingPipeline};
//!
//! let pipeline = EmbeddingPipeline::new(Arc::new(embedder), Arc::new(tokenizer), 16)?;
//! let run = pipeline.embed_chunks(&chunks, |p| bar.set_position(p.completed as u64))?;
//! let examples = group_embeddings(run.embeddings, &speech_labels(&chunks)?)?;
//! ```

mod grouping;
mod pipeline;
mod progress;

pub use grouping::{group_embeddings, speech_labels};
pub use pipeline::{EmbeddingPipeline, EmbeddingRun};
pub use progress::{EpochProgress, ProgressTimer, StageProgress};
