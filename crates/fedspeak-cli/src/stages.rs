//! Stage command implementations.
//!
//! Each command reads the artifacts of the previous stage from the data
//! directory and writes its own, so stages can be rerun independently.

use crate::config::{
    base_model_assets, embedding_model_assets, model_name, CHUNKS_FILE, CLASSIFIER_DIR,
    CORPUS_FILE, EMBEDDINGS_DIR, FINE_TUNED_DIR, REPORT_JSON_FILE, REPORT_TEXT_FILE, SPEECHES_FILE,
    VOCABULARY_FILE, VOLATILITY_FILE,
};
use crate::output;
use anyhow::{anyhow, Context, Result};
use fedspeak_core::chunking::RecursiveChunker;
use fedspeak_core::classifier::ClassifierTrainer;
use fedspeak_core::config::PipelineConfig;
use fedspeak_core::dataset::{
    read_chunks, read_corpus, read_speeches, write_chunks, write_corpus, write_speeches,
    write_vocabulary,
};
use fedspeak_core::embedding::{
    load_embeddings, save_embeddings, select_device, BertEmbedder, TokenizerHandle,
};
use fedspeak_core::finetune::MlmFineTuner;
use fedspeak_core::labeling::{chunk_speech, SpeechLabeler, VolatilitySeries};
use fedspeak_core::processing::{group_embeddings, speech_labels, EmbeddingPipeline};
use fedspeak_core::scraping::{CorpusBuilder, HttpFetcher, SpeechScraper};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Settings shared by every command.
pub struct StageContext {
    pub config: PipelineConfig,
    pub data_dir: PathBuf,
    /// `--model` override
    pub model: Option<PathBuf>,
    /// Print the report as JSON
    pub json: bool,
}

impl StageContext {
    fn path(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }
}

/// Scrapes the financial dictionary into the vocabulary CSV and corpus text.
pub async fn build_corpus(ctx: &StageContext) -> Result<()> {
    let fetcher = HttpFetcher::new(&ctx.config.fetch).context("Failed to create HTTP client")?;
    let builder = CorpusBuilder::new(
        &fetcher,
        ctx.config.corpus.clone(),
        ctx.config.fetch.max_concurrent_requests,
    );

    let bar = output::progress_bar(0, "letter pages");
    let entries = builder
        .build(output::scrape_callback(&bar))
        .await
        .context("Failed to build the vocabulary corpus")?;
    bar.finish_and_clear();

    let vocabulary_path = ctx.path(VOCABULARY_FILE);
    let corpus_path = ctx.path(CORPUS_FILE);
    write_vocabulary(&vocabulary_path, &entries)
        .with_context(|| format!("Failed to write {}", vocabulary_path.display()))?;
    write_corpus(&corpus_path, &entries)
        .with_context(|| format!("Failed to write {}", corpus_path.display()))?;

    println!(
        "Collected {} terms -> {}",
        entries.len(),
        corpus_path.display()
    );
    Ok(())
}

/// Scrapes the speech archive for the configured (or given) years.
pub async fn scrape_speeches(
    ctx: &StageContext,
    from: Option<i32>,
    to: Option<i32>,
) -> Result<()> {
    let mut archive = ctx.config.speeches.clone();
    archive.first_year = from.unwrap_or(archive.first_year);
    archive.last_year = to.unwrap_or(archive.last_year);

    let fetcher = HttpFetcher::new(&ctx.config.fetch).context("Failed to create HTTP client")?;
    let scraper = SpeechScraper::new(&fetcher, archive, ctx.config.fetch.max_concurrent_requests);

    let bar = output::progress_bar(0, "year indexes");
    let speeches = scraper
        .scrape(output::scrape_callback(&bar))
        .await
        .context("Failed to scrape speeches")?;
    bar.finish_and_clear();

    let path = ctx.path(SPEECHES_FILE);
    write_speeches(&path, &speeches)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Scraped {} speeches -> {}", speeches.len(), path.display());
    Ok(())
}

/// Fine-tunes the pretrained encoder on the vocabulary corpus.
pub async fn fine_tune(ctx: &StageContext, output_dir: Option<PathBuf>) -> Result<()> {
    let corpus_path = ctx.path(CORPUS_FILE);
    let corpus = read_corpus(&corpus_path)
        .with_context(|| format!("Failed to read corpus: {}", corpus_path.display()))?;
    let assets = base_model_assets(ctx.model.as_ref(), &ctx.config).await?;
    let output_dir = output_dir.unwrap_or_else(|| ctx.path(FINE_TUNED_DIR));

    let tuner = MlmFineTuner::new(ctx.config.fine_tune.clone())?;
    info!("Fine-tuning on {:?}", tuner.device());

    let bar = output::progress_bar(0, "fine-tuning");
    let outcome = tuner
        .fine_tune(&assets, &corpus, &output_dir, output::epoch_callback(&bar))
        .context("Fine-tuning failed")?;
    bar.finish_and_clear();

    if let Some(loss) = outcome.epoch_losses.last() {
        println!(
            "Fine-tuned {} epochs on {} blocks (final loss {:.4}) -> {}",
            outcome.epoch_losses.len(),
            outcome.blocks,
            loss,
            outcome.output_dir.display()
        );
    }
    Ok(())
}

/// Labels speeches from the volatility series and writes labeled chunks.
pub fn label(ctx: &StageContext, volatility: Option<PathBuf>) -> Result<()> {
    let speeches_path = ctx.path(SPEECHES_FILE);
    let speeches = read_speeches(&speeches_path)
        .with_context(|| format!("Failed to read speeches: {}", speeches_path.display()))?;
    let volatility_path = volatility.unwrap_or_else(|| ctx.path(VOLATILITY_FILE));
    let series = VolatilitySeries::from_csv(&volatility_path).with_context(|| {
        format!(
            "Failed to read volatility series: {}",
            volatility_path.display()
        )
    })?;

    let labeler = SpeechLabeler::new(&series, ctx.config.labeling.clone());
    let outcome = labeler.label_all(&speeches);
    let chunker = RecursiveChunker::from_config(&ctx.config.chunking)?;

    let mut chunks = Vec::new();
    for labeled in &outcome.labeled {
        chunks.extend(
            chunk_speech(labeled, &chunker)
                .with_context(|| format!("Failed to chunk speech {}", labeled.speech.id))?,
        );
    }

    let path = ctx.path(CHUNKS_FILE);
    write_chunks(&path, &chunks).with_context(|| format!("Failed to write {}", path.display()))?;
    println!(
        "Labeled {} speeches ({} excluded) into {} chunks -> {}",
        outcome.labeled.len(),
        outcome.excluded.len(),
        chunks.len(),
        path.display()
    );
    Ok(())
}

/// Embeds every labeled chunk with the encoder.
pub async fn embed(ctx: &StageContext) -> Result<()> {
    let chunks_path = ctx.path(CHUNKS_FILE);
    let chunks = read_chunks(&chunks_path)
        .with_context(|| format!("Failed to read chunks: {}", chunks_path.display()))?;
    if chunks.is_empty() {
        return Err(anyhow!("No chunks in {}", chunks_path.display()));
    }

    let settings = &ctx.config.embedding;
    let assets = embedding_model_assets(ctx.model.as_ref(), &ctx.data_dir, &ctx.config).await?;
    let embedder = BertEmbedder::load(&assets, select_device()).context("Failed to load encoder")?;
    let tokenizer = TokenizerHandle::from_file(&assets.tokenizer_path, settings.max_length)
        .context("Failed to load tokenizer")?
        .with_pad_to_max_length(settings.pad_to_max_length);
    let pipeline =
        EmbeddingPipeline::new(Arc::new(embedder), Arc::new(tokenizer), settings.batch_size)?;

    let bar = output::progress_bar(chunks.len() as u64, "embedding");
    let run = pipeline.embed_chunks(&chunks, output::stage_callback(&bar))?;
    bar.finish_and_clear();

    let dir = ctx.path(EMBEDDINGS_DIR);
    save_embeddings(&dir, &model_name(&assets), &run.embeddings)
        .with_context(|| format!("Failed to save embeddings to {}", dir.display()))?;
    println!(
        "Embedded {} chunks ({} truncated, {} tokens) in {:.1}s -> {}",
        run.chunk_count(),
        run.truncated,
        run.total_tokens,
        run.elapsed_ms as f64 / 1000.0,
        dir.display()
    );
    Ok(())
}

/// Trains the LSTM classifier and writes the report.
pub fn train(ctx: &StageContext) -> Result<()> {
    let chunks_path = ctx.path(CHUNKS_FILE);
    let chunks = read_chunks(&chunks_path)
        .with_context(|| format!("Failed to read chunks: {}", chunks_path.display()))?;
    let labels = speech_labels(&chunks)?;

    let dir = ctx.path(EMBEDDINGS_DIR);
    let stored = load_embeddings(&dir)
        .with_context(|| format!("Failed to load embeddings from {}", dir.display()))?;
    if stored.embeddings.len() != chunks.len() {
        return Err(anyhow!(
            "{} has {} embeddings for {} chunks; rerun `fedspeak embed`",
            dir.display(),
            stored.embeddings.len(),
            chunks.len()
        ));
    }
    info!(
        "Loaded {} embeddings of dimension {} from model {}",
        stored.embeddings.len(),
        stored.dimension,
        stored.model
    );
    let examples = group_embeddings(stored.embeddings, &labels)?;

    let trainer = ClassifierTrainer::new(ctx.config.classifier.clone(), select_device())?;
    let bar = output::progress_bar(0, "training");
    let (classifier, outcome) = trainer
        .train(&examples, output::epoch_callback(&bar))
        .context("Classifier training failed")?;
    bar.finish_and_clear();

    let classifier_dir = ctx.path(CLASSIFIER_DIR);
    classifier
        .save(&classifier_dir)
        .with_context(|| format!("Failed to save classifier to {}", classifier_dir.display()))?;

    let human = output::format_human(&outcome);
    let json = output::format_json(&outcome);
    for (name, contents) in [(REPORT_TEXT_FILE, &human), (REPORT_JSON_FILE, &json)] {
        let path = ctx.path(name);
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    println!("{}", if ctx.json { json } else { human });
    Ok(())
}

/// Label, embed and train in sequence.
pub async fn run(ctx: &StageContext, volatility: Option<PathBuf>) -> Result<()> {
    label(ctx, volatility)?;
    embed(ctx).await?;
    train(ctx)
}
