//! Fedspeak CLI - Federal Reserve speech sentiment pipeline.
//!
//! # Usage
//!
//! ```bash
//! # Collect inputs
//! fedspeak corpus
//! fedspeak speeches --from 2015 --to 2023
//!
//! # Adapt the encoder to financial vocabulary
//! fedspeak finetune
//!
//! # Label, embed and train (needs a volatility CSV, default <data-dir>/vix.csv)
//! fedspeak run --volatility ~/Downloads/VIX.csv
//!
//! # Or step by step
//! fedspeak label && fedspeak embed && fedspeak train --json
//! ```

mod config;
mod output;
mod stages;

use anyhow::Result;
use clap::{Parser, Subcommand};
use stages::StageContext;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Fedspeak pipeline CLI.
///
/// Scrapes Federal Reserve speeches, labels them by the following volatility
/// move, embeds them with a BERT encoder and trains an LSTM classifier.
#[derive(Parser)]
#[command(name = "fedspeak", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Pipeline configuration (JSON); unspecified fields use defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Custom data directory (default: platform standard location)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Encoder directory with config.json, tokenizer.json and model.safetensors
    /// (default: $FEDSPEAK_MODEL_DIR, then the configured model)
    #[arg(long, global = true)]
    model: Option<PathBuf>,

    /// Output the classification report as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Build the vocabulary CSV and fine-tuning corpus
    Corpus,
    /// Scrape speeches into the speeches CSV
    Speeches {
        /// First year (inclusive)
        #[arg(long)]
        from: Option<i32>,
        /// Last year (inclusive)
        #[arg(long)]
        to: Option<i32>,
    },
    /// Fine-tune the encoder with masked-language modeling
    Finetune {
        /// Output directory (default: <data-dir>/models/fedspeak-bert)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Label speeches by volatility change and write labeled chunks
    Label {
        /// Volatility index CSV with Date and Close columns
        #[arg(long)]
        volatility: Option<PathBuf>,
    },
    /// Extract CLS embeddings for every chunk
    Embed,
    /// Train the LSTM classifier and write the report
    Train,
    /// Label, embed and train in sequence
    Run {
        /// Volatility index CSV with Date and Close columns
        #[arg(long)]
        volatility: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let ctx = StageContext {
        config: config::load_pipeline_config(cli.config.as_deref())?,
        data_dir: config::get_data_dir(cli.data_dir.as_ref())?,
        model: cli.model,
        json: cli.json,
    };

    match cli.command {
        Command::Corpus => stages::build_corpus(&ctx).await,
        Command::Speeches { from, to } => stages::scrape_speeches(&ctx, from, to).await,
        Command::Finetune { output } => stages::fine_tune(&ctx, output).await,
        Command::Label { volatility } => stages::label(&ctx, volatility),
        Command::Embed => stages::embed(&ctx).await,
        Command::Train => stages::train(&ctx),
        Command::Run { volatility } => stages::run(&ctx, volatility).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "fedspeak",
            "speeches",
            "--from",
            "2019",
            "--data-dir",
            "/tmp/fed",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/fed")));
        assert!(matches!(
            cli.command,
            Command::Speeches {
                from: Some(2019),
                to: None
            }
        ));
    }
}
