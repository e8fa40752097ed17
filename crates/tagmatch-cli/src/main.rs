//! Tagmatch CLI - compare two annotated corpora by contextual embeddings.
//!
//! # Usage
//!
//! ```bash
//! # Compare two tagged corpora against a local embedding service
//! tagmatch -a corpus_a/*.tsv -b corpus_b/*.tsv
//!
//! # Custom service endpoints and a stricter match threshold
//! tagmatch -a a.tsv -b b.tsv \
//!     --command-addr 10.0.0.5:5555 --result-addr 10.0.0.5:5556 \
//!     --threshold 0.7
//!
//! # Machine-readable output
//! tagmatch -a a.tsv -b b.tsv --json
//! ```
//!
//! Input files are tab-separated `word<TAB>tag` lines with blank lines
//! separating sentences. Other corpus formats plug in through the
//! `SentenceSource` trait in `tagmatch-core`.

mod output;
mod reader;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tagmatch_core::compare::{run_comparison, CorpusInput};
use tagmatch_core::corpus::SentenceSource;
use tagmatch_core::embedding::{ServiceClient, ServiceEndpoints};
use tagmatch_core::matching::MatchingEngine;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Compare the label schemes of two tagged corpora by embedding
/// similarity.
#[derive(Parser)]
#[command(name = "tagmatch", version, about)]
struct Cli {
    /// Files of corpus A (word<TAB>tag, blank line between sentences)
    #[arg(short = 'a', long = "corpus-a", required = true, num_args = 1..)]
    corpus_a: Vec<PathBuf>,

    /// Files of corpus B
    #[arg(short = 'b', long = "corpus-b", required = true, num_args = 1..)]
    corpus_b: Vec<PathBuf>,

    /// Embedding service command (request) address
    #[arg(long, default_value = "127.0.0.1:5555")]
    command_addr: String,

    /// Embedding service result (response) address
    #[arg(long, default_value = "127.0.0.1:5556")]
    result_addr: String,

    /// Cosine-similarity threshold for accepting a match
    #[arg(short = 't', long, default_value_t = tagmatch_core::config::DEFAULT_SIMILARITY_THRESHOLD)]
    threshold: f32,

    /// Sentences per embedding request
    #[arg(long, default_value_t = tagmatch_core::config::SENTENCE_BATCH)]
    batch_size: usize,

    /// Skip the accelerated matching backend even when available
    #[arg(long)]
    no_accel: bool,

    /// Output the confusion matrices as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let endpoints = ServiceEndpoints {
        command: cli.command_addr.clone(),
        result: cli.result_addr.clone(),
    };
    let mut client = ServiceClient::connect(&endpoints).with_context(|| {
        format!(
            "connecting to embedding service at {} / {}",
            endpoints.command, endpoints.result
        )
    })?;

    let engine = if cli.no_accel {
        MatchingEngine::fallback_only(cli.threshold)
    } else {
        MatchingEngine::new(cli.threshold)
    };

    let input_a = corpus_input("A", &cli.corpus_a)?;
    let input_b = corpus_input("B", &cli.corpus_b)?;

    info!(
        files_a = cli.corpus_a.len(),
        files_b = cli.corpus_b.len(),
        threshold = cli.threshold,
        "starting comparison"
    );
    let report = run_comparison(
        &mut client,
        input_a,
        input_b,
        &engine,
        cli.batch_size,
        |_done, _total| {},
    )?;

    let rendered = if cli.json {
        output::format_json(&report)?
    } else {
        output::format_human(&report)
    };
    println!("{rendered}");
    Ok(())
}

/// Opens every file of one corpus as a tab-separated sentence source.
///
/// Files that cannot be opened fail here; files that fail mid-parse are
/// skipped by the orchestrator with a warning.
fn corpus_input(name: &str, paths: &[PathBuf]) -> Result<CorpusInput> {
    let mut files: Vec<(String, Box<dyn SentenceSource + Send>)> = Vec::new();
    for path in paths {
        let source = reader::TsvReader::open(path)
            .with_context(|| format!("opening corpus file {}", path.display()))?;
        files.push((path.display().to_string(), Box::new(source)));
    }
    Ok(CorpusInput::new(name, files))
}
