//! Comparison orchestrator: wires corpora, provider, and engine.
//!
//! The pipeline reads both corpora concurrently (each owns independent
//! state), embeds them sequentially through the shared provider (one
//! client carries one request/response stream, so sessions are
//! serialized), runs the matching engine, and reports per-phase
//! timings. A file whose parser fails is logged and skipped; processing
//! continues with the remaining files.

use crate::corpus::{Corpus, SentenceSource};
use crate::error::CompareError;
use crate::matching::{MatchOutcome, MatchingEngine};
use crate::embedding::EmbeddingProvider;
use crate::progress::ProgressFn;
use std::time::Instant;
use tracing::{info, warn};

/// One corpus input: a diagnostic name plus its parsed files.
pub struct CorpusInput {
    /// Name used in logs and the report.
    pub name: String,
    /// `(filename, parser)` pairs; filenames are diagnostic only.
    pub files: Vec<(String, Box<dyn SentenceSource + Send>)>,
}

impl CorpusInput {
    /// Builds an input from named sources.
    pub fn new(
        name: impl Into<String>,
        files: Vec<(String, Box<dyn SentenceSource + Send>)>,
    ) -> Self {
        Self {
            name: name.into(),
            files,
        }
    }
}

/// Everything the comparison produced, plus timing and corpus stats.
#[derive(Debug, serde::Serialize)]
pub struct ComparisonReport {
    /// The four confusion matrices and unmatched counters.
    pub outcome: MatchOutcome,
    /// Label names of corpus A, in id order (confusion row order).
    pub labels_a: Vec<String>,
    /// Label names of corpus B, in id order.
    pub labels_b: Vec<String>,
    /// Per-label occurrence counts of corpus A.
    pub label_counts_a: Vec<(String, u64)>,
    /// Per-label occurrence counts of corpus B.
    pub label_counts_b: Vec<(String, u64)>,
    /// Token total of corpus A.
    pub tokens_a: usize,
    /// Token total of corpus B.
    pub tokens_b: usize,
    /// Wall-clock milliseconds spent reading both corpora.
    pub read_ms: u64,
    /// Wall-clock milliseconds spent embedding both corpora.
    pub embed_ms: u64,
    /// Wall-clock milliseconds spent matching.
    pub match_ms: u64,
}

/// Runs the full comparison pipeline.
///
/// `batch_size` is the number of sentences per embedding request
/// ([`SENTENCE_BATCH`](crate::config::SENTENCE_BATCH) unless
/// overridden). `progress` is shared by the embedding and matching
/// phases; each phase reports its own monotonic `(completed, total)`
/// sequence.
pub fn run_comparison(
    provider: &mut dyn EmbeddingProvider,
    input_a: CorpusInput,
    input_b: CorpusInput,
    engine: &MatchingEngine,
    batch_size: usize,
    progress: impl Fn(usize, usize) + Send + Sync + Clone + 'static,
) -> Result<ComparisonReport, CompareError> {
    let dim = provider.embedding_dim();

    let read_start = Instant::now();
    let (mut corpus_a, mut corpus_b) = std::thread::scope(|scope| {
        let handle = scope.spawn(move || read_corpus(input_a));
        let corpus_b = read_corpus(input_b);
        let corpus_a = match handle.join() {
            Ok(corpus) => corpus,
            // Reader panics only on internal bugs; surface them.
            Err(panic) => std::panic::resume_unwind(panic),
        };
        (corpus_a, corpus_b)
    });
    corpus_a.end_reading(dim)?;
    corpus_b.end_reading(dim)?;
    let read_ms = read_start.elapsed().as_millis() as u64;
    info!(
        tokens_a = corpus_a.token_count(),
        tokens_b = corpus_b.token_count(),
        read_ms,
        "corpora read"
    );

    let embed_start = Instant::now();
    let progress_a = progress.clone();
    corpus_a.embed_batched(provider, batch_size, Box::new(progress_a))?;
    let progress_b = progress.clone();
    corpus_b.embed_batched(provider, batch_size, Box::new(progress_b))?;
    let embed_ms = embed_start.elapsed().as_millis() as u64;
    info!(embed_ms, "embedding complete");

    let match_start = Instant::now();
    let match_progress: ProgressFn = Box::new(progress);
    let outcome = engine.compare_with_progress(&corpus_a, &corpus_b, match_progress)?;
    let match_ms = match_start.elapsed().as_millis() as u64;
    info!(
        match_ms,
        unmatched_a = outcome.unmatched_a,
        unmatched_b = outcome.unmatched_b,
        "matching complete"
    );

    Ok(ComparisonReport {
        labels_a: corpus_a.label_map().names().to_vec(),
        labels_b: corpus_b.label_map().names().to_vec(),
        label_counts_a: corpus_a.label_map().distribution(),
        label_counts_b: corpus_b.label_map().distribution(),
        tokens_a: corpus_a.token_count(),
        tokens_b: corpus_b.token_count(),
        read_ms,
        embed_ms,
        match_ms,
        outcome,
    })
}

/// Reads every file of one corpus input, skipping files whose parser
/// fails.
fn read_corpus(input: CorpusInput) -> Corpus {
    let mut corpus = Corpus::new(input.name);
    for (filename, mut source) in input.files {
        if let Err(err) = corpus.read(&mut *source) {
            warn!(file = %filename, error = %err, "skipping corpus file after parse failure");
        }
    }
    corpus
}
