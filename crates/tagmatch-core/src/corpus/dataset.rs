//! The corpus builder: interned tokens, labels, and sentence boundaries.

use super::arena::{Span, StringArena};
use super::labels::LabelMap;
use super::source::SentenceSource;
use crate::config::SENTENCE_BATCH;
use crate::embedding::{EmbeddingMatrix, EmbeddingProvider};
use crate::error::{CorpusError, EmbeddingError};
use crate::progress::ProgressFn;
use tracing::debug;

/// One tagged dataset: interned tokens, per-token label ids, and
/// sentence boundaries, plus the embedding matrix once computed.
///
/// # Lifecycle
///
/// 1. **Read phase** — [`read`](Self::read) appends sentences from any
///    number of sources. Mutation is single-threaded per corpus; two
///    corpora may be read concurrently with each other.
/// 2. **Frozen** — [`end_reading`](Self::end_reading) shrinks storage
///    to fit and allocates the zeroed embedding matrix (the provider's
///    dimension is known by then).
/// 3. **Embedded** — [`embed`](Self::embed) streams sentence batches
///    through the provider, which fills the matrix row per token.
///
/// # Invariants
///
/// - `labels.len() == tokens.len()` after every `read`.
/// - Sentence boundaries are non-overlapping, ascending, and partition
///   `[0, tokens.len())`.
#[derive(Debug)]
pub struct Corpus {
    name: String,
    arena: StringArena,
    tokens: Vec<Span>,
    labels: Vec<u8>,
    sentences: Vec<(usize, usize)>,
    label_map: LabelMap,
    matrix: Option<EmbeddingMatrix>,
    frozen: bool,
}

impl Corpus {
    /// Creates an empty corpus. The name is used only for diagnostics.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arena: StringArena::new(),
            tokens: Vec::new(),
            labels: Vec::new(),
            sentences: Vec::new(),
            label_map: LabelMap::new(),
            matrix: None,
            frozen: false,
        }
    }

    /// Appends every non-empty sentence from `source`.
    ///
    /// May be called once per file; calls must stay on a single logical
    /// thread. Sentences appended before a source error are kept.
    pub fn read(&mut self, source: &mut dyn SentenceSource) -> Result<(), CorpusError> {
        if self.frozen {
            return Err(CorpusError::Frozen);
        }
        while let Some(sentence) = source.next_sentence()? {
            if sentence.is_empty() {
                continue;
            }
            let start = self.tokens.len();
            for (word, tag) in &sentence.tokens {
                let label = self.label_map.intern(tag)?;
                self.tokens.push(self.arena.intern(word));
                self.labels.push(label);
            }
            self.sentences.push((start, self.tokens.len()));
        }
        debug_assert_eq!(self.labels.len(), self.tokens.len());
        Ok(())
    }

    /// Freezes the corpus and allocates the `tokens x dim` embedding
    /// matrix. No further reading is allowed.
    pub fn end_reading(&mut self, dim: usize) -> Result<(), CorpusError> {
        if self.frozen {
            return Err(CorpusError::Frozen);
        }
        self.arena.shrink_to_fit();
        self.tokens.shrink_to_fit();
        self.labels.shrink_to_fit();
        self.sentences.shrink_to_fit();
        self.matrix = Some(EmbeddingMatrix::zeroed(self.tokens.len(), dim));
        self.frozen = true;
        debug!(
            corpus = %self.name,
            tokens = self.tokens.len(),
            sentences = self.sentences.len(),
            labels = self.label_map.len(),
            "corpus frozen"
        );
        Ok(())
    }

    /// Embeds every token through `provider`, filling the matrix.
    ///
    /// Sentences are grouped into [`SENTENCE_BATCH`]-sized batches;
    /// each batch's destination rows are derived from the running token
    /// offset. Blocks until the provider has applied every response.
    pub fn embed(
        &mut self,
        provider: &mut dyn EmbeddingProvider,
        progress: ProgressFn,
    ) -> Result<(), CorpusError> {
        self.embed_batched(provider, SENTENCE_BATCH, progress)
    }

    /// Like [`embed`](Self::embed) with an explicit sentences-per-batch
    /// size.
    pub fn embed_batched(
        &mut self,
        provider: &mut dyn EmbeddingProvider,
        batch_size: usize,
        progress: ProgressFn,
    ) -> Result<(), CorpusError> {
        let batch_size = batch_size.max(1);
        let matrix = self.matrix.take().ok_or(CorpusError::NotFrozen)?;
        let batch_count = self.sentences.len().div_ceil(batch_size);
        provider.begin_session(matrix, batch_count, progress)?;

        let mut row_offset = 0;
        for chunk in self.sentences.chunks(batch_size) {
            let batch: Vec<Vec<&str>> = chunk
                .iter()
                .map(|&(start, end)| (start..end).map(|i| self.token(i)).collect())
                .collect();
            if let Err(err) = provider.submit_batch(&batch, row_offset) {
                // A failed submit usually means the receiver already hit
                // a fatal protocol violation; prefer that as the cause.
                return Err(match provider.end_session() {
                    Err(session_err @ EmbeddingError::Protocol(_)) => session_err.into(),
                    _ => err.into(),
                });
            }
            row_offset += batch.iter().map(Vec::len).sum::<usize>();
        }

        self.matrix = Some(provider.end_session()?);
        Ok(())
    }

    /// The interned token at index `i`.
    pub fn token(&self, i: usize) -> &str {
        self.arena.resolve(self.tokens[i])
    }

    /// Number of tokens in the corpus.
    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    /// Per-token label ids, parallel to the token sequence.
    pub fn labels(&self) -> &[u8] {
        &self.labels
    }

    /// Number of distinct labels.
    pub fn label_count(&self) -> usize {
        self.label_map.len()
    }

    /// The label map, for names and occurrence counts.
    pub fn label_map(&self) -> &LabelMap {
        &self.label_map
    }

    /// Sentence boundaries as `(start, end)` token ranges.
    pub fn sentences(&self) -> &[(usize, usize)] {
        &self.sentences
    }

    /// Diagnostic name of this corpus.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The embedding matrix, once [`embed`](Self::embed) has run.
    pub fn embeddings(&self) -> Option<&EmbeddingMatrix> {
        self.matrix.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{TaggedSentence, VecSource};

    fn sentence(pairs: &[(&str, &str)]) -> TaggedSentence {
        TaggedSentence::new(pairs.iter().copied())
    }

    fn sample_corpus() -> Corpus {
        let mut corpus = Corpus::new("test");
        let mut source = VecSource::new(vec![
            sentence(&[("the", "DET"), ("cat", "NOUN"), ("sat", "VERB")]),
            sentence(&[]),
            sentence(&[("dogs", "NOUN"), ("ran", "VERB")]),
        ]);
        corpus.read(&mut source).unwrap();
        corpus
    }

    #[test]
    fn test_labels_parallel_to_tokens() {
        let corpus = sample_corpus();
        assert_eq!(corpus.labels().len(), corpus.token_count());
        assert_eq!(corpus.token_count(), 5);
    }

    #[test]
    fn test_sentence_boundaries_partition_tokens() {
        let corpus = sample_corpus();
        let mut expected_start = 0;
        for &(start, end) in corpus.sentences() {
            assert_eq!(start, expected_start);
            assert!(end > start);
            expected_start = end;
        }
        assert_eq!(expected_start, corpus.token_count());
    }

    #[test]
    fn test_empty_sentences_skipped() {
        let corpus = sample_corpus();
        assert_eq!(corpus.sentences().len(), 2);
    }

    #[test]
    fn test_label_ids_first_seen_order() {
        let corpus = sample_corpus();
        assert_eq!(corpus.label_map().names(), &["DET", "NOUN", "VERB"]);
        assert_eq!(corpus.labels(), &[0, 1, 2, 1, 2]);
        assert_eq!(corpus.label_map().count(1), 2);
    }

    #[test]
    fn test_tokens_survive_source_drop() {
        let corpus = sample_corpus();
        assert_eq!(corpus.token(0), "the");
        assert_eq!(corpus.token(4), "ran");
    }

    #[test]
    fn test_read_after_freeze_rejected() {
        let mut corpus = sample_corpus();
        corpus.end_reading(4).unwrap();
        let mut source = VecSource::new(vec![sentence(&[("late", "ADJ")])]);
        assert!(matches!(
            corpus.read(&mut source),
            Err(CorpusError::Frozen)
        ));
    }

    #[test]
    fn test_end_reading_allocates_matrix() {
        let mut corpus = sample_corpus();
        corpus.end_reading(8).unwrap();
        let matrix = corpus.embeddings().unwrap();
        assert_eq!(matrix.rows(), 5);
        assert_eq!(matrix.dim(), 8);
    }

    #[test]
    fn test_read_interleaves_multiple_sources() {
        let mut corpus = Corpus::new("multi");
        let mut a = VecSource::new(vec![sentence(&[("one", "NUM")])]);
        let mut b = VecSource::new(vec![sentence(&[("two", "NUM")])]);
        corpus.read(&mut a).unwrap();
        corpus.read(&mut b).unwrap();
        assert_eq!(corpus.token_count(), 2);
        assert_eq!(corpus.sentences(), &[(0, 1), (1, 2)]);
    }
}
